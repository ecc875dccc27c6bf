//! Explore/Exploit-Policy zur Wahl der nächsten Schwierigkeitsstufe.
//!
//! Der [`DifficultyBandit`] arbeitet in vier Schritten:
//!
//! 1. **Kaltstart:** Solange ein Arm weniger als `min_exploration` Ziehungen
//!    hat, wird gleichverteilt unter diesen unterversorgten Armen gewählt.
//! 2. **Bewertung:** Arme mit mindestens `min_samples_for_exploit` Ziehungen
//!    erhalten den Laplace-geglätteten Mittelwert `(s + 1) / (n + 2)`.
//! 3. **Fallback:** Ist kein Arm bewertbar, wird gleichverteilt gewählt.
//! 4. **Exploit/Explore:** Mit Wahrscheinlichkeit `exploit_prob` wird der
//!    schwerste unter den besten Armen gewählt, sonst ein nicht-bester Arm.
//!
//! Die Policy ist zustandslos; der Zufall wird als Parameter übergeben, damit
//! Tests mit festem Seed reproduzierbar bleiben.

pub mod error;

pub use error::{BanditError, Result};

use lernstufe_core::{Arm, ArmRegistry, ArmStats, BanditState};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Welcher Zweig der Policy eine Wahl getroffen hat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceReason {
    /// Unterversorgter Arm in der Kaltstart-Phase.
    ColdStart,
    /// Kein Arm hat die Exploit-Schwelle erreicht.
    Fallback,
    /// Bester Arm (bei Gleichstand der schwerste).
    Exploit,
    /// Ein nicht-bester Arm, oder irgendein Arm wenn alle gleichauf liegen.
    Explore,
}

/// Ergebnis einer Entscheidung.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub arm: Arm,
    pub why: ChoiceReason,
    /// Geglätteter Mittelwert des gewählten Arms, falls er bewertet wurde.
    pub score: Option<f64>,
}

/// Geglätteter Mittelwert eines bewerteten Arms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmScore {
    pub arm: Arm,
    pub stats: ArmStats,
    pub mean: f64,
}

/// Policy über einer festen [`ArmRegistry`].
#[derive(Debug, Clone, Default)]
pub struct DifficultyBandit {
    registry: ArmRegistry,
}

impl DifficultyBandit {
    #[must_use]
    pub fn new(registry: ArmRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ArmRegistry {
        &self.registry
    }

    /// Arme mit weniger als `min_exploration` Ziehungen, aufsteigend.
    #[must_use]
    pub fn under_sampled(&self, state: &BanditState) -> Vec<Arm> {
        let min = u64::from(self.registry.min_exploration());
        self.registry
            .arms()
            .iter()
            .copied()
            .filter(|&arm| state.pulls(arm) < min)
            .collect()
    }

    /// Bewertet alle Arme, die die Exploit-Schwelle erreicht haben.
    #[must_use]
    pub fn scores(&self, state: &BanditState) -> Vec<ArmScore> {
        let min = u64::from(self.registry.min_samples_for_exploit());
        self.registry
            .arms()
            .iter()
            .filter_map(|&arm| {
                let stats = state.stats(arm);
                (stats.pulls >= min).then(|| ArmScore {
                    arm,
                    stats,
                    mean: stats.smoothed_mean(),
                })
            })
            .collect()
    }

    /// Alle bewerteten Arme mit maximalem geglättetem Mittelwert, aufsteigend.
    #[must_use]
    pub fn best_arms(&self, state: &BanditState) -> Vec<ArmScore> {
        let mut best: Vec<ArmScore> = Vec::new();
        for score in self.scores(state) {
            match best.first().map(|b| score.stats.cmp_smoothed(&b.stats)) {
                None | Some(Ordering::Equal) => best.push(score),
                Some(Ordering::Greater) => {
                    best.clear();
                    best.push(score);
                }
                Some(Ordering::Less) => {}
            }
        }
        best
    }

    /// Wählt den nächsten Arm. Verändert `state` nicht.
    ///
    /// # Errors
    /// [`BanditError::NoCandidates`] nur bei leerer Arm-Menge, was eine
    /// validierte [`ArmRegistry`] ausschließt.
    pub fn next<R: Rng + ?Sized>(&self, state: &BanditState, rng: &mut R) -> Result<Choice> {
        let under_sampled = self.under_sampled(state);
        if !under_sampled.is_empty() {
            let arm = pick(&under_sampled, rng)?;
            return Ok(self.finish(state, arm, ChoiceReason::ColdStart, None));
        }

        let best = self.best_arms(state);
        if best.is_empty() {
            let arm = pick(self.registry.arms(), rng)?;
            return Ok(self.finish(state, arm, ChoiceReason::Fallback, None));
        }

        if rng.gen::<f64>() < self.registry.exploit_prob() {
            // Gleichstand: die schwerste Stufe gewinnt.
            let top = best
                .last()
                .ok_or(BanditError::NoCandidates("best arm set is empty"))?;
            return Ok(self.finish(state, top.arm, ChoiceReason::Exploit, Some(top.mean)));
        }

        let candidates: Vec<Arm> = self
            .registry
            .arms()
            .iter()
            .copied()
            .filter(|arm| !best.iter().any(|b| b.arm == *arm))
            .collect();
        let arm = if candidates.is_empty() {
            pick(self.registry.arms(), rng)?
        } else {
            pick(&candidates, rng)?
        };
        let min = u64::from(self.registry.min_samples_for_exploit());
        let stats = state.stats(arm);
        let score = (stats.pulls >= min).then(|| stats.smoothed_mean());
        Ok(self.finish(state, arm, ChoiceReason::Explore, score))
    }

    #[allow(clippy::unused_self)]
    fn finish(&self, state: &BanditState, arm: Arm, why: ChoiceReason, score: Option<f64>) -> Choice {
        #[cfg(feature = "telemetry")]
        tracing::debug!(
            arm = arm.level(),
            why = ?why,
            score = ?score,
            total_pulls = state.total_pulls(),
            "difficulty chosen"
        );
        #[cfg(not(feature = "telemetry"))]
        let _ = state;
        Choice { arm, why, score }
    }
}

fn pick<R: Rng + ?Sized>(arms: &[Arm], rng: &mut R) -> Result<Arm> {
    arms.choose(rng)
        .copied()
        .ok_or(BanditError::NoCandidates("arm slice is empty"))
}
