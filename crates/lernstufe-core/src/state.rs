//! Pro Lernendem persistierter Banditen-Zustand.
//!
//! Ein [`BanditState`] hält die vollständige, chronologische Historie aller
//! Beobachtungen und daneben die aggregierten Statistiken je Arm. Die
//! Statistiken werden inkrementell gepflegt, sodass Entscheidungen nie die
//! Historie durchlaufen müssen.

use crate::arm::Arm;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Extern vergebene, nicht-leere Kennung eines Lernenden.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Übernimmt eine Kennung; umgebende Leerzeichen werden entfernt.
    ///
    /// # Errors
    /// [`ValidationError::MissingStudentId`], wenn nichts übrig bleibt.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingStudentId);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binäres Ergebnis einer gestellten Frage. Serialisiert als `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Reward {
    Incorrect,
    Correct,
}

impl Reward {
    /// Liest `"0"` oder `"1"` (umgebende Leerzeichen erlaubt).
    ///
    /// # Errors
    /// [`ValidationError::InvalidReward`] für alle anderen Eingaben.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim() {
            "0" => Ok(Self::Incorrect),
            "1" => Ok(Self::Correct),
            _ => Err(ValidationError::InvalidReward {
                raw: raw.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        u8::from(self)
    }
}

impl From<Reward> for u8 {
    fn from(r: Reward) -> Self {
        match r {
            Reward::Incorrect => 0,
            Reward::Correct => 1,
        }
    }
}

impl TryFrom<u8> for Reward {
    type Error = ValidationError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Incorrect),
            1 => Ok(Self::Correct),
            other => Err(ValidationError::InvalidReward {
                raw: other.to_string(),
            }),
        }
    }
}

/// Eine Beobachtung: gestellte Stufe und erzielte Belohnung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub arm: Arm,
    pub reward: Reward,
}

impl Observation {
    #[must_use]
    pub fn new(arm: Arm, reward: Reward) -> Self {
        Self { arm, reward }
    }
}

/// Suffiziente Statistik eines Arms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmStats {
    pub pulls: u64,
    pub successes: u64,
}

impl ArmStats {
    /// Laplace-geglätteter Mittelwert (Beta(1,1)-Posterior): `(s + 1) / (n + 2)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn smoothed_mean(&self) -> f64 {
        (self.successes as f64 + 1.0) / (self.pulls as f64 + 2.0)
    }

    /// Vergleicht die geglätteten Mittelwerte exakt über Kreuzmultiplikation.
    #[must_use]
    pub fn cmp_smoothed(&self, other: &Self) -> Ordering {
        let lhs = (u128::from(self.successes) + 1) * (u128::from(other.pulls) + 2);
        let rhs = (u128::from(other.successes) + 1) * (u128::from(self.pulls) + 2);
        lhs.cmp(&rhs)
    }

    fn observe(&mut self, reward: Reward) {
        self.pulls += 1;
        self.successes += u64::from(reward.value());
    }
}

/// Historie und Statistiken eines Lernenden.
///
/// Invariante: Für jeden Arm entspricht `pulls` der Anzahl seiner
/// Beobachtungen in `history` und `successes` deren Belohnungssumme.
/// Der Default-Zustand ist leer und steht für "noch nie gesehen".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanditState {
    history: Vec<Observation>,
    stats: BTreeMap<Arm, ArmStats>,
}

impl BanditState {
    /// Baut einen Zustand aus einer Folge von Beobachtungen auf.
    #[must_use]
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut state = Self::default();
        for obs in observations {
            state.record(obs);
        }
        state
    }

    /// Hängt eine Beobachtung an und aktualisiert die Statistik ihres Arms.
    pub fn record(&mut self, obs: Observation) {
        self.history.push(obs);
        self.stats.entry(obs.arm).or_default().observe(obs.reward);
    }

    #[must_use]
    pub fn history(&self) -> &[Observation] {
        &self.history
    }

    /// Statistik eines Arms; unbekannte Arme liefern Nullwerte.
    #[must_use]
    pub fn stats(&self, arm: Arm) -> ArmStats {
        self.stats.get(&arm).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn pulls(&self, arm: Arm) -> u64 {
        self.stats(arm).pulls
    }

    #[must_use]
    pub fn total_pulls(&self) -> u64 {
        self.stats.values().map(|s| s.pulls).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Prüft die Invariante zwischen Historie und Statistiken durch
    /// vollständiges Nachzählen. Nur beim Laden aus Speicher gedacht.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let recomputed = Self::from_observations(self.history.iter().copied());
        let nonzero: BTreeMap<_, _> = self
            .stats
            .iter()
            .filter(|(_, s)| s.pulls > 0 || s.successes > 0)
            .map(|(a, s)| (*a, *s))
            .collect();
        recomputed.stats == nonzero
    }
}
