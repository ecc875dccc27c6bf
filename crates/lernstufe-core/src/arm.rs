//! Schwierigkeitsstufen ("Arme") und die unveränderliche Arm-Registry.
//!
//! Die Registry entsteht einmal beim Start aus einer [`BanditConfig`] und
//! enthält neben den geordneten Armen die Schwellwerte, mit denen die
//! Entscheidungs-Policy zwischen Exploration und Exploitation wechselt.

use crate::error::{ConfigError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard-Schwierigkeitsstufen, aufsteigend von leicht nach schwer.
pub const DEFAULT_ARMS: [u8; 5] = [1, 2, 3, 4, 5];
/// Mindestanzahl an Ziehungen pro Arm, bevor die Kaltstart-Phase endet.
pub const MIN_EXPLORATION: u32 = 3;
/// Mindestanzahl an Ziehungen, bevor der Mittelwert eines Arms zählt.
pub const MIN_SAMPLES_FOR_EXPLOIT: u32 = 3;
/// Wahrscheinlichkeit, den besten Arm zu wählen statt zu explorieren.
pub const EXPLOIT_PROB: f64 = 0.7;

/// Eine Schwierigkeitsstufe. Die Ordnung entspricht der Schwierigkeit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arm(pub u8);

impl Arm {
    #[must_use]
    pub fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rohkonfiguration, wie sie aus CLI/Umgebung kommt. Erst
/// [`BanditConfig::validate`] liefert eine nutzbare [`ArmRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditConfig {
    pub arms: Vec<u8>,
    pub min_exploration: u32,
    pub min_samples_for_exploit: u32,
    pub exploit_prob: f64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            arms: DEFAULT_ARMS.to_vec(),
            min_exploration: MIN_EXPLORATION,
            min_samples_for_exploit: MIN_SAMPLES_FOR_EXPLOIT,
            exploit_prob: EXPLOIT_PROB,
        }
    }
}

impl BanditConfig {
    /// Prüft die Konfiguration und sortiert die Arme aufsteigend.
    ///
    /// # Errors
    /// [`ConfigError`] bei leerer oder doppelter Arm-Liste, einer
    /// Exploit-Wahrscheinlichkeit außerhalb von `[0, 1]` oder einer
    /// unerreichbaren Exploit-Schwelle.
    pub fn validate(self) -> Result<ArmRegistry, ConfigError> {
        if self.arms.is_empty() {
            return Err(ConfigError::EmptyArms);
        }
        let mut arms = self.arms;
        arms.sort_unstable();
        if let Some(w) = arms.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicateArm(w[0]));
        }
        if !self.exploit_prob.is_finite() || !(0.0..=1.0).contains(&self.exploit_prob) {
            return Err(ConfigError::ExploitProbability(self.exploit_prob));
        }
        if self.min_samples_for_exploit == u32::MAX {
            return Err(ConfigError::UntrustableThreshold(self.min_samples_for_exploit));
        }
        Ok(ArmRegistry {
            arms: arms.into_iter().map(Arm).collect(),
            min_exploration: self.min_exploration,
            min_samples_for_exploit: self.min_samples_for_exploit,
            exploit_prob: self.exploit_prob,
        })
    }
}

/// Geordnete, nicht-leere Menge von Armen samt Schwellwerten.
///
/// Lässt sich nur über [`BanditConfig::validate`] erzeugen; die Invarianten
/// (nicht leer, aufsteigend, eindeutig) gelten damit für jede Instanz.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRegistry {
    arms: Vec<Arm>,
    min_exploration: u32,
    min_samples_for_exploit: u32,
    exploit_prob: f64,
}

impl Default for ArmRegistry {
    fn default() -> Self {
        Self {
            arms: DEFAULT_ARMS.iter().copied().map(Arm).collect(),
            min_exploration: MIN_EXPLORATION,
            min_samples_for_exploit: MIN_SAMPLES_FOR_EXPLOIT,
            exploit_prob: EXPLOIT_PROB,
        }
    }
}

impl ArmRegistry {
    /// Arme in aufsteigender Reihenfolge.
    #[must_use]
    pub fn arms(&self) -> &[Arm] {
        &self.arms
    }

    #[must_use]
    pub fn min_exploration(&self) -> u32 {
        self.min_exploration
    }

    #[must_use]
    pub fn min_samples_for_exploit(&self) -> u32 {
        self.min_samples_for_exploit
    }

    #[must_use]
    pub fn exploit_prob(&self) -> f64 {
        self.exploit_prob
    }

    #[must_use]
    pub fn contains(&self, arm: Arm) -> bool {
        self.arms.binary_search(&arm).is_ok()
    }

    /// Liest eine Entscheidung aus Rohtext (z. B. `"3"` oder `" 4 "`).
    ///
    /// # Errors
    /// [`ValidationError::UnknownArm`], wenn der Text keine ganze Zahl ist
    /// oder keine konfigurierte Stufe bezeichnet.
    pub fn parse_arm(&self, raw: &str) -> Result<Arm, ValidationError> {
        let unknown = || ValidationError::UnknownArm {
            raw: raw.to_string(),
        };
        let level: i64 = raw.trim().parse().map_err(|_| unknown())?;
        let arm = u8::try_from(level).map(Arm).map_err(|_| unknown())?;
        if self.contains(arm) {
            Ok(arm)
        } else {
            Err(unknown())
        }
    }
}
