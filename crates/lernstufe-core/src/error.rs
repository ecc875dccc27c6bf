use thiserror::Error;

/// Fehler in Eingaben eines Aufrufers. Es wurde kein Zustand verändert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("student_id required")]
    MissingStudentId,
    #[error("Invalid decision: {raw:?} is not a configured difficulty")]
    UnknownArm { raw: String },
    #[error("Invalid reward: {raw:?} (expected 0 or 1)")]
    InvalidReward { raw: String },
}

/// Fehlerhafte Konfiguration; wird beim Start erkannt, nie pro Anfrage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("arm registry is empty")]
    EmptyArms,
    #[error("arm {0} is configured more than once")]
    DuplicateArm(u8),
    #[error("exploit probability {0} must lie within [0, 1]")]
    ExploitProbability(f64),
    #[error("min_samples_for_exploit = {0} can never be reached; no arm would ever be trusted")]
    UntrustableThreshold(u32),
}
