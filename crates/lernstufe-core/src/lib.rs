#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Kerntypen für lernstufe: Schwierigkeitsstufen, Beobachtungen und der
//! pro Lernendem geführte Banditen-Zustand.

pub mod arm;
pub mod error;
pub mod state;

pub use arm::{Arm, ArmRegistry, BanditConfig};
pub use error::{ConfigError, ValidationError};
pub use state::{ArmStats, BanditState, Observation, Reward, StudentId};
