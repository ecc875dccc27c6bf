#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Decision boundary for lernstufe.
//!
//! [`DecisionApi`] exposes the three caller operations (next difficulty,
//! record outcome, reset) plus a read-only stats view. All of them take the
//! raw student id and reject an empty one before touching any state. The
//! [`wire`] module maps JSON requests onto these operations.

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::info!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::debug!($($arg)*);
    }};
}

pub mod api;
pub mod error;
pub mod service;
pub mod wire;

pub use api::{ArmSummary, DecisionApi, StudentSummary};
pub use error::{ApiError, Result};
pub use service::{ResetService, UpdateService};
