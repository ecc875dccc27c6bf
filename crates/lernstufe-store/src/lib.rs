#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Durable, per-student storage of [`BanditState`](lernstufe_core::BanditState).
//!
//! [`BanditStore`] owns the read-modify-write discipline: every student id
//! gets its own reader/writer lock, so updates for one id are serialized
//! while different ids proceed in parallel. Backends shared between
//! processes add a lock of their own per id, which the store takes after
//! the in-process one. The actual persistence is delegated to a
//! [`StateBackend`]:
//!
//! - [`MemoryBackend`] keeps states in a map (tests, ephemeral runs);
//! - [`FileBackend`] keeps one JSON document per student, commits via
//!   write-to-temp + fsync + rename and locks each student through an
//!   advisory lock file.

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        eprintln!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::debug!($($arg)*);
    }};
}

pub mod backend;
pub mod error;
pub mod file;
pub mod locks;
pub mod memory;
pub mod store;

pub use backend::{BackendLock, StateBackend};
pub use error::{Result, StoreError};
pub use file::FileBackend;
pub use locks::KeyedLocks;
pub use memory::MemoryBackend;
pub use store::BanditStore;
