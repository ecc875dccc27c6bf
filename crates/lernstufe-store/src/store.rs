use crate::backend::StateBackend;
use crate::error::Result;
use crate::locks::KeyedLocks;
use lernstufe_core::{BanditState, Observation, StudentId};

/// Per-student state store on top of a [`StateBackend`].
///
/// `apply` and `reset` hold the exclusive lock of their id for the whole
/// read-modify-write; `get` holds the shared lock, so it only ever sees
/// committed states. Each lock is the in-process one first, then the
/// backend's, so two processes on one state directory serialize the same
/// way two threads do.
#[derive(Debug)]
pub struct BanditStore<B> {
    backend: B,
    locks: KeyedLocks,
}

impl<B: StateBackend> BanditStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Latest committed state, or the empty default for unseen ids.
    ///
    /// # Errors
    /// Propagates backend failures; a failed load never yields a default.
    pub fn get(&self, id: &StudentId) -> Result<BanditState> {
        self.locks.with_read(id, || {
            let _held = self.backend.lock_shared(id)?;
            Ok(self.backend.load(id)?.unwrap_or_default())
        })
    }

    /// Appends `obs` to the history of `id`, updates the arm's counters and
    /// commits the result. Returns the committed state.
    ///
    /// # Errors
    /// Load failures abort before any write. A failed commit is retried once;
    /// if it fails again the previous state stays committed and the error is
    /// returned.
    pub fn apply(&self, id: &StudentId, obs: Observation) -> Result<BanditState> {
        self.locks.with_write(id, || {
            let _held = self.backend.lock_exclusive(id)?;
            let mut next = self.backend.load(id)?.unwrap_or_default();
            next.record(obs);
            retry_once("commit", id, || self.backend.commit(id, &next))?;
            debug!(
                "student {} recorded arm={} reward={} (total {})",
                id,
                obs.arm,
                obs.reward.value(),
                next.total_pulls()
            );
            Ok(next)
        })
    }

    /// Removes all stored state of `id`; a later `get` returns the default.
    ///
    /// # Errors
    /// Propagates backend failures after one retry.
    pub fn reset(&self, id: &StudentId) -> Result<()> {
        self.locks.with_write(id, || {
            let _held = self.backend.lock_exclusive(id)?;
            retry_once("reset", id, || self.backend.remove(id))?;
            debug!("student {} reset", id);
            Ok(())
        })
    }
}

fn retry_once(op: &str, id: &StudentId, mut f: impl FnMut() -> Result<()>) -> Result<()> {
    match f() {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!(
                "Warning: {} for student {} failed, retrying once: {}",
                op, id, first
            );
            f()
        }
    }
}
