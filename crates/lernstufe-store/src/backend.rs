use crate::error::Result;
use lernstufe_core::{BanditState, StudentId};
use std::fs::File;
use std::sync::Arc;

/// Lock on one id that other processes sharing the backend respect.
/// Released on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct BackendLock {
    _file: Option<File>,
}

impl BackendLock {
    /// Guard for backends that no other process can reach.
    pub fn process_local() -> Self {
        Self { _file: None }
    }

    pub(crate) fn file(file: File) -> Self {
        Self { _file: Some(file) }
    }
}

/// Persistence primitive underneath [`BanditStore`](crate::BanditStore).
///
/// Within one process the store guarantees that `commit` and `remove` for one
/// id never overlap with each other or with a `load` of the same id. Backends
/// that several processes can open at once extend that guarantee through
/// [`lock_shared`](Self::lock_shared) and [`lock_exclusive`](Self::lock_exclusive),
/// which the store holds around every load and every read-modify-write.
pub trait StateBackend: Send + Sync {
    /// Latest committed state, or `None` if the id has never been stored.
    fn load(&self, id: &StudentId) -> Result<Option<BanditState>>;

    /// Replaces the stored state as one atomic unit.
    fn commit(&self, id: &StudentId, state: &BanditState) -> Result<()>;

    /// Removes every artifact for `id`. Removing an unknown id succeeds.
    fn remove(&self, id: &StudentId) -> Result<()>;

    /// Blocks until no other process holds the exclusive lock of `id`.
    fn lock_shared(&self, _id: &StudentId) -> Result<BackendLock> {
        Ok(BackendLock::process_local())
    }

    /// Blocks until no other process holds any lock of `id`.
    fn lock_exclusive(&self, _id: &StudentId) -> Result<BackendLock> {
        Ok(BackendLock::process_local())
    }
}

impl<B: StateBackend + ?Sized> StateBackend for Arc<B> {
    fn load(&self, id: &StudentId) -> Result<Option<BanditState>> {
        (**self).load(id)
    }

    fn commit(&self, id: &StudentId, state: &BanditState) -> Result<()> {
        (**self).commit(id, state)
    }

    fn remove(&self, id: &StudentId) -> Result<()> {
        (**self).remove(id)
    }

    fn lock_shared(&self, id: &StudentId) -> Result<BackendLock> {
        (**self).lock_shared(id)
    }

    fn lock_exclusive(&self, id: &StudentId) -> Result<BackendLock> {
        (**self).lock_exclusive(id)
    }
}

impl<B: StateBackend + ?Sized> StateBackend for Box<B> {
    fn load(&self, id: &StudentId) -> Result<Option<BanditState>> {
        (**self).load(id)
    }

    fn commit(&self, id: &StudentId, state: &BanditState) -> Result<()> {
        (**self).commit(id, state)
    }

    fn remove(&self, id: &StudentId) -> Result<()> {
        (**self).remove(id)
    }

    fn lock_shared(&self, id: &StudentId) -> Result<BackendLock> {
        (**self).lock_shared(id)
    }

    fn lock_exclusive(&self, id: &StudentId) -> Result<BackendLock> {
        (**self).lock_exclusive(id)
    }
}
