use crate::backend::StateBackend;
use crate::error::Result;
use lernstufe_core::{BanditState, StudentId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    states: RwLock<HashMap<StudentId, BanditState>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of students with stored state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self, id: &StudentId) -> Result<Option<BanditState>> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        Ok(states.get(id).cloned())
    }

    fn commit(&self, id: &StudentId, state: &BanditState) -> Result<()> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.insert(id.clone(), state.clone());
        Ok(())
    }

    fn remove(&self, id: &StudentId) -> Result<()> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.remove(id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use lernstufe_core::{Arm, Observation, Reward};

    #[test]
    fn commit_load_remove() {
        let backend = MemoryBackend::new();
        let id = StudentId::parse("s1").unwrap();
        assert!(backend.load(&id).unwrap().is_none());

        let state = BanditState::from_observations([Observation::new(Arm(2), Reward::Correct)]);
        backend.commit(&id, &state).unwrap();
        assert_eq!(backend.load(&id).unwrap(), Some(state));
        assert_eq!(backend.len(), 1);

        backend.remove(&id).unwrap();
        backend.remove(&id).unwrap();
        assert!(backend.load(&id).unwrap().is_none());
        assert!(backend.is_empty());
    }
}
