//! The only two paths that change stored state.

use crate::error::Result;
use lernstufe_core::{ArmRegistry, ArmStats, Observation, Reward, StudentId, ValidationError};
use lernstufe_store::{BanditStore, StateBackend};
use std::sync::Arc;

/// Validates outcomes and applies them to a student's state.
#[derive(Debug)]
pub struct UpdateService<B> {
    registry: ArmRegistry,
    store: Arc<BanditStore<B>>,
}

impl<B: StateBackend> UpdateService<B> {
    pub fn new(registry: ArmRegistry, store: Arc<BanditStore<B>>) -> Self {
        Self { registry, store }
    }

    /// Parses and records one outcome. Returns the updated statistics of the
    /// served arm.
    ///
    /// # Errors
    /// [`ApiError::Validation`](crate::ApiError::Validation) for a missing id,
    /// an unknown decision or a reward other than 0/1, in which case the
    /// store is never touched; otherwise persistence failures.
    pub fn record_outcome(&self, student_id: &str, decision: &str, reward: &str) -> Result<ArmStats> {
        let id = StudentId::parse(student_id)?;
        let arm = self.registry.parse_arm(decision)?;
        let reward = Reward::parse(reward)?;
        self.record(&id, Observation::new(arm, reward))
    }

    /// Records an already typed observation.
    ///
    /// # Errors
    /// [`ValidationError::UnknownArm`] if the arm is not registered, else
    /// persistence failures.
    pub fn record(&self, id: &StudentId, obs: Observation) -> Result<ArmStats> {
        if !self.registry.contains(obs.arm) {
            return Err(ValidationError::UnknownArm {
                raw: obs.arm.to_string(),
            }
            .into());
        }
        let state = self.store.apply(id, obs)?;
        info!(
            "recorded outcome student={} arm={} reward={}",
            id,
            obs.arm,
            obs.reward.value()
        );
        Ok(state.stats(obs.arm))
    }
}

/// Clears a student's learned state.
#[derive(Debug)]
pub struct ResetService<B> {
    store: Arc<BanditStore<B>>,
}

impl<B: StateBackend> ResetService<B> {
    pub fn new(store: Arc<BanditStore<B>>) -> Self {
        Self { store }
    }

    /// Removes history and statistics of `student_id` together. Resetting an
    /// unknown or already reset id succeeds.
    ///
    /// # Errors
    /// Missing id or persistence failures.
    pub fn reset(&self, student_id: &str) -> Result<()> {
        let id = StudentId::parse(student_id)?;
        self.store.reset(&id)?;
        info!("reset student={}", id);
        Ok(())
    }
}
