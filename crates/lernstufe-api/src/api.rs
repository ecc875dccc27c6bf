use crate::error::Result;
use crate::service::{ResetService, UpdateService};
use lernstufe_bandits::{Choice, DifficultyBandit};
use lernstufe_core::{Arm, ArmRegistry, ArmStats, StudentId};
use lernstufe_store::{BanditStore, StateBackend};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-arm view of a student's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSummary {
    pub arm: Arm,
    pub pulls: u64,
    pub successes: u64,
    pub mean: f64,
    /// Reached `min_samples_for_exploit`, so the mean takes part in exploitation.
    pub trusted: bool,
}

/// Read-only snapshot of what the bandit has learned about one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub student_id: String,
    pub observations: usize,
    pub arms: Vec<ArmSummary>,
    pub under_sampled: Vec<Arm>,
    pub best: Vec<Arm>,
}

/// Randomness for decisions. Every call draws from a generator of its own,
/// so concurrent decisions never wait on each other.
#[derive(Debug)]
enum RandomSource {
    /// Thread-local generator seeded from the OS.
    Entropy,
    /// Call `n` uses a generator derived from `seed` and `n`, so a run with
    /// the same seed and call order replays the same decisions.
    Seeded { seed: u64, calls: AtomicU64 },
}

impl RandomSource {
    fn seeded_generator(seed: u64, call: u64) -> StdRng {
        StdRng::seed_from_u64(seed ^ call.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

/// Boundary exposing next/record/reset (and stats) for callers.
///
/// Production draws from entropy, tests pass a fixed seed.
#[derive(Debug)]
pub struct DecisionApi<B> {
    policy: DifficultyBandit,
    store: Arc<BanditStore<B>>,
    updates: UpdateService<B>,
    resets: ResetService<B>,
    random: RandomSource,
}

impl<B: StateBackend> DecisionApi<B> {
    /// Api drawing from an entropy-seeded random source.
    pub fn from_entropy(registry: ArmRegistry, backend: B) -> Self {
        Self::with_source(registry, backend, RandomSource::Entropy)
    }

    /// Api with reproducible randomness.
    pub fn seeded(registry: ArmRegistry, backend: B, seed: u64) -> Self {
        Self::with_source(
            registry,
            backend,
            RandomSource::Seeded {
                seed,
                calls: AtomicU64::new(0),
            },
        )
    }

    fn with_source(registry: ArmRegistry, backend: B, random: RandomSource) -> Self {
        let store = Arc::new(BanditStore::new(backend));
        Self {
            policy: DifficultyBandit::new(registry.clone()),
            updates: UpdateService::new(registry, Arc::clone(&store)),
            resets: ResetService::new(Arc::clone(&store)),
            store,
            random,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ArmRegistry {
        self.policy.registry()
    }

    pub fn store(&self) -> &BanditStore<B> {
        &self.store
    }

    /// Next difficulty to serve.
    ///
    /// # Errors
    /// Missing id (before any state access) or a failed load.
    pub fn next(&self, student_id: &str) -> Result<Arm> {
        Ok(self.decide(student_id)?.arm)
    }

    /// Like [`next`](Self::next), but also reports which branch chose the arm.
    ///
    /// # Errors
    /// See [`next`](Self::next).
    pub fn decide(&self, student_id: &str) -> Result<Choice> {
        let id = StudentId::parse(student_id)?;
        let state = self.store.get(&id)?;
        let choice = match &self.random {
            RandomSource::Entropy => self.policy.next(&state, &mut rand::thread_rng())?,
            RandomSource::Seeded { seed, calls } => {
                let call = calls.fetch_add(1, Ordering::Relaxed);
                let mut rng = RandomSource::seeded_generator(*seed, call);
                self.policy.next(&state, &mut rng)?
            }
        };
        debug!(
            "next difficulty student={} arm={} why={:?}",
            id, choice.arm, choice.why
        );
        Ok(choice)
    }

    /// Records an outcome; `decision` and `reward` are raw caller input.
    ///
    /// # Errors
    /// Validation failures (state unchanged) or persistence failures.
    pub fn record(&self, student_id: &str, decision: &str, reward: &str) -> Result<ArmStats> {
        self.updates.record_outcome(student_id, decision, reward)
    }

    /// Clears everything learned about the student.
    ///
    /// # Errors
    /// Missing id or persistence failures.
    pub fn reset(&self, student_id: &str) -> Result<()> {
        self.resets.reset(student_id)
    }

    /// Per-arm statistics of the student. Never mutates.
    ///
    /// # Errors
    /// Missing id or a failed load.
    pub fn stats(&self, student_id: &str) -> Result<StudentSummary> {
        let id = StudentId::parse(student_id)?;
        let state = self.store.get(&id)?;
        let registry = self.policy.registry();
        let min = u64::from(registry.min_samples_for_exploit());
        let arms = registry
            .arms()
            .iter()
            .map(|&arm| {
                let ArmStats { pulls, successes } = state.stats(arm);
                ArmSummary {
                    arm,
                    pulls,
                    successes,
                    mean: state.stats(arm).smoothed_mean(),
                    trusted: pulls >= min,
                }
            })
            .collect();
        Ok(StudentSummary {
            student_id: id.to_string(),
            observations: state.history().len(),
            arms,
            under_sampled: self.policy.under_sampled(&state),
            best: self.policy.best_arms(&state).iter().map(|s| s.arm).collect(),
        })
    }
}
