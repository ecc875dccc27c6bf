//! Simuliert einen Lernenden mit festen Erfolgswahrscheinlichkeiten je Stufe
//! und zeigt, wohin der Bandit nach einigen hundert Fragen konvergiert.
//!
//! Aufruf: `cargo run -p lernstufe-bandits --example simulate -- [runden] [seed]`

use lernstufe_bandits::{ChoiceReason, DifficultyBandit};
use lernstufe_core::{Arm, BanditState, Observation, Reward};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Erfolgswahrscheinlichkeit des simulierten Lernenden je Stufe.
const SKILL: [(u8, f64); 5] = [(1, 0.55), (2, 0.7), (3, 0.85), (4, 0.6), (5, 0.3)];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let rounds: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(500);
    let seed: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(42);

    let bandit = DifficultyBandit::default();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = BanditState::default();
    let mut reasons: BTreeMap<String, usize> = BTreeMap::new();

    for _ in 0..rounds {
        let choice = bandit.next(&state, &mut rng)?;
        let p = SKILL
            .iter()
            .find(|(level, _)| Arm(*level) == choice.arm)
            .map_or(0.0, |(_, p)| *p);
        let reward = if rng.gen::<f64>() < p {
            Reward::Correct
        } else {
            Reward::Incorrect
        };
        state.record(Observation::new(choice.arm, reward));
        let key = match choice.why {
            ChoiceReason::ColdStart => "cold_start",
            ChoiceReason::Fallback => "fallback",
            ChoiceReason::Exploit => "exploit",
            ChoiceReason::Explore => "explore",
        };
        *reasons.entry(key.to_string()).or_default() += 1;
    }

    println!("level\tpulls\tsuccesses\tmean");
    for &arm in bandit.registry().arms() {
        let stats = state.stats(arm);
        println!(
            "{}\t{}\t{}\t{:.3}",
            arm,
            stats.pulls,
            stats.successes,
            stats.smoothed_mean()
        );
    }
    let best: Vec<String> = bandit
        .best_arms(&state)
        .iter()
        .map(|s| s.arm.to_string())
        .collect();
    println!("best: {}", best.join(","));
    println!("branches: {reasons:?}");
    Ok(())
}
