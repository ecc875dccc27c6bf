//! Statistische Eigenschaften der Policy über viele Ziehungen mit festem Seed.

use lernstufe_bandits::{ChoiceReason, DifficultyBandit};
use lernstufe_core::{Arm, BanditState, Observation, Reward};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

fn state_from(pulls: &[(u8, Reward, usize)]) -> BanditState {
    BanditState::from_observations(pulls.iter().flat_map(|&(arm, reward, n)| {
        std::iter::repeat(Observation::new(Arm(arm), reward)).take(n)
    }))
}

fn histogram(
    bandit: &DifficultyBandit,
    state: &BanditState,
    trials: usize,
    seed: u64,
) -> BTreeMap<Arm, usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts = BTreeMap::new();
    for _ in 0..trials {
        let choice = bandit.next(state, &mut rng).expect("choice");
        *counts.entry(choice.arm).or_insert(0) += 1;
    }
    counts
}

#[test]
fn new_student_gets_uniform_cold_start() {
    let bandit = DifficultyBandit::default();
    let state = BanditState::default();
    let counts = histogram(&bandit, &state, 1000, 11);

    assert_eq!(counts.len(), 5);
    for arm in 1..=5 {
        let n = counts.get(&Arm(arm)).copied().unwrap_or(0);
        assert!((140..=260).contains(&n), "arm {arm} drawn {n} times");
    }
}

#[test]
fn sufficiently_sampled_arm_is_not_served_during_cold_start() {
    let bandit = DifficultyBandit::default();
    let state = state_from(&[(3, Reward::Correct, 3)]);
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..1000 {
        let choice = bandit.next(&state, &mut rng).expect("choice");
        assert_ne!(choice.arm, Arm(3));
        assert_eq!(choice.why, ChoiceReason::ColdStart);
    }
}

#[test]
fn cold_start_only_returns_under_sampled_arms() {
    let bandit = DifficultyBandit::default();
    let layouts: [&[(u8, Reward, usize)]; 4] = [
        &[(1, Reward::Correct, 3), (2, Reward::Incorrect, 5)],
        &[(1, Reward::Correct, 2), (2, Reward::Incorrect, 3), (5, Reward::Correct, 9)],
        &[
            (1, Reward::Correct, 3),
            (2, Reward::Correct, 3),
            (3, Reward::Correct, 3),
            (4, Reward::Correct, 3),
        ],
        &[(4, Reward::Incorrect, 1)],
    ];
    for (i, layout) in layouts.iter().enumerate() {
        let state = state_from(layout);
        let allowed = bandit.under_sampled(&state);
        assert!(!allowed.is_empty());
        let mut rng = StdRng::seed_from_u64(100 + i as u64);
        for _ in 0..300 {
            let arm = bandit.next(&state, &mut rng).expect("choice").arm;
            assert!(allowed.contains(&arm), "layout {i}: {arm} not under-sampled");
        }
    }
}

#[test]
fn best_arm_is_exploited_at_configured_rate() {
    let bandit = DifficultyBandit::default();
    let state = state_from(&[
        (4, Reward::Correct, 3),
        (2, Reward::Incorrect, 3),
        (1, Reward::Incorrect, 2),
        (1, Reward::Correct, 1),
        (3, Reward::Incorrect, 2),
        (3, Reward::Correct, 1),
        (5, Reward::Incorrect, 2),
        (5, Reward::Correct, 1),
    ]);
    let best: Vec<Arm> = bandit.best_arms(&state).iter().map(|s| s.arm).collect();
    assert_eq!(best, vec![Arm(4)]);

    let trials = 10_000;
    let mut rng = StdRng::seed_from_u64(13);
    let mut exploited = 0usize;
    let mut explored = BTreeMap::new();
    for _ in 0..trials {
        let choice = bandit.next(&state, &mut rng).expect("choice");
        match choice.why {
            ChoiceReason::Exploit => {
                assert_eq!(choice.arm, Arm(4));
                exploited += 1;
            }
            ChoiceReason::Explore => {
                assert_ne!(choice.arm, Arm(4));
                *explored.entry(choice.arm).or_insert(0usize) += 1;
            }
            other => panic!("unexpected branch {other:?}"),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let rate = exploited as f64 / trials as f64;
    assert!((0.67..=0.73).contains(&rate), "exploit rate {rate}");
    // Explorationen verteilen sich auf die vier übrigen Stufen.
    assert_eq!(explored.len(), 4);
    for (arm, n) in &explored {
        assert!((600..=900).contains(n), "arm {arm} explored {n} times");
    }
}

#[test]
fn scores_follow_laplace_smoothing() {
    let bandit = DifficultyBandit::default();
    let state = state_from(&[
        (4, Reward::Correct, 3),
        (2, Reward::Incorrect, 3),
        (1, Reward::Correct, 1),
    ]);
    let scores = bandit.scores(&state);
    assert_eq!(scores.len(), 2, "arm 1 is below the exploit threshold");
    let by_arm: BTreeMap<Arm, f64> = scores.iter().map(|s| (s.arm, s.mean)).collect();
    assert!((by_arm[&Arm(4)] - 0.8).abs() < 1e-12);
    assert!((by_arm[&Arm(2)] - 0.2).abs() < 1e-12);
}
