//! Behavioural tests for the tabular agent family

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use voxel_rl_agent::{QTableAgent, TabularConfig, UpdateRule};
use voxel_rl_core::{AgentConfig, DiscreteAgent, GaussianInit, Lifecycle, ScheduleConfig};

fn config(
    rule: UpdateRule,
    exploration: ScheduleConfig,
    alpha: f64,
    gamma: f64,
    seed: u64,
) -> TabularConfig {
    TabularConfig {
        base: AgentConfig {
            gamma,
            exploration,
            learning_rate: ScheduleConfig::constant(alpha),
            init: GaussianInit { mean: 0.0, std: 0.0 },
            seed: Some(seed),
            ..AgentConfig::default()
        },
        rule,
    }
}

/// Two states: in state 0 action 1 moves to state 1; in state 1 action 0
/// pays 1 and stays. Every other move pays nothing.
fn two_state_step(state: usize, action: usize) -> (usize, f64) {
    match (state, action) {
        (0, 1) => (1, 0.0),
        (0, _) => (0, 0.0),
        (1, 0) => (1, 1.0),
        _ => (0, 0.0),
    }
}

#[test]
fn test_q_learning_finds_two_state_optimum() {
    let mut agent = QTableAgent::new(
        2,
        2,
        config(UpdateRule::QLearning, ScheduleConfig::inverse(), 0.5, 0.9, 2024),
    )
    .unwrap();

    let mut time = 0.0;
    for _ in 0..300 {
        let mut state = 0;
        let mut reward = 0.0;
        for _ in 0..20 {
            let action = agent.apply(time, state, reward).unwrap();
            (state, reward) = two_state_step(state, action);
            time += 1.0;
        }
        agent.reset();
    }

    assert_eq!(agent.greedy_action(0).unwrap(), 1);
    assert_eq!(agent.greedy_action(1).unwrap(), 0);
}

#[test]
fn test_sarsa_lambda_finds_two_state_optimum() {
    let mut agent = QTableAgent::new(
        2,
        2,
        config(UpdateRule::Sarsa { lambda: 0.5 }, ScheduleConfig::inverse(), 0.3, 0.9, 99),
    )
    .unwrap();

    let mut time = 0.0;
    for _ in 0..300 {
        let mut state = 0;
        let mut reward = 0.0;
        for _ in 0..20 {
            let action = agent.apply(time, state, reward).unwrap();
            (state, reward) = two_state_step(state, action);
            time += 1.0;
        }
        agent.reset();
    }

    assert_eq!(agent.greedy_action(0).unwrap(), 1);
    assert_eq!(agent.greedy_action(1).unwrap(), 0);
}

const START: usize = 0;
const NOISY: usize = 1;
const TERMINAL: usize = 2;
const ACTIONS: usize = 10;

/// Counts how often the start state sends the agent into the noisy state,
/// whose every action pays N(-0.1, 1)
fn risky_choices(rule: UpdateRule, seed: u64) -> usize {
    let mut agent = QTableAgent::new(
        3,
        ACTIONS,
        config(rule, ScheduleConfig::constant(0.1), 0.1, 1.0, seed),
    )
    .unwrap();
    let mut env_rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let payout = Normal::new(-0.1, 1.0).unwrap();

    let mut risky = 0;
    let mut time = 0.0;
    for _ in 0..300 {
        let first = agent.apply(time, START, 0.0).unwrap();
        if first == 0 {
            agent.apply(time, TERMINAL, 0.0).unwrap();
        } else {
            risky += 1;
            agent.apply(time, NOISY, 0.0).unwrap();
            agent.apply(time, TERMINAL, payout.sample(&mut env_rng)).unwrap();
        }
        agent.reset();
        time += 1.0;
    }
    risky
}

#[test]
fn test_double_q_is_less_optimistic_than_q_learning() {
    let seeds = 0..20;
    let single: usize = seeds.clone().map(|s| risky_choices(UpdateRule::QLearning, s)).sum();
    let double: usize = seeds.map(|s| risky_choices(UpdateRule::DoubleQ, s)).sum();
    assert!(
        double < single,
        "double Q chose the noisy branch {double} times, Q-learning {single} times"
    );
}

#[test]
fn test_every_rule_keeps_rates_in_unit_interval() {
    for rule in [
        UpdateRule::QLearning,
        UpdateRule::Sarsa { lambda: 0.9 },
        UpdateRule::WatkinsQ { lambda: 0.9 },
        UpdateRule::ExpectedSarsa,
        UpdateRule::DoubleQ,
    ] {
        let exploration = ScheduleConfig::constant(3.0);
        let mut agent = QTableAgent::new(4, 3, config(rule, exploration, 2.0, 0.9, 1)).unwrap();
        for t in 0..50 {
            agent.apply(f64::from(t), t as usize % 4, 1.0).unwrap();
        }
        let snapshot = agent.snapshot();
        assert_eq!(snapshot.algorithm, rule.name());
        assert!((0.0..=1.0).contains(&snapshot.exploration_rate));
        assert!((0.0..=1.0).contains(&snapshot.learning_rate));
        assert!(agent.q_table().iter().all(|q| q.is_finite()));
    }
}

#[test]
fn test_config_from_json() {
    let config: TabularConfig = voxel_rl_core::config::from_json(
        r#"{"gamma": 0.8, "seed": 3, "rule": {"kind": "sarsa", "lambda": 0.7}}"#,
    )
    .unwrap();
    assert_eq!(config.rule, UpdateRule::Sarsa { lambda: 0.7 });
    assert!((config.base.gamma - 0.8).abs() < 1e-12);
    assert!(QTableAgent::new(2, 2, config).unwrap().traces().is_some());
}
