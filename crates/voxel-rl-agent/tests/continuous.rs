//! Continuous agents, the adapter and reproducibility

use std::sync::Arc;

use voxel_rl_agent::{
    adapt, DqnAgent, DqnConfig, GaussianPgAgent, GaussianPgConfig, PpoAgent, PpoConfig,
    QTableAgent, RandomAgent, RbfSarsaAgent, RbfSarsaConfig, TabularConfig, UpdateRule,
};
use voxel_rl_core::converter::{BinaryOutput, ClusterBroadcast, DiscretizingInput, LeveledOutput};
use voxel_rl_core::{AgentConfig, ContinuousAgent, Lifecycle, RLError, ScheduleConfig};

fn base(seed: u64) -> AgentConfig {
    AgentConfig {
        exploration: ScheduleConfig::constant(0.2),
        learning_rate: ScheduleConfig::constant(0.05),
        seed: Some(seed),
        ..AgentConfig::default()
    }
}

/// Every continuous agent, built from one seed
fn agents(seed: u64) -> Vec<Box<dyn ContinuousAgent>> {
    let binary = Arc::new(BinaryOutput::new(2, 0.5).unwrap());
    let input = Arc::new(DiscretizingInput::unit(&[3, 3]).unwrap());
    let tabular = QTableAgent::new(
        9,
        4,
        TabularConfig {
            base: base(seed),
            rule: UpdateRule::ExpectedSarsa,
        },
    )
    .unwrap();

    vec![
        Box::new(adapt(tabular, input, binary.clone()).unwrap()),
        Box::new(
            RbfSarsaAgent::new(
                2,
                binary.clone(),
                RbfSarsaConfig {
                    base: base(seed),
                    ..RbfSarsaConfig::default()
                },
            )
            .unwrap(),
        ),
        Box::new(
            DqnAgent::new(
                2,
                binary,
                DqnConfig {
                    base: base(seed),
                    hidden: (6, 6),
                    batch_size: 4,
                    memory_capacity: 32,
                    target_sync_every: 5,
                    ..DqnConfig::default()
                },
            )
            .unwrap(),
        ),
        Box::new(
            GaussianPgAgent::new(
                2,
                2,
                GaussianPgConfig {
                    base: base(seed),
                    ..GaussianPgConfig::default()
                },
            )
            .unwrap(),
        ),
        Box::new(
            PpoAgent::new(
                2,
                2,
                PpoConfig {
                    base: base(seed),
                    hidden: (6, 6),
                    horizon: 10,
                    minibatch_size: 5,
                    ..PpoConfig::default()
                },
            )
            .unwrap(),
        ),
        Box::new(RandomAgent::new(2, vec![-0.5, -0.5], vec![0.5, 0.5], base(seed)).unwrap()),
    ]
}

fn drive(agent: &mut dyn ContinuousAgent, steps: usize) -> Vec<Vec<f64>> {
    let mut actions = Vec::with_capacity(steps);
    let mut observation = vec![0.2, 0.6];
    for t in 0..steps {
        let reward = observation[0] - observation[1];
        let action = agent.apply(t as f64, &observation, reward).unwrap();
        assert_eq!(action.len(), agent.action_dim());
        observation = vec![
            (observation[0] + 0.1 * action[0]).clamp(0.0, 1.0),
            (observation[1] + 0.1 * action[1]).clamp(0.0, 1.0),
        ];
        if t % 25 == 24 {
            agent.reset();
        }
        actions.push(action);
    }
    actions
}

#[test]
fn test_same_seed_same_actions() {
    for (mut a, mut b) in agents(77).into_iter().zip(agents(77)) {
        let name = a.snapshot().algorithm;
        assert_eq!(drive(a.as_mut(), 60), drive(b.as_mut(), 60), "{name} diverged");
    }
}

#[test]
fn test_reinitialize_restarts_counters() {
    for mut agent in agents(5) {
        drive(agent.as_mut(), 30);
        assert!(agent.snapshot().episode >= 1);
        agent.reinitialize();
        let snapshot = agent.snapshot();
        assert_eq!(snapshot.episode, 0, "{}", snapshot.algorithm);
        assert_eq!(snapshot.steps, 0, "{}", snapshot.algorithm);
    }
}

#[test]
fn test_wrong_observation_length_is_rejected_everywhere() {
    for mut agent in agents(6) {
        let result = agent.apply(0.0, &[0.1, 0.2, 0.3], 0.0);
        assert!(
            matches!(result, Err(RLError::DimensionMismatch { expected: 2, actual: 3, .. })),
            "{}",
            agent.snapshot().algorithm
        );
    }
}

#[test]
fn test_snapshots_serialize() {
    for mut agent in agents(8) {
        drive(agent.as_mut(), 10);
        let json = agent.snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["steps"], 10);
        let snapshot = agent.snapshot();
        assert!(
            (0.0..=1.0).contains(&snapshot.exploration_rate),
            "{}",
            snapshot.algorithm
        );
    }
}

#[test]
fn test_adapter_with_cluster_broadcast() {
    // 3 levels on 2 clusters fan out to 4 actuators
    let leveled = LeveledOutput::new(2, 3, 1.0).unwrap();
    let output = Arc::new(ClusterBroadcast::new(leveled, vec![vec![0, 2], vec![1, 3]], 4).unwrap());
    let input = Arc::new(DiscretizingInput::unit(&[4, 4]).unwrap());
    let tabular = QTableAgent::new(
        16,
        9,
        TabularConfig {
            base: AgentConfig {
                exploration: ScheduleConfig::constant(0.0),
                init: voxel_rl_core::GaussianInit { mean: 0.0, std: 0.0 },
                seed: Some(1),
                ..AgentConfig::default()
            },
            ..TabularConfig::default()
        },
    )
    .unwrap();

    let mut adapter = adapt(tabular, input, output).unwrap();
    let action = adapter.apply(0.0, &[0.3, 0.7], 0.0).unwrap();
    // action 0 is the lowest level on both clusters
    assert_eq!(action, vec![-1.0, -1.0, -1.0, -1.0]);
    assert_eq!(
        adapter.snapshot().state,
        Some(voxel_rl_core::StepView::Index(6))
    );
}

#[test]
fn test_adapter_rejects_converter_mismatch() {
    let input = Arc::new(DiscretizingInput::unit(&[4, 4]).unwrap());
    let output = Arc::new(BinaryOutput::new(3, 1.0).unwrap());
    let tabular = QTableAgent::new(16, 4, TabularConfig::default()).unwrap();
    assert!(matches!(
        adapt(tabular, input, output),
        Err(RLError::DimensionMismatch { expected: 4, actual: 8, .. })
    ));
}
