//! Example: tabular Q-learning driving a one-dimensional walker
//!
//! The walker sits on `[0, 1]` and is pushed left or right each tick. The
//! reward is the negative distance to a goal. A Q-learning agent sees the
//! position through a 10-bin input converter and acts through a binary
//! output converter; a random agent runs alongside for comparison.

use std::sync::Arc;

use voxel_rl_agent::prelude::*;
use voxel_rl_core::converter::{BinaryOutput, DiscretizingInput};
use voxel_rl_core::ScheduleConfig;

const GOAL: f64 = 0.8;
const EPISODES: usize = 60;
const STEPS: usize = 100;

struct Walker {
    position: f64,
}

impl Walker {
    fn reward(&self) -> f64 {
        -(self.position - GOAL).abs()
    }

    fn push(&mut self, force: f64) {
        self.position = (self.position + force).clamp(0.0, 1.0);
    }
}

fn run_episode(agent: &mut dyn ContinuousAgent, time: &mut f64) -> anyhow::Result<f64> {
    let mut walker = Walker { position: 0.1 };
    let mut reward = 0.0;
    let mut total = 0.0;
    for _ in 0..STEPS {
        let action = agent.apply(*time, &[walker.position], reward)?;
        walker.push(action[0]);
        reward = walker.reward();
        total += reward;
        *time += 0.01;
    }
    agent.reset();
    Ok(total)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let base = AgentConfig {
        exploration: ScheduleConfig::inverse(),
        learning_rate: ScheduleConfig::constant(0.2),
        seed: Some(7),
        ..AgentConfig::default()
    };

    let input = Arc::new(DiscretizingInput::unit(&[10])?);
    let output = Arc::new(BinaryOutput::new(1, 0.05)?);
    let config = TabularConfig {
        base: base.clone(),
        ..TabularConfig::default()
    };
    let tabular = QTableAgent::new(10, 2, config)?;
    let mut learner = adapt(tabular, input, output)?;
    let mut baseline = RandomAgent::new(1, vec![-0.05], vec![0.05], base)?;

    let mut time = 0.0;
    for episode in 0..EPISODES {
        let learned = run_episode(&mut learner, &mut time)?;
        let random = run_episode(&mut baseline, &mut time)?;
        if episode % 10 == 9 {
            println!(
                "Episode {}: Q-learning = {:.2}, random = {:.2}",
                episode + 1,
                learned,
                random
            );
        }
    }

    let snapshot = learner.snapshot();
    println!("\nFinal exploration rate: {:.3}", snapshot.exploration_rate);
    println!("{}", snapshot.to_json()?);

    Ok(())
}
