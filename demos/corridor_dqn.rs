//! Example: DQN walking a corridor
//!
//! Pass a JSON training configuration as the first argument to override the
//! built-in settings. `RUST_LOG=debug` shows target syncs and training steps.

use quadrl::config::AgentConfig;
use quadrl::environment::{Corridor, Environment};
use quadrl::playground::Playground;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::from_json_file(path)?,
        None => AgentConfig {
            max_memory_len: 4096,
            exploration_decay: 5e-3,
            exploration_minimum: 0.05,
            discount: 0.9,
            hidden_layers: vec![32, 32],
            sample_size: 64,
            learning_rate: 1e-3,
            update_period: 20,
            update_factor: 1.0,
            generations: 3,
            episodes_per_gen: 50,
            max_steps: 50,
            test_episodes: 5,
            seed: Some(7),
            ..AgentConfig::default()
        },
    };

    let corridor = Corridor::new(8)?;
    let mut learner = config.build_dqn(corridor.observation_size(), corridor.n_actions())?;
    if let Some(path) = &config.load_path {
        learner.load(path)?;
    }

    let mut playground = Playground::new(corridor, learner);
    if !config.test_only {
        for generation in 0..config.generations {
            playground.fit(config.episodes_per_gen, config.max_steps)?;
            let recent = playground.tracker().avg_episode_reward(config.episodes_per_gen);
            println!("generation {}: mean episode reward {:?}", generation, recent);

            if let Some(prefix) = &config.save_path {
                let path = format!("{}{}", prefix.display(), generation);
                playground.agent().save(path)?;
            }
        }
    }

    let score = playground.test(config.test_episodes, config.max_steps)?;
    println!("Total score: {:.2}", score);
    Ok(())
}
