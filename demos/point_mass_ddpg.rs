//! Example: DDPG steering a point mass to the origin

use quadrl::activations::Activation;
use quadrl::ddpg::{DdpgConfig, DdpgLearner};
use quadrl::environment::{Environment, PointMass};
use quadrl::evaluation::DeterministicPolicyEvaluation;
use quadrl::exploration::GaussianNoise;
use quadrl::network::NeuralNetwork;
use quadrl::optimizer::{Adam, OptimizerWrapper};
use quadrl::playground::Playground;
use quadrl::replay_buffer::ExperienceBuffer;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env = PointMass::new(42);
    let (low, high) = env.action_bounds();

    let actor = NeuralNetwork::with_seed(
        &[env.observation_size(), 64, 64, env.action_size()],
        &[Activation::Relu, Activation::Relu, Activation::Tanh],
        OptimizerWrapper::Adam(Adam::default()),
        1e-4,
        1,
    )?;
    let critic = NeuralNetwork::with_seed(
        &[env.observation_size() + env.action_size(), 64, 64, 1],
        &[Activation::Relu, Activation::Relu, Activation::Linear],
        OptimizerWrapper::Adam(Adam::default()),
        1e-3,
        2,
    )?;

    let learner = DdpgLearner::new(
        actor,
        critic,
        GaussianNoise::new(0.2, 1e-4, 0.05, low, high)?,
        ExperienceBuffer::new(20_000)?,
        DeterministicPolicyEvaluation::new(0.99)?,
        DdpgConfig {
            sample_size: 128,
            update_factor: 0.01,
            seed: Some(42),
            ..DdpgConfig::default()
        },
    )?;

    let mut playground = Playground::new(env, learner);
    let summaries = playground.fit(100, 200)?;
    if let Some(last) = summaries.last() {
        println!(
            "last episode: reward {:.2} over {} steps, critic loss {:?}",
            last.reward,
            last.steps,
            last.metrics.get("critic_loss")
        );
    }

    let score = playground.test(5, 200)?;
    println!("Total score: {:.2}", score);
    Ok(())
}
