//! # Training configuration
//!
//! [`AgentConfig`] collects every knob of a DQN training run in one
//! serde-friendly struct. Missing JSON fields fall back to the defaults,
//! which reproduce the reference quadcopter training run.
//!
//! ```rust,no_run
//! use quadrl::config::AgentConfig;
//!
//! let config = AgentConfig::from_json_file("configs/dqn.json").unwrap();
//! let learner = config.build_dqn(6, 5).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::activations::Activation;
use crate::error::{Result, RlError};
use crate::evaluation::QLearning;
use crate::exploration::EpsilonGreedy;
use crate::learner::{DqnLearner, LearnerConfig};
use crate::loss::Loss;
use crate::network::NeuralNetwork;
use crate::optimizer::{Adam, OptimizerWrapper};
use crate::replay_buffer::{ExperienceBuffer, SampleMethod};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_memory_len: usize,

    pub exploration: f32,
    pub exploration_decay: f32,
    pub exploration_minimum: f32,

    pub discount: f32,

    pub hidden_layers: Vec<usize>,
    pub hidden_activation: Activation,

    pub sample_size: usize,
    pub learning_rate: f32,

    pub training_period: usize,
    pub update_period: usize,
    pub update_factor: f32,

    pub mem_method: SampleMethod,
    pub loss: Loss,
    pub strict_batch: bool,
    pub seed: Option<u64>,

    pub generations: usize,
    pub episodes_per_gen: usize,
    pub max_steps: usize,
    pub test_episodes: usize,
    pub test_only: bool,

    pub load_path: Option<PathBuf>,
    pub save_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            max_memory_len: 40960,
            exploration: 1.0,
            exploration_decay: 6e-7,
            exploration_minimum: 0.2,
            discount: 0.85,
            hidden_layers: vec![256, 128, 128, 64],
            hidden_activation: Activation::Relu,
            sample_size: 4096,
            learning_rate: 2.2e-5,
            training_period: 1,
            update_period: 20,
            update_factor: 0.2,
            mem_method: SampleMethod::Random,
            loss: Loss::Mse,
            strict_batch: false,
            seed: None,
            generations: 1000,
            episodes_per_gen: 1000,
            max_steps: 1000,
            test_episodes: 5,
            test_only: false,
            load_path: None,
            save_path: None,
        }
    }
}

impl AgentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AgentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_len == 0 {
            return Err(RlError::configuration("max_memory_len", "must be at least 1"));
        }
        if self.hidden_layers.contains(&0) {
            return Err(RlError::configuration("hidden_layers", "layer sizes must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RlError::configuration(
                "learning_rate",
                format!("must be positive and finite, got {}", self.learning_rate),
            ));
        }
        if self.max_steps == 0 {
            return Err(RlError::configuration("max_steps", "must be at least 1"));
        }
        EpsilonGreedy::new(self.exploration, self.exploration_decay, self.exploration_minimum)?;
        QLearning::new(self.discount)?;
        self.learner_config().validate()
    }

    pub fn learner_config(&self) -> LearnerConfig {
        LearnerConfig {
            sample_size: self.sample_size,
            training_period: self.training_period,
            update_period: self.update_period,
            update_factor: self.update_factor,
            sample_method: self.mem_method,
            loss: self.loss,
            strict_batch: self.strict_batch,
            seed: self.seed,
        }
    }

    /// Assemble a learner whose network maps `observation_size` inputs to
    /// `n_actions` values through the configured hidden layers, trained with
    /// Adam.
    pub fn build_dqn(&self, observation_size: usize, n_actions: usize) -> Result<DqnLearner<NeuralNetwork>> {
        self.validate()?;

        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(observation_size);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(n_actions);

        let mut activations = vec![self.hidden_activation; self.hidden_layers.len()];
        activations.push(Activation::Linear);

        let optimizer = OptimizerWrapper::Adam(Adam::default());
        let network = match self.seed {
            Some(seed) => NeuralNetwork::with_seed(&sizes, &activations, optimizer, self.learning_rate, seed)?,
            None => NeuralNetwork::new(&sizes, &activations, optimizer, self.learning_rate, &mut rand::thread_rng())?,
        };

        DqnLearner::new(
            network,
            EpsilonGreedy::new(self.exploration, self.exploration_decay, self.exploration_minimum)?,
            ExperienceBuffer::new(self.max_memory_len)?,
            QLearning::new(self.discount)?,
            self.learner_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = AgentConfig::default();
        assert_eq!(config.max_memory_len, 40960);
        assert_eq!(config.sample_size, 4096);
        assert_eq!(config.update_period, 20);
        assert_eq!(config.mem_method, SampleMethod::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AgentConfig::from_json_str(r#"{"discount": 0.5, "mem_method": "last"}"#).unwrap();
        assert_eq!(config.discount, 0.5);
        assert_eq!(config.mem_method, SampleMethod::Last);
        assert_eq!(config.exploration_minimum, 0.2);
    }

    #[test]
    fn test_invalid_json_values_are_rejected() {
        assert!(AgentConfig::from_json_str(r#"{"discount": 1.0}"#).is_err());
        assert!(AgentConfig::from_json_str(r#"{"update_period": 0}"#).is_err());
        assert!(AgentConfig::from_json_str(r#"{"mem_method": "oldest"}"#).is_err());
    }

    #[test]
    fn test_build_dqn_shapes() {
        let config = AgentConfig {
            hidden_layers: vec![8],
            max_memory_len: 16,
            seed: Some(1),
            ..AgentConfig::default()
        };
        let learner = config.build_dqn(6, 5).unwrap();
        assert_eq!(learner.live().input_size(), 6);
        assert_eq!(learner.live().output_size(), 5);
        assert_eq!(learner.memory().capacity(), 16);
    }
}
