//! # DQN learner
//!
//! [`DqnLearner`] ties the experience buffer, an exploration policy, a target
//! evaluator and two value-function instances (live and lagged target)
//! together behind a step-driven schedule:
//!
//! 1. every `update_period` observed steps the target is Polyak-updated
//!    towards the live instance;
//! 2. every `training_period` observed steps one batch is sampled, targets
//!    are bootstrapped from the target instance, one gradient step is applied
//!    to the live instance and exploration decays once.
//!
//! The step counter only moves in [`DqnLearner::remember`]; `learn` reads it.
//!
//! ```rust,no_run
//! use quadrl::learner::LearnerBuilder;
//! use quadrl::network::NeuralNetwork;
//! use quadrl::activations::Activation;
//! use quadrl::optimizer::{OptimizerWrapper, Adam};
//! use ndarray::array;
//!
//! let network = NeuralNetwork::with_seed(
//!     &[6, 64, 64, 5],
//!     &[Activation::Relu, Activation::Relu, Activation::Linear],
//!     OptimizerWrapper::Adam(Adam::default()),
//!     1e-3,
//!     7,
//! ).unwrap();
//!
//! let mut learner = LearnerBuilder::new(network)
//!     .memory_capacity(10_000)
//!     .discount(0.99)
//!     .exploration(1.0, 1e-3, 0.05)
//!     .training_period(4)
//!     .build()
//!     .unwrap();
//!
//! let observation = array![0.0, 0.1, 0.0, -0.2, 0.3, 0.0];
//! let action = learner.act(observation.view(), false).unwrap();
//! learner.remember(observation.clone(), action, 1.0, false, observation);
//! let metrics = learner.learn().unwrap();
//! ```

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, RlError};
use crate::evaluation::{Evaluation, QLearning};
use crate::exploration::{DiscreteControl, EpsilonGreedy};
use crate::loss::Loss;
use crate::metrics::Metrics;
use crate::playground::Agent;
use crate::replay_buffer::{ExperienceBuffer, SampleMethod, Transition};
use crate::value_function::{soft_update, Persistent, ValueFunction};

/// Scheduling and batch knobs of a [`DqnLearner`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Transitions per training batch
    pub sample_size: usize,
    /// Train when `global_step % training_period == 0`
    pub training_period: usize,
    /// Sync the target when `global_step % update_period == 0`
    pub update_period: usize,
    /// Polyak factor; 1 is a hard copy
    pub update_factor: f32,
    pub sample_method: SampleMethod,
    pub loss: Loss,
    /// Refuse to train on fewer than `sample_size` transitions
    pub strict_batch: bool,
    /// Seed for sampling and exploration; entropy when absent
    pub seed: Option<u64>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            sample_size: 32,
            training_period: 4,
            update_period: 1,
            update_factor: 1.0,
            sample_method: SampleMethod::Random,
            loss: Loss::Mse,
            strict_batch: false,
            seed: None,
        }
    }
}

impl LearnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(RlError::configuration("sample_size", "must be at least 1"));
        }
        if self.training_period == 0 {
            return Err(RlError::configuration("training_period", "must be at least 1"));
        }
        if self.update_period == 0 {
            return Err(RlError::configuration("update_period", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.update_factor) {
            return Err(RlError::configuration(
                "update_factor",
                format!("must lie in [0, 1], got {}", self.update_factor),
            ));
        }
        if let Loss::Huber { delta } = self.loss {
            if !(delta.is_finite() && delta > 0.0) {
                return Err(RlError::configuration(
                    "loss.delta",
                    format!("must be positive, got {}", delta),
                ));
            }
        }
        Ok(())
    }
}

/// Counters persisted next to a saved value function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub global_step: usize,
    pub training_steps: usize,
    pub exploration: f32,
}

/// Sidecar path holding the [`LearnerState`] for a model saved at `path`.
pub fn state_path<P: AsRef<Path>>(path: P) -> PathBuf {
    suffixed_path(path, ".state.json")
}

/// `path` with `suffix` appended to the full file name, keeping any extension.
pub(crate) fn suffixed_path<P: AsRef<Path>>(path: P, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_ref().as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn write_state<P: AsRef<Path>>(path: P, state: &LearnerState) -> Result<()> {
    fs::write(state_path(path), serde_json::to_string_pretty(state)?)?;
    Ok(())
}

pub(crate) fn read_state<P: AsRef<Path>>(path: P) -> Result<Option<LearnerState>> {
    let sidecar = state_path(path);
    if !sidecar.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(sidecar)?;
    Ok(Some(serde_json::from_str(&data)?))
}

pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Off-policy value learner over a discrete action set.
pub struct DqnLearner<V, C = EpsilonGreedy, E = QLearning> {
    live: V,
    target: V,
    control: C,
    memory: ExperienceBuffer<usize>,
    evaluation: E,
    config: LearnerConfig,
    global_step: usize,
    training_steps: usize,
    warned_underfilled: bool,
    rng: StdRng,
}

impl<V, C, E> DqnLearner<V, C, E>
where
    V: ValueFunction,
    C: DiscreteControl,
    E: Evaluation<V>,
{
    /// The target instance starts as a clone of `value_fn`.
    pub fn new(
        value_fn: V,
        control: C,
        memory: ExperienceBuffer<usize>,
        evaluation: E,
        config: LearnerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let rng = rng_from_seed(config.seed);
        let target = value_fn.clone();

        Ok(DqnLearner {
            live: value_fn,
            target,
            control,
            memory,
            evaluation,
            config,
            global_step: 0,
            training_steps: 0,
            warned_underfilled: false,
            rng,
        })
    }

    /// Query the live value function for one observation and pick an action.
    /// Only the exploration randomness is consumed.
    pub fn act(&mut self, observation: ArrayView1<f32>, greedy: bool) -> Result<usize> {
        let observations = observation.insert_axis(Axis(0));
        let values = self.live.forward(observations)?;
        let actions = self.control.select(values.view(), greedy, &mut self.rng);
        actions
            .first()
            .copied()
            .ok_or_else(|| RlError::NumericalError("value function returned an empty batch".to_string()))
    }

    /// Store a transition and advance the global step by one.
    pub fn remember(
        &mut self,
        observation: Array1<f32>,
        action: usize,
        reward: f32,
        done: bool,
        next_observation: Array1<f32>,
    ) {
        self.memory
            .remember(Transition::new(observation, action, reward, done, next_observation));
        self.global_step += 1;
    }

    /// Polyak-update the target instance towards the live one.
    pub fn sync_target(&mut self) -> Result<()> {
        soft_update(&mut self.target, &self.live, self.config.update_factor)?;
        debug!(
            step = self.global_step,
            update_factor = self.config.update_factor,
            "synchronized target value function"
        );
        Ok(())
    }

    /// Run the periodic actions due at the current step. Returns metrics
    /// when a training step happened.
    pub fn learn(&mut self) -> Result<Option<Metrics>> {
        if self.global_step % self.config.update_period == 0 {
            self.sync_target()?;
        }

        if self.global_step % self.config.training_period != 0 {
            return Ok(None);
        }

        let available = self.memory.len();
        if available == 0 {
            debug!(step = self.global_step, "skipping training: experience buffer is empty");
            return Ok(None);
        }
        if available < self.config.sample_size {
            if self.config.strict_batch {
                return Err(RlError::InsufficientData {
                    requested: self.config.sample_size,
                    available,
                });
            }
            if !self.warned_underfilled {
                warn!(
                    requested = self.config.sample_size,
                    available,
                    "training on an under-filled batch"
                );
                self.warned_underfilled = true;
            }
        }

        let batch = self
            .memory
            .sample(self.config.sample_size, self.config.sample_method, &mut self.rng)?;

        let targets = self.evaluation.evaluate(
            batch.rewards.view(),
            &batch.dones,
            batch.next_observations.view(),
            &self.target,
        )?;

        let values = self.live.forward(batch.observations.view())?;
        let n_actions = values.ncols();
        let taken = batch
            .actions
            .iter()
            .enumerate()
            .map(|(row, &action)| {
                if action < n_actions {
                    Ok(values[[row, action]])
                } else {
                    Err(RlError::invalid_argument(
                        "action",
                        format!("stored action {} exceeds {} value outputs", action, n_actions),
                    ))
                }
            })
            .collect::<Result<Array1<f32>>>()?;

        let loss = self.config.loss.compute(taken.view(), targets.view())?;
        let taken_gradient = self.config.loss.gradient(taken.view(), targets.view())?;

        let mut output_gradient = Array2::zeros(values.raw_dim());
        for (row, (&action, &gradient)) in batch.actions.iter().zip(taken_gradient.iter()).enumerate() {
            output_gradient[[row, action]] = gradient;
        }
        self.live
            .apply_gradient(batch.observations.view(), output_gradient.view())?;

        let mut metrics = Metrics::new()
            .with("value", taken.mean().unwrap_or(0.0))
            .with("loss", loss)
            .with("exploration", self.control.exploration());
        if let Some(learning_rate) = self.live.learning_rate() {
            metrics.insert("learning_rate", learning_rate);
        }

        self.control.decay();
        self.training_steps += 1;

        debug!(
            step = self.global_step,
            batch = batch.len(),
            loss,
            exploration = self.control.exploration(),
            "training step"
        );
        Ok(Some(metrics))
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Number of gradient steps taken so far.
    pub fn training_steps(&self) -> usize {
        self.training_steps
    }

    pub fn live(&self) -> &V {
        &self.live
    }

    pub fn target(&self) -> &V {
        &self.target
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn memory(&self) -> &ExperienceBuffer<usize> {
        &self.memory
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn state(&self) -> LearnerState {
        LearnerState {
            global_step: self.global_step,
            training_steps: self.training_steps,
            exploration: self.control.exploration(),
        }
    }
}

impl<V, C, E> DqnLearner<V, C, E>
where
    V: ValueFunction + Persistent,
    C: DiscreteControl,
    E: Evaluation<V>,
{
    /// Save the live value function to `path` and the counters to
    /// [`state_path`]`(path)`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.live.save(path.as_ref())?;
        write_state(path.as_ref(), &self.state())?;
        debug!(path = %path.as_ref().display(), "saved learner");
        Ok(())
    }

    /// Load the live value function, re-clone the target from it and restore
    /// the counters when a state sidecar exists.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.live = V::load(path.as_ref())?;
        self.target = self.live.clone();

        if let Some(state) = read_state(path.as_ref())? {
            self.global_step = state.global_step;
            self.training_steps = state.training_steps;
            self.control.set_exploration(state.exploration)?;
        }
        debug!(path = %path.as_ref().display(), step = self.global_step, "loaded learner");
        Ok(())
    }
}

impl<V, C, E> Agent for DqnLearner<V, C, E>
where
    V: ValueFunction,
    C: DiscreteControl,
    E: Evaluation<V>,
{
    type Action = usize;

    fn act(&mut self, observation: ArrayView1<f32>, greedy: bool) -> Result<usize> {
        DqnLearner::act(self, observation, greedy)
    }

    fn remember(&mut self, observation: Array1<f32>, action: usize, reward: f32, done: bool, next_observation: Array1<f32>) {
        DqnLearner::remember(self, observation, action, reward, done, next_observation)
    }

    fn learn(&mut self) -> Result<Option<Metrics>> {
        DqnLearner::learn(self)
    }
}

/// Builder for a [`DqnLearner`] with an epsilon-greedy policy and a
/// Q-learning evaluator.
pub struct LearnerBuilder<V> {
    value_fn: V,
    memory_capacity: usize,
    discount: f32,
    epsilon: f32,
    epsilon_decay: f32,
    epsilon_floor: f32,
    config: LearnerConfig,
}

impl<V: ValueFunction> LearnerBuilder<V> {
    pub fn new(value_fn: V) -> Self {
        LearnerBuilder {
            value_fn,
            memory_capacity: 10_000,
            discount: 0.99,
            epsilon: 1.0,
            epsilon_decay: 1e-3,
            epsilon_floor: 0.01,
            config: LearnerConfig::default(),
        }
    }

    pub fn memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    pub fn exploration(mut self, epsilon: f32, decay: f32, floor: f32) -> Self {
        self.epsilon = epsilon;
        self.epsilon_decay = decay;
        self.epsilon_floor = floor;
        self
    }

    pub fn config(mut self, config: LearnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.config.sample_size = sample_size;
        self
    }

    pub fn training_period(mut self, period: usize) -> Self {
        self.config.training_period = period;
        self
    }

    pub fn update_period(mut self, period: usize) -> Self {
        self.config.update_period = period;
        self
    }

    pub fn update_factor(mut self, factor: f32) -> Self {
        self.config.update_factor = factor;
        self
    }

    pub fn sample_method(mut self, method: SampleMethod) -> Self {
        self.config.sample_method = method;
        self
    }

    pub fn loss(mut self, loss: Loss) -> Self {
        self.config.loss = loss;
        self
    }

    pub fn strict_batch(mut self, strict: bool) -> Self {
        self.config.strict_batch = strict;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<DqnLearner<V>> {
        let control = EpsilonGreedy::new(self.epsilon, self.epsilon_decay, self.epsilon_floor)?;
        self.build_with_control(control)
    }

    /// Build with a caller-supplied exploration policy; the epsilon settings
    /// of this builder are ignored.
    pub fn build_with_control<C: DiscreteControl>(self, control: C) -> Result<DqnLearner<V, C>> {
        let memory = ExperienceBuffer::new(self.memory_capacity)?;
        let evaluation = QLearning::new(self.discount)?;
        DqnLearner::new(self.value_fn, control, memory, evaluation, self.config)
    }
}
