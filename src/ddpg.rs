//! # DDPG learner
//!
//! Deterministic actor-critic on the same skeleton as the DQN learner: one
//! experience buffer, Polyak-lagged targets for both networks, and a step
//! counter that only [`DdpgLearner::remember`] advances.
//!
//! The critic maps `[observation, action]` rows to a value in its first
//! output column and regresses onto
//! `reward + discount * critic_target([s', actor_target(s')])`. The actor is
//! pushed up the critic's action gradient, i.e. it minimises
//! `-mean(critic([s, actor(s)]))`.

use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, RlError};
use crate::evaluation::DeterministicPolicyEvaluation;
use crate::exploration::GaussianNoise;
use crate::learner::{read_state, rng_from_seed, suffixed_path, write_state, LearnerState};
use crate::loss::Loss;
use crate::metrics::Metrics;
use crate::playground::Agent;
use crate::replay_buffer::{stack_rows, Batch, ExperienceBuffer, SampleMethod, Transition};
use crate::value_function::{soft_update, Persistent, ValueFunction};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdpgConfig {
    pub sample_size: usize,
    pub actor_training_period: usize,
    pub critic_training_period: usize,
    pub actor_update_period: usize,
    pub critic_update_period: usize,
    pub update_factor: f32,
    pub sample_method: SampleMethod,
    pub strict_batch: bool,
    pub seed: Option<u64>,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        DdpgConfig {
            sample_size: 128,
            actor_training_period: 1,
            critic_training_period: 1,
            actor_update_period: 1,
            critic_update_period: 1,
            update_factor: 1.0,
            sample_method: SampleMethod::Random,
            strict_batch: false,
            seed: None,
        }
    }
}

impl DdpgConfig {
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("sample_size", self.sample_size),
            ("actor_training_period", self.actor_training_period),
            ("critic_training_period", self.critic_training_period),
            ("actor_update_period", self.actor_update_period),
            ("critic_update_period", self.critic_update_period),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(RlError::configuration(name, "must be at least 1"));
            }
        }
        if !(0.0..=1.0).contains(&self.update_factor) {
            return Err(RlError::configuration(
                "update_factor",
                format!("must lie in [0, 1], got {}", self.update_factor),
            ));
        }
        Ok(())
    }
}

/// Actor-critic learner over a continuous action space.
pub struct DdpgLearner<A, Q> {
    actor: A,
    target_actor: A,
    critic: Q,
    target_critic: Q,
    noise: GaussianNoise,
    memory: ExperienceBuffer<Array1<f32>>,
    evaluation: DeterministicPolicyEvaluation,
    config: DdpgConfig,
    global_step: usize,
    training_steps: usize,
    warned_underfilled: bool,
    rng: StdRng,
}

impl<A, Q> DdpgLearner<A, Q>
where
    A: ValueFunction,
    Q: ValueFunction,
{
    pub fn new(
        actor: A,
        critic: Q,
        noise: GaussianNoise,
        memory: ExperienceBuffer<Array1<f32>>,
        evaluation: DeterministicPolicyEvaluation,
        config: DdpgConfig,
    ) -> Result<Self> {
        config.validate()?;
        let rng = rng_from_seed(config.seed);

        Ok(DdpgLearner {
            target_actor: actor.clone(),
            actor,
            target_critic: critic.clone(),
            critic,
            noise,
            memory,
            evaluation,
            config,
            global_step: 0,
            training_steps: 0,
            warned_underfilled: false,
            rng,
        })
    }

    /// Actor output for one observation, perturbed by Gaussian noise unless
    /// `greedy`.
    pub fn act(&mut self, observation: ArrayView1<f32>, greedy: bool) -> Result<Array1<f32>> {
        let actions = self.actor.forward(observation.insert_axis(Axis(0)))?;
        if actions.nrows() == 0 {
            return Err(RlError::NumericalError("actor returned an empty batch".to_string()));
        }
        self.noise.perturb(actions.row(0), greedy, &mut self.rng)
    }

    pub fn remember(
        &mut self,
        observation: Array1<f32>,
        action: Array1<f32>,
        reward: f32,
        done: bool,
        next_observation: Array1<f32>,
    ) {
        self.memory
            .remember(Transition::new(observation, action, reward, done, next_observation));
        self.global_step += 1;
    }

    pub fn learn(&mut self) -> Result<Option<Metrics>> {
        let step = self.global_step;
        let tau = self.config.update_factor;
        if step % self.config.actor_update_period == 0 {
            soft_update(&mut self.target_actor, &self.actor, tau)?;
            debug!(step, update_factor = tau, "synchronized target actor");
        }
        if step % self.config.critic_update_period == 0 {
            soft_update(&mut self.target_critic, &self.critic, tau)?;
            debug!(step, update_factor = tau, "synchronized target critic");
        }

        let train_critic = step % self.config.critic_training_period == 0;
        let train_actor = step % self.config.actor_training_period == 0;
        if !(train_critic || train_actor) {
            return Ok(None);
        }

        let available = self.memory.len();
        if available == 0 {
            debug!(step, "skipping training: experience buffer is empty");
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

        let mut metrics = Metrics::new().with("exploration", self.noise.exploration());
        if train_critic {
            metrics.extend(self.update_critic(&batch)?);
        }
        if train_actor {
            metrics.extend(self.update_actor(&batch)?);
        }

        self.noise.decay();
        self.training_steps += 1;

        debug!(step, batch = batch.len(), exploration = self.noise.exploration(), "training step");
        Ok(Some(metrics))
    }

    fn update_critic(&mut self, batch: &Batch<Array1<f32>>) -> Result<Metrics> {
        let targets = self.evaluation.evaluate(
            batch.rewards.view(),
            &batch.dones,
            batch.next_observations.view(),
            &self.target_critic,
            &self.target_actor,
        )?;

        let actions = stack_rows(batch.actions.iter())?;
        let inputs = concatenate(Axis(1), &[batch.observations.view(), actions.view()])?;
        let values = self.critic.forward(inputs.view())?;
        if values.ncols() == 0 {
            return Err(RlError::dimension_mismatch("one critic output", "none"));
        }
        let q = values.column(0);

        let loss = Loss::Mse.compute(q, targets.view())?;
        let q_gradient = Loss::Mse.gradient(q, targets.view())?;

        let mut output_gradient = Array2::zeros(values.raw_dim());
        output_gradient.column_mut(0).assign(&q_gradient);
        self.critic.apply_gradient(inputs.view(), output_gradient.view())?;

        let mut metrics = Metrics::new()
            .with("critic_loss", loss)
            .with("q", q.mean().unwrap_or(0.0));
        if let Some(learning_rate) = self.critic.learning_rate() {
            metrics.insert("critic_learning_rate", learning_rate);
        }
        Ok(metrics)
    }

    fn update_actor(&mut self, batch: &Batch<Array1<f32>>) -> Result<Metrics> {
        let observations = batch.observations.view();
        let observation_width = observations.ncols();

        let chosen = self.actor.forward(observations)?;
        let inputs = concatenate(Axis(1), &[observations, chosen.view()])?;
        let values = self.critic.forward(inputs.view())?;
        if values.ncols() == 0 {
            return Err(RlError::dimension_mismatch("one critic output", "none"));
        }

        let n = values.nrows().max(1) as f32;
        let actor_loss = -values.column(0).mean().unwrap_or(0.0);

        let mut output_gradient = Array2::zeros(values.raw_dim());
        output_gradient.column_mut(0).fill(-1.0 / n);
        let input_gradient = self.critic.input_gradient(inputs.view(), output_gradient.view())?;
        let action_gradient = input_gradient.slice(s![.., observation_width..]);
        self.actor.apply_gradient(observations, action_gradient)?;

        let mut metrics = Metrics::new().with("actor_loss", actor_loss);
        if let Some(learning_rate) = self.actor.learning_rate() {
            metrics.insert("actor_learning_rate", learning_rate);
        }
        Ok(metrics)
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn training_steps(&self) -> usize {
        self.training_steps
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn target_actor(&self) -> &A {
        &self.target_actor
    }

    pub fn critic(&self) -> &Q {
        &self.critic
    }

    pub fn target_critic(&self) -> &Q {
        &self.target_critic
    }

    pub fn noise(&self) -> &GaussianNoise {
        &self.noise
    }

    pub fn memory(&self) -> &ExperienceBuffer<Array1<f32>> {
        &self.memory
    }

    pub fn config(&self) -> &DdpgConfig {
        &self.config
    }

    pub fn state(&self) -> LearnerState {
        LearnerState {
            global_step: self.global_step,
            training_steps: self.training_steps,
            exploration: self.noise.exploration(),
        }
    }
}

impl<A, Q> DdpgLearner<A, Q>
where
    A: ValueFunction + Persistent,
    Q: ValueFunction + Persistent,
{
    /// Actor and critic go to `<path>.actor` and `<path>.critic`; counters go
    /// to the state sidecar of `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.actor.save(suffixed_path(path, ".actor"))?;
        self.critic.save(suffixed_path(path, ".critic"))?;
        write_state(path, &self.state())?;
        debug!(path = %path.display(), "saved ddpg learner");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.actor = A::load(suffixed_path(path, ".actor"))?;
        self.critic = Q::load(suffixed_path(path, ".critic"))?;
        self.target_actor = self.actor.clone();
        self.target_critic = self.critic.clone();

        if let Some(state) = read_state(path)? {
            self.global_step = state.global_step;
            self.training_steps = state.training_steps;
            self.noise.set_exploration(state.exploration)?;
        }
        debug!(path = %path.display(), step = self.global_step, "loaded ddpg learner");
        Ok(())
    }
}

impl<A, Q> Agent for DdpgLearner<A, Q>
where
    A: ValueFunction,
    Q: ValueFunction,
{
    type Action = Array1<f32>;

    fn act(&mut self, observation: ArrayView1<f32>, greedy: bool) -> Result<Array1<f32>> {
        DdpgLearner::act(self, observation, greedy)
    }

    fn remember(
        &mut self,
        observation: Array1<f32>,
        action: Array1<f32>,
        reward: f32,
        done: bool,
        next_observation: Array1<f32>,
    ) {
        DdpgLearner::remember(self, observation, action, reward, done, next_observation)
    }

    fn learn(&mut self) -> Result<Option<Metrics>> {
        DdpgLearner::learn(self)
    }
}
