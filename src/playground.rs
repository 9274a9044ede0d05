//! # Playground
//!
//! Episode loop connecting an [`Agent`] to an [`Environment`]. During
//! [`Playground::fit`] every step runs `act -> step -> remember -> learn`;
//! [`Playground::test`] acts greedily and never remembers or learns.

use ndarray::{Array1, ArrayView1};
use std::collections::BTreeMap;
use tracing::info;

use crate::environment::Environment;
use crate::error::{Result, RlError};
use crate::metrics::{Metrics, MetricsTracker};

/// The surface a learner exposes to the episode loop.
pub trait Agent {
    type Action;

    fn act(&mut self, observation: ArrayView1<f32>, greedy: bool) -> Result<Self::Action>;

    fn remember(
        &mut self,
        observation: Array1<f32>,
        action: Self::Action,
        reward: f32,
        done: bool,
        next_observation: Array1<f32>,
    );

    fn learn(&mut self) -> Result<Option<Metrics>>;
}

/// Outcome of one training episode. `metrics` holds the per-name mean over
/// the episode's training steps.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub reward: f32,
    pub steps: usize,
    pub metrics: Metrics,
}

#[derive(Default)]
struct MetricsAccumulator {
    sums: BTreeMap<String, (f32, usize)>,
}

impl MetricsAccumulator {
    fn add(&mut self, metrics: &Metrics) {
        for (name, value) in metrics.iter() {
            let entry = self.sums.entry(name.to_string()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    fn mean(self) -> Metrics {
        self.sums
            .into_iter()
            .fold(Metrics::new(), |metrics, (name, (sum, count))| {
                metrics.with(name, sum / count as f32)
            })
    }
}

pub struct Playground<E, G> {
    env: E,
    agent: G,
    tracker: MetricsTracker,
}

impl<E, G> Playground<E, G>
where
    E: Environment,
    G: Agent<Action = E::Action>,
{
    pub fn new(env: E, agent: G) -> Self {
        Playground {
            env,
            agent,
            tracker: MetricsTracker::default(),
        }
    }

    /// Train for `episodes` episodes of at most `max_steps` steps each.
    pub fn fit(&mut self, episodes: usize, max_steps: usize) -> Result<Vec<EpisodeSummary>> {
        if max_steps == 0 {
            return Err(RlError::configuration("max_steps", "must be at least 1"));
        }

        let mut summaries = Vec::with_capacity(episodes);
        for episode in 0..episodes {
            let mut observation = self.env.reset();
            let mut accumulator = MetricsAccumulator::default();
            self.tracker.start_episode();

            for _ in 0..max_steps {
                let action = self.agent.act(observation.view(), false)?;
                let step = self.env.step(&action)?;
                self.tracker.step(step.reward);

                self.agent.remember(
                    observation,
                    action,
                    step.reward,
                    step.done,
                    step.observation.clone(),
                );
                if let Some(metrics) = self.agent.learn()? {
                    self.tracker.record(&metrics);
                    accumulator.add(&metrics);
                }

                observation = step.observation;
                if step.done {
                    break;
                }
            }

            let (reward, steps) = self.tracker.end_episode();
            let metrics = accumulator.mean();
            info!(
                episode,
                reward,
                steps,
                loss = ?metrics.get("loss").or_else(|| metrics.get("critic_loss")),
                exploration = ?metrics.get("exploration"),
                "episode finished"
            );
            summaries.push(EpisodeSummary {
                episode,
                reward,
                steps,
                metrics,
            });
        }
        Ok(summaries)
    }

    /// Run greedy episodes and return the total reward collected.
    pub fn test(&mut self, episodes: usize, max_steps: usize) -> Result<f32> {
        let mut score = 0.0;
        for episode in 0..episodes {
            let mut observation = self.env.reset();
            let mut episode_reward = 0.0;

            for _ in 0..max_steps {
                let action = self.agent.act(observation.view(), true)?;
                let step = self.env.step(&action)?;
                episode_reward += step.reward;
                observation = step.observation;
                if step.done {
                    break;
                }
            }

            info!(episode, reward = episode_reward, "test episode finished");
            score += episode_reward;
        }
        Ok(score)
    }

    pub fn agent(&self) -> &G {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut G {
        &mut self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn tracker(&self) -> &MetricsTracker {
        &self.tracker
    }

    pub fn into_parts(self) -> (E, G) {
        (self.env, self.agent)
    }
}
