use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::trace;

use crate::error::{Result, RlError};

/// One environment step. `A` is `usize` for discrete agents and
/// `Array1<f32>` for continuous ones.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<A> {
    pub observation: Array1<f32>,
    pub action: A,
    pub reward: f32,
    pub done: bool,
    pub next_observation: Array1<f32>,
}

impl<A> Transition<A> {
    pub fn new(
        observation: Array1<f32>,
        action: A,
        reward: f32,
        done: bool,
        next_observation: Array1<f32>,
    ) -> Self {
        Transition {
            observation,
            action,
            reward,
            done,
            next_observation,
        }
    }
}

/// How `ExperienceBuffer::sample` picks its rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    /// Uniform draw without replacement
    #[default]
    Random,
    /// Most recent entries, oldest first
    Last,
}

impl FromStr for SampleMethod {
    type Err = RlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SampleMethod::Random),
            "last" => Ok(SampleMethod::Last),
            other => Err(RlError::invalid_argument(
                "method",
                format!("unknown sampling method '{}', expected 'random' or 'last'", other),
            )),
        }
    }
}

/// Column-stacked transitions. Row `i` of every field comes from the same
/// stored transition, the one at logical position `indices[i]`.
#[derive(Clone, Debug)]
pub struct Batch<A> {
    pub observations: Array2<f32>,
    pub actions: Vec<A>,
    pub rewards: Array1<f32>,
    pub dones: Vec<bool>,
    pub next_observations: Array2<f32>,
    pub indices: Vec<usize>,
}

impl<A> Batch<A> {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Fixed-capacity FIFO store of transitions.
///
/// Fields are kept as parallel columns so a sampled index set can be
/// gathered field by field. Every column always has the same length; once
/// `capacity` is reached each insert evicts the oldest row of every column.
#[derive(Clone, Debug)]
pub struct ExperienceBuffer<A> {
    observations: VecDeque<Array1<f32>>,
    actions: VecDeque<A>,
    rewards: VecDeque<f32>,
    dones: VecDeque<bool>,
    next_observations: VecDeque<Array1<f32>>,
    capacity: usize,
}

impl<A: Clone> ExperienceBuffer<A> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::configuration(
                "capacity",
                "Capacity must be greater than 0",
            ));
        }

        Ok(ExperienceBuffer {
            observations: VecDeque::with_capacity(capacity),
            actions: VecDeque::with_capacity(capacity),
            rewards: VecDeque::with_capacity(capacity),
            dones: VecDeque::with_capacity(capacity),
            next_observations: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a transition, silently evicting the oldest once full.
    pub fn remember(&mut self, transition: Transition<A>) {
        self.observations.push_back(transition.observation);
        self.actions.push_back(transition.action);
        self.rewards.push_back(transition.reward);
        self.dones.push_back(transition.done);
        self.next_observations.push_back(transition.next_observation);

        while self.observations.len() > self.capacity {
            self.observations.pop_front();
            self.actions.pop_front();
            self.rewards.pop_front();
            self.dones.pop_front();
            self.next_observations.pop_front();
        }
    }

    /// Draw up to `n` transitions. Asking for more than `len()` yields
    /// every stored transition rather than an error.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        method: SampleMethod,
        rng: &mut R,
    ) -> Result<Batch<A>> {
        let len = self.len();
        let take = n.min(len);

        let indices = match method {
            SampleMethod::Random => index::sample(rng, len, take).into_vec(),
            SampleMethod::Last => (len - take..len).collect(),
        };

        trace!(requested = n, returned = take, ?method, "sampled experience batch");
        self.gather(indices)
    }

    /// String-keyed variant of [`sample`](Self::sample) accepting
    /// `"random"` or `"last"`.
    pub fn sample_by_name<R: Rng + ?Sized>(
        &self,
        n: usize,
        method: &str,
        rng: &mut R,
    ) -> Result<Batch<A>> {
        let method = method.parse::<SampleMethod>()?;
        self.sample(n, method, rng)
    }

    fn gather(&self, indices: Vec<usize>) -> Result<Batch<A>> {
        let observations = stack_rows(indices.iter().map(|&i| &self.observations[i]))?;
        let next_observations = stack_rows(indices.iter().map(|&i| &self.next_observations[i]))?;
        let actions = indices.iter().map(|&i| self.actions[i].clone()).collect();
        let rewards = indices.iter().map(|&i| self.rewards[i]).collect();
        let dones = indices.iter().map(|&i| self.dones[i]).collect();

        Ok(Batch {
            observations,
            actions,
            rewards,
            dones,
            next_observations,
            indices,
        })
    }

    /// Transition at logical position `index` (0 is the oldest).
    pub fn transition(&self, index: usize) -> Option<Transition<A>> {
        if index >= self.len() {
            return None;
        }
        Some(Transition {
            observation: self.observations[index].clone(),
            action: self.actions[index].clone(),
            reward: self.rewards[index],
            done: self.dones[index],
            next_observation: self.next_observations[index].clone(),
        })
    }

    /// Stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Transition<A>> + '_ {
        (0..self.len()).filter_map(move |i| self.transition(i))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.observations.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.next_observations.clear();
    }
}

/// Stack equally sized vectors into the rows of a matrix.
pub(crate) fn stack_rows<'a, I>(rows: I) -> Result<Array2<f32>>
where
    I: IntoIterator<Item = &'a Array1<f32>>,
{
    let rows: Vec<&Array1<f32>> = rows.into_iter().collect();
    let width = rows.first().map_or(0, |row| row.len());

    let mut data = Vec::with_capacity(rows.len() * width);
    for row in &rows {
        if row.len() != width {
            return Err(RlError::dimension_mismatch(
                format!("row of length {}", width),
                format!("row of length {}", row.len()),
            ));
        }
        data.extend(row.iter().copied());
    }

    Ok(Array2::from_shape_vec((rows.len(), width), data)?)
}
