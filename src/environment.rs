//! # Environments
//!
//! The learners never talk to a simulator directly; a [`crate::playground::Playground`]
//! drives any [`Environment`] and forwards the transitions. Two small
//! environments ship with the crate for demos and smoke tests.

use ndarray::{array, Array1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, RlError};

/// Outcome of one environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub observation: Array1<f32>,
    pub reward: f32,
    pub done: bool,
}

pub trait Environment {
    type Action;

    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Array1<f32>;

    fn step(&mut self, action: &Self::Action) -> Result<Step>;

    fn observation_size(&self) -> usize;
}

/// A one-dimensional corridor. The agent starts in the leftmost cell and
/// must walk right; action 0 moves left, action 1 moves right. Observations
/// are one-hot cell encodings.
#[derive(Clone, Debug)]
pub struct Corridor {
    length: usize,
    position: usize,
    step_penalty: f32,
}

impl Corridor {
    pub fn new(length: usize) -> Result<Self> {
        if length < 2 {
            return Err(RlError::configuration("length", "a corridor needs at least 2 cells"));
        }
        Ok(Corridor {
            length,
            position: 0,
            step_penalty: 0.01,
        })
    }

    pub fn n_actions(&self) -> usize {
        2
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn observation(&self) -> Array1<f32> {
        let mut observation = Array1::zeros(self.length);
        observation[self.position] = 1.0;
        observation
    }
}

impl Environment for Corridor {
    type Action = usize;

    fn reset(&mut self) -> Array1<f32> {
        self.position = 0;
        self.observation()
    }

    fn step(&mut self, action: &usize) -> Result<Step> {
        match action {
            0 => self.position = self.position.saturating_sub(1),
            1 => self.position = (self.position + 1).min(self.length - 1),
            other => {
                return Err(RlError::invalid_argument(
                    "action",
                    format!("corridor accepts 0 or 1, got {}", other),
                ))
            }
        }

        let done = self.position == self.length - 1;
        let reward = if done { 1.0 } else { -self.step_penalty };
        Ok(Step {
            observation: self.observation(),
            reward,
            done,
        })
    }

    fn observation_size(&self) -> usize {
        self.length
    }
}

/// A point on a line with velocity. The action is a force in `[-1, 1]`;
/// reward is the negative distance to the origin, and the episode ends once
/// the point rests near it.
#[derive(Clone, Debug)]
pub struct PointMass {
    position: f32,
    velocity: f32,
    dt: f32,
    tolerance: f32,
    rng: StdRng,
}

impl PointMass {
    pub fn new(seed: u64) -> Self {
        PointMass {
            position: 0.0,
            velocity: 0.0,
            dt: 0.1,
            tolerance: 0.05,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn action_bounds(&self) -> (f32, f32) {
        (-1.0, 1.0)
    }

    pub fn action_size(&self) -> usize {
        1
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    fn observation(&self) -> Array1<f32> {
        array![self.position, self.velocity]
    }
}

impl Environment for PointMass {
    type Action = Array1<f32>;

    fn reset(&mut self) -> Array1<f32> {
        self.position = self.rng.gen_range(-1.0..1.0);
        self.velocity = 0.0;
        self.observation()
    }

    fn step(&mut self, action: &Array1<f32>) -> Result<Step> {
        if action.len() != 1 {
            return Err(RlError::dimension_mismatch(
                "1 action component",
                format!("{} action components", action.len()),
            ));
        }
        let force = action[0].clamp(-1.0, 1.0);

        self.velocity = (self.velocity + force * self.dt) * 0.95;
        self.position = (self.position + self.velocity * self.dt).clamp(-2.0, 2.0);

        let done = self.position.abs() < self.tolerance && self.velocity.abs() < self.tolerance;
        Ok(Step {
            observation: self.observation(),
            reward: -self.position.abs(),
            done,
        })
    }

    fn observation_size(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corridor_reaches_goal() {
        let mut env = Corridor::new(3).unwrap();
        let start = env.reset();
        assert_eq!(start, array![1.0, 0.0, 0.0]);

        let step = env.step(&0).unwrap();
        assert_eq!(env.position(), 0);
        assert!(!step.done);

        env.step(&1).unwrap();
        let last = env.step(&1).unwrap();
        assert!(last.done);
        assert_eq!(last.reward, 1.0);
        assert!(env.step(&2).is_err());
    }

    #[test]
    fn test_point_mass_rejects_wide_actions() {
        let mut env = PointMass::new(3);
        let observation = env.reset();
        assert_eq!(observation.len(), env.observation_size());
        assert!(env.step(&array![0.5, 0.5]).is_err());
        let step = env.step(&array![0.5]).unwrap();
        assert!(step.reward <= 0.0);
    }
}
