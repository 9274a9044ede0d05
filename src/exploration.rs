//! # Exploration policies
//!
//! Policies turn value estimates into actions. Discrete policies implement
//! [`DiscreteControl`]: given a `(batch, n_actions)` matrix of scores they
//! return one action index per row. [`GaussianNoise`] covers continuous
//! actors by perturbing the actor's output.
//!
//! Exploration rates live in an [`ExplorationSchedule`] and are decayed by
//! the learner once per training step, never while selecting actions.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};

/// Multiplicative decay towards a floor:
/// `epsilon <- max(floor, epsilon * (1 - decay))`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    epsilon: f32,
    decay: f32,
    floor: f32,
}

impl ExplorationSchedule {
    pub fn new(epsilon: f32, decay: f32, floor: f32) -> Result<Self> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(RlError::configuration(
                "epsilon",
                format!("must be a finite non-negative number, got {}", epsilon),
            ));
        }
        if !(0.0..=1.0).contains(&decay) {
            return Err(RlError::configuration(
                "decay",
                format!("must lie in [0, 1], got {}", decay),
            ));
        }
        if !(0.0..=epsilon).contains(&floor) {
            return Err(RlError::configuration(
                "floor",
                format!("must lie in [0, epsilon={}], got {}", epsilon, floor),
            ));
        }

        Ok(ExplorationSchedule { epsilon, decay, floor })
    }

    /// A schedule that never moves.
    pub fn constant(epsilon: f32) -> Result<Self> {
        Self::new(epsilon, 0.0, epsilon)
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * (1.0 - self.decay)).max(self.floor);
    }

    /// Restore a previously observed rate, e.g. from a checkpoint.
    pub fn set_epsilon(&mut self, epsilon: f32) -> Result<()> {
        if !epsilon.is_finite() || epsilon < self.floor {
            return Err(RlError::configuration(
                "epsilon",
                format!("must be finite and at least floor={}, got {}", self.floor, epsilon),
            ));
        }
        self.epsilon = epsilon;
        Ok(())
    }
}

/// Index of the largest value. Ties go to the lowest index and NaN never
/// wins; an all-NaN or empty row maps to 0.
pub fn argmax(values: ArrayView1<f32>) -> usize {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map_or(0, |(idx, _)| idx)
}

/// Arg-max of every row.
pub fn greedy_actions(values: ArrayView2<f32>) -> Array1<usize> {
    values.rows().into_iter().map(argmax).collect()
}

/// Action selection over a discrete action set.
pub trait DiscreteControl {
    /// Randomised selection, one action per row of `values`.
    fn explore<R: Rng + ?Sized>(&self, values: ArrayView2<f32>, rng: &mut R) -> Array1<usize>;

    /// Greedy selection bypasses randomness entirely.
    fn select<R: Rng + ?Sized>(
        &self,
        values: ArrayView2<f32>,
        greedy: bool,
        rng: &mut R,
    ) -> Array1<usize> {
        if greedy {
            greedy_actions(values)
        } else {
            self.explore(values, rng)
        }
    }

    /// Advance the exploration schedule by one training step.
    fn decay(&mut self) {}

    fn exploration(&self) -> f32 {
        0.0
    }

    fn set_exploration(&mut self, _exploration: f32) -> Result<()> {
        Ok(())
    }
}

/// Always exploits.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Greedy;

impl DiscreteControl for Greedy {
    fn explore<R: Rng + ?Sized>(&self, values: ArrayView2<f32>, _rng: &mut R) -> Array1<usize> {
        greedy_actions(values)
    }
}

/// Per row: a uniformly random action with probability epsilon, the
/// arg-max otherwise.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    schedule: ExplorationSchedule,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f32, decay: f32, floor: f32) -> Result<Self> {
        Self::from_schedule(ExplorationSchedule::new(epsilon, decay, floor)?)
    }

    pub fn from_schedule(schedule: ExplorationSchedule) -> Result<Self> {
        if schedule.epsilon() > 1.0 {
            return Err(RlError::configuration(
                "epsilon",
                format!("must lie in [0, 1] for epsilon-greedy, got {}", schedule.epsilon()),
            ));
        }
        Ok(EpsilonGreedy { schedule })
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }
}

impl DiscreteControl for EpsilonGreedy {
    fn explore<R: Rng + ?Sized>(&self, values: ArrayView2<f32>, rng: &mut R) -> Array1<usize> {
        let n_actions = values.ncols();
        if n_actions == 0 {
            return Array1::zeros(values.nrows());
        }

        let epsilon = self.schedule.epsilon();
        values
            .rows()
            .into_iter()
            .map(|row| {
                if rng.gen::<f32>() < epsilon {
                    rng.gen_range(0..n_actions)
                } else {
                    argmax(row)
                }
            })
            .collect()
    }

    fn decay(&mut self) {
        self.schedule.decay();
    }

    fn exploration(&self) -> f32 {
        self.schedule.epsilon()
    }

    fn set_exploration(&mut self, exploration: f32) -> Result<()> {
        if exploration > 1.0 {
            return Err(RlError::configuration(
                "epsilon",
                format!("must lie in [0, 1] for epsilon-greedy, got {}", exploration),
            ));
        }
        self.schedule.set_epsilon(exploration)
    }
}

/// Additive Gaussian noise for continuous actions. The schedule's epsilon
/// is the noise standard deviation; perturbed actions are clipped to
/// `[low, high]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GaussianNoise {
    schedule: ExplorationSchedule,
    low: f32,
    high: f32,
}

impl GaussianNoise {
    pub fn new(std_dev: f32, decay: f32, floor: f32, low: f32, high: f32) -> Result<Self> {
        if low.is_nan() || high.is_nan() || low >= high {
            return Err(RlError::configuration(
                "action_bounds",
                format!("low ({}) must be strictly below high ({})", low, high),
            ));
        }
        Ok(GaussianNoise {
            schedule: ExplorationSchedule::new(std_dev, decay, floor)?,
            low,
            high,
        })
    }

    pub fn perturb<R: Rng + ?Sized>(
        &self,
        action: ArrayView1<f32>,
        greedy: bool,
        rng: &mut R,
    ) -> Result<Array1<f32>> {
        if greedy {
            return Ok(action.to_owned());
        }

        let normal = Normal::new(0.0, self.schedule.epsilon())
            .map_err(|e| RlError::NumericalError(e.to_string()))?;

        let mut perturbed = action.to_owned();
        for value in perturbed.iter_mut() {
            *value = (*value + normal.sample(rng)).clamp(self.low, self.high);
        }
        Ok(perturbed)
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.low, self.high)
    }

    pub fn decay(&mut self) {
        self.schedule.decay();
    }

    pub fn exploration(&self) -> f32 {
        self.schedule.epsilon()
    }

    pub fn set_exploration(&mut self, exploration: f32) -> Result<()> {
        self.schedule.set_epsilon(exploration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_ties_and_nan() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), 1);
        assert_eq!(argmax(array![f32::NAN, -1.0, -2.0].view()), 1);
        assert_eq!(argmax(array![f32::NAN, f32::NAN].view()), 0);
    }

    #[test]
    fn test_schedule_rejects_floor_above_epsilon() {
        assert!(ExplorationSchedule::new(0.1, 0.01, 0.2).is_err());
        assert!(ExplorationSchedule::new(0.1, 1.5, 0.0).is_err());
        assert!(ExplorationSchedule::new(f32::NAN, 0.1, 0.0).is_err());
    }

    #[test]
    fn test_gaussian_noise_bounds() {
        assert!(GaussianNoise::new(0.2, 0.0, 0.0, 1.0, 1.0).is_err());
        let noise = GaussianNoise::new(0.2, 0.0, 0.0, -1.0, 1.0).unwrap();
        assert_eq!(noise.bounds(), (-1.0, 1.0));
    }
}
