//! # Value functions
//!
//! The learners treat their function approximators as an opaque capability:
//! something that maps a batch of inputs to a batch of outputs, exposes its
//! parameters as a flat list of tensors, and can take one optimizer step
//! from the gradient of a loss with respect to its outputs. Cloning yields an
//! independent copy with identical structure and values, which is how the
//! lagged target instance is created.
//!
//! [`crate::network::NeuralNetwork`] is the bundled implementation, but any
//! type satisfying [`ValueFunction`] works, including hand-written linear
//! models or test doubles.

use ndarray::{Array2, ArrayD, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, RlError};

/// Ordered parameter tensors of a value function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    tensors: Vec<ArrayD<f32>>,
}

impl Parameters {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Parameters { tensors }
    }

    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    pub fn into_tensors(self) -> Vec<ArrayD<f32>> {
        self.tensors
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Same tensor count and per-tensor shapes.
    pub fn check_compatible(&self, other: &Parameters) -> Result<()> {
        if self.tensors.len() != other.tensors.len() {
            return Err(RlError::dimension_mismatch(
                format!("{} parameter tensors", self.tensors.len()),
                format!("{} parameter tensors", other.tensors.len()),
            ));
        }
        for (idx, (mine, theirs)) in self.tensors.iter().zip(other.tensors.iter()).enumerate() {
            if mine.shape() != theirs.shape() {
                return Err(RlError::dimension_mismatch(
                    format!("tensor {} with shape {:?}", idx, mine.shape()),
                    format!("shape {:?}", theirs.shape()),
                ));
            }
        }
        Ok(())
    }

    /// `tau * self + (1 - tau) * other`, tensor by tensor.
    pub fn blend(&self, other: &Parameters, tau: f32) -> Result<Parameters> {
        self.check_compatible(other)?;

        let tensors = self
            .tensors
            .iter()
            .zip(other.tensors.iter())
            .map(|(mine, theirs)| {
                let mut blended = mine.clone();
                Zip::from(&mut blended)
                    .and(theirs)
                    .for_each(|value, &old| *value = tau * *value + (1.0 - tau) * old);
                blended
            })
            .collect();

        Ok(Parameters { tensors })
    }

    /// Largest elementwise absolute difference.
    pub fn max_abs_diff(&self, other: &Parameters) -> Result<f32> {
        self.check_compatible(other)?;
        Ok(self
            .tensors
            .iter()
            .zip(other.tensors.iter())
            .flat_map(|(mine, theirs)| mine.iter().zip(theirs.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f32, f32::max))
    }
}

/// A differentiable mapping from observation batches to value batches.
pub trait ValueFunction: Clone {
    /// Evaluate a `(batch, inputs)` matrix, returning `(batch, outputs)`.
    fn forward(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>>;

    fn parameters(&self) -> Parameters;

    fn set_parameters(&mut self, parameters: &Parameters) -> Result<()>;

    /// Take exactly one optimizer step given dLoss/dOutputs for `inputs`.
    fn apply_gradient(
        &mut self,
        inputs: ArrayView2<f32>,
        output_gradient: ArrayView2<f32>,
    ) -> Result<()>;

    /// dLoss/dInputs for the given dLoss/dOutputs. Required by actor-critic
    /// learners, which push the critic's action gradient into the actor.
    fn input_gradient(
        &self,
        _inputs: ArrayView2<f32>,
        _output_gradient: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        Err(RlError::invalid_argument(
            "value_function",
            "this value function does not expose input gradients",
        ))
    }

    fn learning_rate(&self) -> Option<f32> {
        None
    }
}

/// Polyak update of `target` towards `live`:
/// `target <- tau * live + (1 - tau) * target`.
///
/// `tau = 1` copies `live` exactly and `tau = 0` leaves `target` untouched.
pub fn soft_update<V: ValueFunction>(target: &mut V, live: &V, tau: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&tau) {
        return Err(RlError::configuration(
            "update_factor",
            format!("must lie in [0, 1], got {}", tau),
        ));
    }

    let live_parameters = live.parameters();
    if tau == 0.0 {
        return live_parameters.check_compatible(&target.parameters());
    }
    if tau == 1.0 {
        return target.set_parameters(&live_parameters);
    }

    let blended = live_parameters.blend(&target.parameters(), tau)?;
    target.set_parameters(&blended)
}

/// File persistence for value functions.
pub trait Persistent: Sized {
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    fn load<P: AsRef<Path>>(path: P) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn test_blend_midpoint() {
        let live = Parameters::new(vec![array![2.0_f32, 4.0].into_dyn()]);
        let target = Parameters::new(vec![array![0.0_f32, 0.0].into_dyn()]);
        let blended = live.blend(&target, 0.5).unwrap();
        assert_eq!(blended.tensors()[0], array![1.0_f32, 2.0].into_dyn());
    }

    #[test]
    fn test_blend_shape_mismatch() {
        let a = Parameters::new(vec![ArrayD::zeros(IxDyn(&[2, 3]))]);
        let b = Parameters::new(vec![ArrayD::zeros(IxDyn(&[3, 2]))]);
        assert!(matches!(a.blend(&b, 0.5), Err(RlError::DimensionMismatch { .. })));

        let c = Parameters::new(vec![]);
        assert!(a.check_compatible(&c).is_err());
    }
}
