use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};

/// Regression loss between value estimates and bootstrapped targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Loss {
    /// Mean squared error
    #[default]
    Mse,
    /// Quadratic inside `delta`, linear outside
    Huber { delta: f32 },
}

impl Loss {
    /// Mean loss over the batch.
    pub fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Result<f32> {
        check_lengths(predictions, targets)?;
        if predictions.is_empty() {
            return Ok(0.0);
        }

        let n = predictions.len() as f32;
        let total: f32 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &t)| match self {
                Loss::Mse => (p - t) * (p - t),
                Loss::Huber { delta } => {
                    let abs = (p - t).abs();
                    if abs <= *delta {
                        0.5 * abs * abs
                    } else {
                        delta * abs - 0.5 * delta * delta
                    }
                }
            })
            .sum();
        Ok(total / n)
    }

    /// Gradient of [`compute`](Self::compute) with respect to `predictions`.
    pub fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_lengths(predictions, targets)?;
        if predictions.is_empty() {
            return Ok(Array1::zeros(0));
        }

        let n = predictions.len() as f32;
        Ok(predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &t)| {
                let diff = p - t;
                match self {
                    Loss::Mse => 2.0 * diff / n,
                    Loss::Huber { delta } => {
                        if diff.abs() <= *delta {
                            diff / n
                        } else {
                            delta * diff.signum() / n
                        }
                    }
                }
            })
            .collect())
    }
}

fn check_lengths(predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Result<()> {
    if predictions.len() != targets.len() {
        return Err(RlError::dimension_mismatch(
            format!("{} targets", predictions.len()),
            format!("{} targets", targets.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse_value_and_gradient() {
        let p = array![1.0_f32, 3.0];
        let t = array![0.0_f32, 1.0];
        assert_eq!(Loss::Mse.compute(p.view(), t.view()).unwrap(), 2.5);
        assert_eq!(Loss::Mse.gradient(p.view(), t.view()).unwrap(), array![1.0, 2.0]);
    }

    #[test]
    fn test_huber_is_linear_outside_delta() {
        let loss = Loss::Huber { delta: 1.0 };
        let g = loss.gradient(array![5.0_f32].view(), array![0.0_f32].view()).unwrap();
        assert_eq!(g, array![1.0]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = Loss::Mse.compute(array![1.0_f32].view(), array![1.0_f32, 2.0].view());
        assert!(matches!(err, Err(RlError::DimensionMismatch { .. })));
    }
}
