//! # Bootstrapped regression targets
//!
//! Evaluators turn a sampled batch of `(reward, done, next_observation)` into
//! temporal-difference targets:
//!
//! - terminal rows (`done == true`): `target = reward`, with no bootstrapping
//!   past the episode boundary;
//! - other rows: `target = reward + discount * V(next_observation)`, where
//!   `V` depends on the evaluator.
//!
//! Only the non-terminal rows are gathered and passed to the value function;
//! their results are scattered back into place. The value function is never
//! asked about the undefined "state after the end" of an episode, and an
//! all-terminal batch never calls it at all.

use ndarray::{concatenate, Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};
use crate::value_function::ValueFunction;

/// Target computation for discrete-action learners.
pub trait Evaluation<V: ValueFunction> {
    fn evaluate(
        &self,
        rewards: ArrayView1<f32>,
        dones: &[bool],
        next_observations: ArrayView2<f32>,
        value_fn: &V,
    ) -> Result<Array1<f32>>;
}

fn check_discount(discount: f32) -> Result<f32> {
    if !(0.0..1.0).contains(&discount) {
        return Err(RlError::configuration(
            "discount",
            format!("must lie in [0, 1), got {}", discount),
        ));
    }
    Ok(discount)
}

/// Gather the non-terminal rows, bootstrap them, scatter the discounted
/// values back on top of the rewards.
fn bootstrap_targets<F>(
    rewards: ArrayView1<f32>,
    dones: &[bool],
    next_observations: ArrayView2<f32>,
    discount: f32,
    bootstrap: F,
) -> Result<Array1<f32>>
where
    F: FnOnce(ArrayView2<f32>) -> Result<Array1<f32>>,
{
    if dones.len() != rewards.len() || next_observations.nrows() != rewards.len() {
        return Err(RlError::dimension_mismatch(
            format!("{} rows in every batch field", rewards.len()),
            format!("{} dones and {} next observations", dones.len(), next_observations.nrows()),
        ));
    }

    let mut targets = rewards.to_owned();
    let open_rows: Vec<usize> = dones
        .iter()
        .enumerate()
        .filter(|(_, &done)| !done)
        .map(|(idx, _)| idx)
        .collect();

    if open_rows.is_empty() || discount == 0.0 {
        return Ok(targets);
    }

    let next = next_observations.select(Axis(0), &open_rows);
    let values = bootstrap(next.view())?;
    if values.len() != open_rows.len() {
        return Err(RlError::dimension_mismatch(
            format!("{} bootstrapped values", open_rows.len()),
            format!("{}", values.len()),
        ));
    }

    for (&row, &value) in open_rows.iter().zip(values.iter()) {
        targets[row] += discount * value;
    }
    Ok(targets)
}

/// Q-learning target: `reward + discount * max_a Q_target(s', a)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QLearning {
    discount: f32,
}

impl QLearning {
    pub fn new(discount: f32) -> Result<Self> {
        Ok(QLearning {
            discount: check_discount(discount)?,
        })
    }

    pub fn discount(&self) -> f32 {
        self.discount
    }
}

impl<V: ValueFunction> Evaluation<V> for QLearning {
    fn evaluate(
        &self,
        rewards: ArrayView1<f32>,
        dones: &[bool],
        next_observations: ArrayView2<f32>,
        value_fn: &V,
    ) -> Result<Array1<f32>> {
        bootstrap_targets(rewards, dones, next_observations, self.discount, |next| {
            let q = value_fn.forward(next)?;
            if q.ncols() == 0 {
                return Err(RlError::dimension_mismatch("at least one action value", "none"));
            }
            Ok(q.rows()
                .into_iter()
                .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
                .collect())
        })
    }
}

/// Actor-critic target:
/// `reward + discount * Q_target([s', pi_target(s')])`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeterministicPolicyEvaluation {
    discount: f32,
}

impl DeterministicPolicyEvaluation {
    pub fn new(discount: f32) -> Result<Self> {
        Ok(DeterministicPolicyEvaluation {
            discount: check_discount(discount)?,
        })
    }

    pub fn discount(&self) -> f32 {
        self.discount
    }

    /// The critic sees `[observation, action]` rows and returns the value
    /// in its first output column.
    pub fn evaluate<C, P>(
        &self,
        rewards: ArrayView1<f32>,
        dones: &[bool],
        next_observations: ArrayView2<f32>,
        critic: &C,
        actor: &P,
    ) -> Result<Array1<f32>>
    where
        C: ValueFunction,
        P: ValueFunction,
    {
        bootstrap_targets(rewards, dones, next_observations, self.discount, |next| {
            let actions = actor.forward(next)?;
            let inputs = concatenate(Axis(1), &[next.view(), actions.view()])?;
            let q = critic.forward(inputs.view())?;
            if q.ncols() == 0 {
                return Err(RlError::dimension_mismatch("one critic output", "none"));
            }
            Ok(q.column(0).to_owned())
        })
    }
}
