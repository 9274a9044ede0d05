use ndarray::{array, Array2};

use super::fixtures::{Linear, Recording, Untouchable};
use crate::error::RlError;
use crate::evaluation::{DeterministicPolicyEvaluation, Evaluation, QLearning};

#[test]
fn test_all_terminal_batch_never_evaluates() {
    let evaluation = QLearning::new(0.9).unwrap();
    let rewards = array![1.0, -2.0, 0.5];
    let next = Array2::zeros((3, 4));

    let targets = evaluation
        .evaluate(rewards.view(), &[true, true, true], next.view(), &Untouchable)
        .unwrap();
    assert_eq!(targets, rewards);
}

#[test]
fn test_zero_discount_returns_rewards() {
    let evaluation = QLearning::new(0.0).unwrap();
    let rewards = array![1.0, 2.0];
    let next = Array2::zeros((2, 4));

    let targets = evaluation
        .evaluate(rewards.view(), &[false, false], next.view(), &Untouchable)
        .unwrap();
    assert_eq!(targets, rewards);
}

#[test]
fn test_only_open_rows_are_bootstrapped() {
    let evaluation = QLearning::new(0.5).unwrap();
    let value_fn = Recording::new(vec![1.0, 4.0, 2.0]);
    let rewards = array![1.0, 1.0, 1.0, 1.0];
    let dones = [false, true, false, true];
    let next = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];

    let targets = evaluation
        .evaluate(rewards.view(), &dones, next.view(), &value_fn)
        .unwrap();

    assert_eq!(targets, array![3.0, 1.0, 3.0, 1.0]);
    assert_eq!(value_fn.calls(), 1);
    assert_eq!(value_fn.seen.borrow()[0], array![[0.0, 0.0], [2.0, 2.0]]);
}

#[test]
fn test_max_over_actions_per_row() {
    let evaluation = QLearning::new(0.9).unwrap();
    let value_fn = Linear::new(array![[1.0, 0.0], [0.0, 1.0]]);
    let rewards = array![0.0, 0.0];
    let next = array![[3.0, 1.0], [-1.0, 2.0]];

    let targets = evaluation
        .evaluate(rewards.view(), &[false, false], next.view(), &value_fn)
        .unwrap();
    assert!((targets[0] - 2.7).abs() < 1e-6);
    assert!((targets[1] - 1.8).abs() < 1e-6);
}

#[test]
fn test_discount_range() {
    assert!(QLearning::new(1.0).is_err());
    assert!(QLearning::new(-0.1).is_err());
    assert!(QLearning::new(0.99).is_ok());
    assert!(DeterministicPolicyEvaluation::new(1.0).is_err());
}

#[test]
fn test_mismatched_batch_fields() {
    let evaluation = QLearning::new(0.9).unwrap();
    let rewards = array![1.0, 2.0];
    let next = Array2::zeros((3, 2));
    let result = evaluation.evaluate(rewards.view(), &[false, false], next.view(), &Untouchable);
    assert!(matches!(result, Err(RlError::DimensionMismatch { .. })));
}

#[test]
fn test_deterministic_policy_targets() {
    let evaluation = DeterministicPolicyEvaluation::new(0.5).unwrap();
    // actor: a = 2 * s ; critic: q = s + a
    let actor = Linear::new(array![[2.0]]);
    let critic = Linear::new(array![[1.0], [1.0]]);
    let rewards = array![1.0, 1.0];
    let next = array![[1.0], [4.0]];

    let targets = evaluation
        .evaluate(rewards.view(), &[false, true], next.view(), &critic, &actor)
        .unwrap();
    assert_eq!(targets, array![2.5, 1.0]);

    let terminal = evaluation
        .evaluate(rewards.view(), &[true, true], next.view(), &Untouchable, &Untouchable)
        .unwrap();
    assert_eq!(terminal, rewards);
}
