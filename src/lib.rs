//! # quadrl - Off-Policy Value Learning Core
//!
//! quadrl is the learning core behind a 2D quadcopter control testbed. It
//! provides the pieces an off-policy, value-based agent is assembled from:
//! a column-synchronized experience buffer, exploration policies, bootstrapped
//! target evaluators and a learner that orchestrates them on a step-driven
//! schedule with a lagged target value function.
//!
//! ## Key Features
//!
//! - **Experience replay**: fixed-capacity FIFO buffer with `random` and `last` sampling
//! - **Exploration**: epsilon-greedy with decay towards a floor, Gaussian action noise
//! - **Targets**: Q-learning and deterministic-policy targets that never bootstrap past a terminal step
//! - **Learners**: DQN and DDPG with Polyak-averaged target networks
//! - **Playground**: episode loop over any [`environment::Environment`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quadrl::activations::Activation;
//! use quadrl::environment::{Corridor, Environment};
//! use quadrl::learner::LearnerBuilder;
//! use quadrl::network::NeuralNetwork;
//! use quadrl::optimizer::{Adam, OptimizerWrapper};
//! use quadrl::playground::Playground;
//!
//! let corridor = Corridor::new(8).unwrap();
//! let network = NeuralNetwork::with_seed(
//!     &[corridor.observation_size(), 32, corridor.n_actions()],
//!     &[Activation::Relu, Activation::Linear],
//!     OptimizerWrapper::Adam(Adam::default()),
//!     1e-3,
//!     0,
//! ).unwrap();
//!
//! let learner = LearnerBuilder::new(network)
//!     .discount(0.9)
//!     .update_period(20)
//!     .build()
//!     .unwrap();
//!
//! let mut playground = Playground::new(corridor, learner);
//! playground.fit(100, 50).unwrap();
//! let score = playground.test(5, 50).unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`replay_buffer`] - Experience buffer and sampled batches
//! - [`exploration`] - Action selection and exploration schedules
//! - [`evaluation`] - Bootstrapped temporal-difference targets
//! - [`value_function`] - The value-function capability and Polyak updates
//! - [`learner`] - DQN learner, its configuration and builder
//! - [`ddpg`] - Actor-critic learner for continuous actions
//! - [`network`], [`activations`], [`optimizer`], [`loss`] - A dense reference approximator
//! - [`metrics`] - Per-step metrics and rolling histories
//! - [`environment`], [`playground`] - Environment contract and episode loop
//! - [`config`] - JSON training configuration
//! - [`error`] - Error types and result handling

pub mod activations;
pub mod config;
pub mod ddpg;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod exploration;
pub mod learner;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod playground;
pub mod replay_buffer;
pub mod value_function;

pub use error::{Result, RlError};

#[cfg(test)]
mod tests;
