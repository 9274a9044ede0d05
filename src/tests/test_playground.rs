use ndarray::{Array1, ArrayView1};

use crate::activations::Activation;
use crate::environment::{Corridor, Environment};
use crate::error::Result;
use crate::learner::LearnerBuilder;
use crate::metrics::Metrics;
use crate::network::NeuralNetwork;
use crate::optimizer::{OptimizerWrapper, SGD};
use crate::playground::{Agent, Playground};

/// Always walks right and counts what the playground asks of it.
#[derive(Default)]
struct Walker {
    remembered: usize,
    learned: usize,
    greedy_calls: usize,
}

impl Agent for Walker {
    type Action = usize;

    fn act(&mut self, _observation: ArrayView1<f32>, greedy: bool) -> Result<usize> {
        if greedy {
            self.greedy_calls += 1;
        }
        Ok(1)
    }

    fn remember(&mut self, _observation: Array1<f32>, _action: usize, _reward: f32, _done: bool, _next: Array1<f32>) {
        self.remembered += 1;
    }

    fn learn(&mut self) -> Result<Option<Metrics>> {
        self.learned += 1;
        Ok(Some(Metrics::new().with("loss", self.learned as f32)))
    }
}

#[test]
fn test_fit_runs_act_remember_learn() {
    let mut playground = Playground::new(Corridor::new(4).unwrap(), Walker::default());
    let summaries = playground.fit(2, 10).unwrap();

    assert_eq!(summaries.len(), 2);
    for (episode, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.episode, episode);
        assert_eq!(summary.steps, 3);
        assert!((summary.reward - 0.98).abs() < 1e-6);
    }
    assert_eq!(summaries[0].metrics.get("loss"), Some(2.0));
    assert_eq!(playground.agent().remembered, 6);
    assert_eq!(playground.agent().learned, 6);
    assert_eq!(playground.tracker().episode_count(), 2);

    playground.agent_mut().learned = 0;
    playground.fit(1, 10).unwrap();
    assert_eq!(playground.agent().learned, 3);
}

#[test]
fn test_test_is_greedy_and_passive() {
    let mut playground = Playground::new(Corridor::new(3).unwrap(), Walker::default());
    let score = playground.test(3, 10).unwrap();

    assert!((score - 3.0 * 0.99).abs() < 1e-5);
    assert_eq!(playground.agent().greedy_calls, 6);
    assert_eq!(playground.agent().remembered, 0);
    assert_eq!(playground.agent().learned, 0);
}

#[test]
fn test_episodes_stop_at_max_steps() {
    let mut playground = Playground::new(Corridor::new(50).unwrap(), Walker::default());
    let summaries = playground.fit(1, 5).unwrap();
    assert_eq!(summaries[0].steps, 5);
    assert!(playground.fit(1, 0).is_err());
}

#[test]
fn test_dqn_learner_in_the_loop() {
    let corridor = Corridor::new(5).unwrap();
    let network = NeuralNetwork::with_seed(
        &[corridor.observation_size(), 16, corridor.n_actions()],
        &[Activation::Relu, Activation::Linear],
        OptimizerWrapper::SGD(SGD::new()),
        0.01,
        0,
    )
    .unwrap();
    let learner = LearnerBuilder::new(network)
        .memory_capacity(256)
        .sample_size(16)
        .training_period(1)
        .seed(4)
        .build()
        .unwrap();

    let mut playground = Playground::new(corridor, learner);
    let summaries = playground.fit(3, 30).unwrap();
    let total_steps: usize = summaries.iter().map(|s| s.steps).sum();

    assert_eq!(playground.agent().global_step(), total_steps);
    assert_eq!(playground.agent().memory().len(), total_steps);
    assert!(summaries.iter().all(|s| s.metrics.get("loss").is_some()));

    let step_before = playground.agent().global_step();
    playground.test(1, 30).unwrap();
    assert_eq!(playground.agent().global_step(), step_before);
}
