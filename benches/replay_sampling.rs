//! Buffer sampling and single learn-step throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use quadrl::activations::Activation;
use quadrl::learner::LearnerBuilder;
use quadrl::network::NeuralNetwork;
use quadrl::optimizer::{Adam, OptimizerWrapper};
use quadrl::replay_buffer::{ExperienceBuffer, SampleMethod, Transition};
use rand::rngs::StdRng;
use rand::SeedableRng;

const OBSERVATION_SIZE: usize = 6;
const N_ACTIONS: usize = 5;

fn transition(i: usize) -> Transition<usize> {
    let x = i as f32 * 1e-3;
    Transition::new(
        Array1::from_elem(OBSERVATION_SIZE, x),
        i % N_ACTIONS,
        x.sin(),
        i % 500 == 499,
        Array1::from_elem(OBSERVATION_SIZE, x + 1e-3),
    )
}

fn bench_sampling(c: &mut Criterion) {
    let mut buffer = ExperienceBuffer::new(40960).unwrap();
    for i in 0..40960 {
        buffer.remember(transition(i));
    }
    let mut rng = StdRng::seed_from_u64(0);

    let mut group = c.benchmark_group("sample");
    for size in [32usize, 512, 4096] {
        group.bench_with_input(BenchmarkId::new("random", size), &size, |b, &size| {
            b.iter(|| black_box(buffer.sample(size, SampleMethod::Random, &mut rng).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("last", size), &size, |b, &size| {
            b.iter(|| black_box(buffer.sample(size, SampleMethod::Last, &mut rng).unwrap()))
        });
    }
    group.finish();
}

fn bench_learn_step(c: &mut Criterion) {
    let network = NeuralNetwork::with_seed(
        &[OBSERVATION_SIZE, 64, 64, N_ACTIONS],
        &[Activation::Relu, Activation::Relu, Activation::Linear],
        OptimizerWrapper::Adam(Adam::default()),
        1e-3,
        0,
    )
    .unwrap();
    let mut learner = LearnerBuilder::new(network)
        .memory_capacity(4096)
        .sample_size(128)
        .training_period(1)
        .update_period(20)
        .update_factor(0.2)
        .seed(0)
        .build()
        .unwrap();
    for i in 0..4096 {
        let t = transition(i);
        learner.remember(t.observation, t.action, t.reward, t.done, t.next_observation);
    }

    c.bench_function("dqn_learn_step_128", |b| b.iter(|| black_box(learner.learn().unwrap())));
}

criterion_group!(benches, bench_sampling, bench_learn_step);
criterion_main!(benches);
