#[cfg(test)]
mod property_tests {
    use ndarray::{Array1, Array2};
    use proptest::prelude::*;
    use quadrl::activations::Activation;
    use quadrl::evaluation::{Evaluation, QLearning};
    use quadrl::exploration::{DiscreteControl, EpsilonGreedy};
    use quadrl::network::NeuralNetwork;
    use quadrl::optimizer::{OptimizerWrapper, SGD};
    use quadrl::replay_buffer::{ExperienceBuffer, SampleMethod, Transition};
    use quadrl::value_function::{soft_update, ValueFunction};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn transition(id: usize) -> Transition<usize> {
        let x = id as f32;
        Transition::new(Array1::from_elem(3, x), id, x, id % 3 == 0, Array1::from_elem(3, -x))
    }

    fn network(seed: u64) -> NeuralNetwork {
        NeuralNetwork::with_seed(
            &[3, 6, 4],
            &[Activation::Relu, Activation::Linear],
            OptimizerWrapper::SGD(SGD::new()),
            0.01,
            seed,
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn test_buffer_never_exceeds_capacity(capacity in 1usize..64, inserts in 0usize..200) {
            let mut buffer = ExperienceBuffer::new(capacity).unwrap();
            for id in 0..inserts {
                buffer.remember(transition(id));
                prop_assert!(buffer.len() <= capacity);
            }
            prop_assert_eq!(buffer.len(), inserts.min(capacity));

            // The survivors are the most recent inserts, oldest first.
            let kept: Vec<usize> = buffer.iter().map(|t| t.action).collect();
            let expected: Vec<usize> = (inserts.saturating_sub(capacity)..inserts).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn test_random_sample_rows_are_distinct_and_aligned(
            stored in 1usize..100,
            requested in 0usize..150,
            seed in any::<u64>(),
        ) {
            let mut buffer = ExperienceBuffer::new(128).unwrap();
            for id in 0..stored {
                buffer.remember(transition(id));
            }
            let mut rng = StdRng::seed_from_u64(seed);
            let batch = buffer.sample(requested, SampleMethod::Random, &mut rng).unwrap();

            prop_assert_eq!(batch.len(), requested.min(stored));
            let unique: HashSet<usize> = batch.indices.iter().copied().collect();
            prop_assert_eq!(unique.len(), batch.len());

            for row in 0..batch.len() {
                let id = batch.actions[row];
                prop_assert_eq!(batch.indices[row], id);
                prop_assert_eq!(batch.rewards[row], id as f32);
                prop_assert_eq!(batch.dones[row], id % 3 == 0);
                prop_assert_eq!(batch.observations[[row, 0]], id as f32);
                prop_assert_eq!(batch.next_observations[[row, 2]], -(id as f32));
            }
        }

        #[test]
        fn test_terminal_rows_equal_rewards(
            rows in prop::collection::vec((-10.0f32..10.0, any::<bool>()), 1..32),
            discount in 0.0f32..0.99,
        ) {
            let rewards: Array1<f32> = rows.iter().map(|(r, _)| *r).collect();
            let dones: Vec<bool> = rows.iter().map(|(_, d)| *d).collect();
            let next = Array2::from_elem((rows.len(), 3), 0.5);
            let value_fn = network(1);

            let targets = QLearning::new(discount)
                .unwrap()
                .evaluate(rewards.view(), &dones, next.view(), &value_fn)
                .unwrap();

            let q = value_fn.forward(next.view()).unwrap();
            for (row, &done) in dones.iter().enumerate() {
                if done {
                    prop_assert_eq!(targets[row], rewards[row]);
                } else {
                    let best = q.row(row).iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    prop_assert!((targets[row] - (rewards[row] + discount * best)).abs() < 1e-4);
                }
            }
        }

        #[test]
        fn test_epsilon_stays_in_range(
            epsilon in 0.0f32..=1.0,
            decay in 0.0f32..=1.0,
            floor_share in 0.0f32..=1.0,
            steps in 0usize..500,
        ) {
            let floor = epsilon * floor_share;
            let mut control = EpsilonGreedy::new(epsilon, decay, floor).unwrap();
            for _ in 0..steps {
                control.decay();
                prop_assert!(control.exploration() >= floor);
                prop_assert!(control.exploration() <= epsilon);
            }
        }

        #[test]
        fn test_soft_update_endpoints(seed_a in 0u64..1000, seed_b in 0u64..1000, tau in 0.0f32..=1.0) {
            let live = network(seed_a);
            let original = network(seed_b);

            let mut copied = original.clone();
            soft_update(&mut copied, &live, 1.0).unwrap();
            prop_assert_eq!(copied.parameters(), live.parameters());

            let mut frozen = original.clone();
            soft_update(&mut frozen, &live, 0.0).unwrap();
            prop_assert_eq!(frozen.parameters(), original.parameters());

            // Blending never leaves the segment between the two endpoints.
            let mut blended = original.clone();
            soft_update(&mut blended, &live, tau).unwrap();
            let gap = live.parameters().max_abs_diff(&original.parameters()).unwrap();
            prop_assert!(blended.parameters().max_abs_diff(&live.parameters()).unwrap() <= gap + 1e-5);
            prop_assert!(blended.parameters().max_abs_diff(&original.parameters()).unwrap() <= gap + 1e-5);
        }
    }
}
