use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Deserialize, Serialize};

/// Per-layer parameter update rule. `layer` identifies the parameter slot
/// so stateful optimizers can keep moment estimates per layer.
pub trait Optimizer {
    /// Called once before the per-layer updates of a single gradient step.
    fn begin_step(&mut self) {}

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32);

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
        }
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
        }
    }
}

/// Plain gradient descent.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn update_weights(&mut self, _layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        weights.scaled_add(-learning_rate, gradients);
    }

    fn update_biases(&mut self, _layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        biases.scaled_add(-learning_rate, gradients);
    }
}

/// Adam with bias-corrected moment estimates. Moment buffers are created
/// lazily the first time a layer is updated.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    pub t: usize,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m_weights: Vec::new(),
            v_weights: Vec::new(),
            m_biases: Vec::new(),
            v_biases: Vec::new(),
            t: 0,
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        let hyper = AdamStep::new(self, learning_rate);
        let m = moment_slot(&mut self.m_weights, layer, weights.raw_dim());
        let v = moment_slot(&mut self.v_weights, layer, weights.raw_dim());
        hyper.apply(weights, gradients, m, v);
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        let hyper = AdamStep::new(self, learning_rate);
        let m = moment_slot(&mut self.m_biases, layer, biases.raw_dim());
        let v = moment_slot(&mut self.v_biases, layer, biases.raw_dim());
        hyper.apply(biases, gradients, m, v);
    }
}

struct AdamStep {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    correction1: f32,
    correction2: f32,
    learning_rate: f32,
}

impl AdamStep {
    fn new(adam: &Adam, learning_rate: f32) -> Self {
        let t = adam.t.max(1) as i32;
        AdamStep {
            beta1: adam.beta1,
            beta2: adam.beta2,
            epsilon: adam.epsilon,
            correction1: 1.0 - adam.beta1.powi(t),
            correction2: 1.0 - adam.beta2.powi(t),
            learning_rate,
        }
    }

    fn apply<D: Dimension>(
        &self,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        m: &mut Array<f32, D>,
        v: &mut Array<f32, D>,
    ) {
        Zip::from(params)
            .and(gradients)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.correction1;
                let v_hat = *v / self.correction2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}

fn moment_slot<D: Dimension>(slots: &mut Vec<Array<f32, D>>, layer: usize, dim: D) -> &mut Array<f32, D> {
    while slots.len() <= layer {
        slots.push(Array::zeros(dim.clone()));
    }
    if slots[layer].raw_dim() != dim {
        slots[layer] = Array::zeros(dim);
    }
    &mut slots[layer]
}
