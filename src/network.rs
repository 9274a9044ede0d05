use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::activations::Activation;
use crate::error::{Result, RlError};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use crate::value_function::{Parameters, Persistent, ValueFunction};

/// A fully connected layer: `activation(inputs . weights + biases)`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Layer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

impl Layer {
    /// Create a layer with He-uniform weights, `U(-sqrt(6/fan_in), sqrt(6/fan_in))`,
    /// and zero biases.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Self {
        let limit = (6.0 / input_size.max(1) as f32).sqrt();
        let weights = Array2::random_using((input_size, output_size), Uniform::new(-limit, limit), rng);
        let biases = Array1::zeros(output_size);
        Layer {
            weights,
            biases,
            activation,
        }
    }

    pub fn with_weights(mut self, weights: Array2<f32>) -> Result<Self> {
        if weights.dim() != self.weights.dim() {
            return Err(RlError::dimension_mismatch(
                format!("{:?}", self.weights.dim()),
                format!("{:?}", weights.dim()),
            ));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Result<Self> {
        if biases.dim() != self.biases.dim() {
            return Err(RlError::dimension_mismatch(
                format!("{:?}", self.biases.dim()),
                format!("{:?}", biases.dim()),
            ));
        }
        self.biases = biases;
        Ok(self)
    }

    /// Returns `(pre_activation, output)` for a batch.
    fn forward_batch(&self, inputs: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let mut pre_activation = inputs.dot(&self.weights);
        pre_activation += &self.biases;
        let mut output = pre_activation.clone();
        self.activation.apply_batch(&mut output);
        (pre_activation, output)
    }
}

/// Inputs and pre-activations recorded during a forward pass.
struct ForwardCache {
    inputs: Vec<Array2<f32>>,
    pre_activations: Vec<Array2<f32>>,
}

/// A multilayer perceptron trained with an owned optimizer. This is the
/// bundled [`ValueFunction`] implementation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NeuralNetwork {
    pub layers: Vec<Layer>,
    pub optimizer: OptimizerWrapper,
    pub learning_rate: f32,
}

impl NeuralNetwork {
    /// Create a network from layer sizes `[inputs, hidden.., outputs]` and one
    /// activation per weight layer.
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activations: &[Activation],
        optimizer: OptimizerWrapper,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(RlError::configuration(
                "layer_sizes",
                "Network must have at least input and output layers",
            ));
        }
        if layer_sizes.contains(&0) {
            return Err(RlError::configuration("layer_sizes", "Layer sizes must be positive"));
        }
        if activations.len() != layer_sizes.len() - 1 {
            return Err(RlError::configuration(
                "activations",
                format!(
                    "expected {} activations for {} layer sizes, got {}",
                    layer_sizes.len() - 1,
                    layer_sizes.len(),
                    activations.len()
                ),
            ));
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(RlError::configuration(
                "learning_rate",
                format!("must be positive and finite, got {}", learning_rate),
            ));
        }

        let layers = layer_sizes
            .windows(2)
            .zip(activations.iter())
            .map(|(window, &activation)| Layer::new(window[0], window[1], activation, rng))
            .collect();

        Ok(NeuralNetwork {
            layers,
            optimizer,
            learning_rate,
        })
    }

    /// Hidden layers share one activation; the output layer is linear.
    pub fn mlp<R: Rng + ?Sized>(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        hidden_activation: Activation,
        optimizer: OptimizerWrapper,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(output_size);

        let mut activations = vec![hidden_activation; hidden_sizes.len()];
        activations.push(Activation::Linear);

        Self::new(&sizes, &activations, optimizer, learning_rate, rng)
    }

    /// Like [`new`](Self::new) with a seeded generator.
    pub fn with_seed(
        layer_sizes: &[usize],
        activations: &[Activation],
        optimizer: OptimizerWrapper,
        learning_rate: f32,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new(layer_sizes, activations, optimizer, learning_rate, &mut rng)
    }

    pub fn with_layers(mut self, layers: Vec<Layer>) -> Self {
        self.layers = layers;
        self
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.weights.nrows())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.biases.len())
    }

    fn check_inputs(&self, inputs: ArrayView2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_size() {
            return Err(RlError::dimension_mismatch(
                format!("{} input features", self.input_size()),
                format!("{} input features", inputs.ncols()),
            ));
        }
        Ok(())
    }

    fn check_output_gradient(&self, inputs: ArrayView2<f32>, output_gradient: ArrayView2<f32>) -> Result<()> {
        let expected = (inputs.nrows(), self.output_size());
        if output_gradient.dim() != expected {
            return Err(RlError::dimension_mismatch(
                format!("output gradient of shape {:?}", expected),
                format!("{:?}", output_gradient.dim()),
            ));
        }
        Ok(())
    }

    fn forward_cached(&self, inputs: ArrayView2<f32>) -> (ForwardCache, Array2<f32>) {
        let mut cache = ForwardCache {
            inputs: Vec::with_capacity(self.layers.len()),
            pre_activations: Vec::with_capacity(self.layers.len()),
        };

        let mut current = inputs.to_owned();
        for layer in &self.layers {
            let (pre_activation, output) = layer.forward_batch(current.view());
            cache.inputs.push(current);
            cache.pre_activations.push(pre_activation);
            current = output;
        }
        (cache, current)
    }

    /// Backpropagate dLoss/dOutputs. Returns per-layer `(weight, bias)`
    /// gradients and dLoss/dInputs.
    fn backward(
        &self,
        cache: &ForwardCache,
        output_gradient: ArrayView2<f32>,
    ) -> (Vec<(Array2<f32>, Array1<f32>)>, Array2<f32>) {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut upstream = output_gradient.to_owned();

        for (idx, layer) in self.layers.iter().enumerate().rev() {
            let delta = upstream * &layer.activation.derivative_batch(cache.pre_activations[idx].view());
            let weight_gradient = cache.inputs[idx].t().dot(&delta);
            let bias_gradient = delta.sum_axis(Axis(0));
            upstream = delta.dot(&layer.weights.t());
            gradients.push((weight_gradient, bias_gradient));
        }

        gradients.reverse();
        (gradients, upstream)
    }
}

impl ValueFunction for NeuralNetwork {
    fn forward(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_inputs(inputs)?;
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            let (_, output) = layer.forward_batch(current.view());
            current = output;
        }
        Ok(current)
    }

    fn parameters(&self) -> Parameters {
        let tensors = self
            .layers
            .iter()
            .flat_map(|layer| [layer.weights.clone().into_dyn(), layer.biases.clone().into_dyn()])
            .collect();
        Parameters::new(tensors)
    }

    fn set_parameters(&mut self, parameters: &Parameters) -> Result<()> {
        self.parameters().check_compatible(parameters)?;

        for (layer, pair) in self.layers.iter_mut().zip(parameters.tensors().chunks(2)) {
            layer.weights = pair[0].clone().into_dimensionality()?;
            layer.biases = pair[1].clone().into_dimensionality()?;
        }
        Ok(())
    }

    fn apply_gradient(&mut self, inputs: ArrayView2<f32>, output_gradient: ArrayView2<f32>) -> Result<()> {
        self.check_inputs(inputs)?;
        self.check_output_gradient(inputs, output_gradient)?;

        let (cache, _) = self.forward_cached(inputs);
        let (gradients, _) = self.backward(&cache, output_gradient);

        let finite = gradients
            .iter()
            .all(|(w, b)| w.iter().chain(b.iter()).all(|g| g.is_finite()));
        if !finite {
            return Err(RlError::NumericalError("non-finite gradient".to_string()));
        }

        self.optimizer.begin_step();
        for (idx, (layer, (weight_gradient, bias_gradient))) in
            self.layers.iter_mut().zip(gradients.iter()).enumerate()
        {
            self.optimizer
                .update_weights(idx, &mut layer.weights, weight_gradient, self.learning_rate);
            self.optimizer
                .update_biases(idx, &mut layer.biases, bias_gradient, self.learning_rate);
        }
        Ok(())
    }

    fn input_gradient(&self, inputs: ArrayView2<f32>, output_gradient: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_inputs(inputs)?;
        self.check_output_gradient(inputs, output_gradient)?;

        let (cache, _) = self.forward_cached(inputs);
        let (_, input_gradient) = self.backward(&cache, output_gradient);
        Ok(input_gradient)
    }

    fn learning_rate(&self) -> Option<f32> {
        Some(self.learning_rate)
    }
}

impl Persistent for NeuralNetwork {
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        let network = bincode::deserialize(&data)?;
        Ok(network)
    }
}
