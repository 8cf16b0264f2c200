//! Dense feed-forward network with dropout and L2 weight penalties.

use rand::Rng;

use super::optimizer::Optimizer;
use super::ModelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Self::Relu => z.max(0.0),
            Self::Sigmoid => sigmoid(z),
        }
    }

    /// Derivative expressed through the pre-activation `z` and output `a`.
    fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Self::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Sigmoid => a * (1.0 - a),
        }
    }
}

pub fn sigmoid(z: f64) -> f64 {
    let z = z.clamp(-500.0, 500.0);
    1.0 / (1.0 + (-z).exp())
}

/// Shape of one dense layer and the regularization applied around it.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub units: usize,
    pub activation: Activation,
    /// L2 penalty coefficient on the kernel (0 disables it).
    pub l2: f64,
    /// Dropout rate applied to this layer's output during training.
    pub dropout: f64,
}

impl LayerSpec {
    pub fn dense(units: usize, activation: Activation) -> Self {
        Self { units, activation, l2: 0.0, dropout: 0.0 }
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout = rate;
        self
    }
}

#[derive(Clone, Debug)]
struct Dense {
    inputs: usize,
    units: usize,
    /// Row-major `units x inputs`.
    weights: Vec<f64>,
    biases: Vec<f64>,
    activation: Activation,
    l2: f64,
    dropout: f64,
}

impl Dense {
    fn new<R: Rng + ?Sized>(inputs: usize, spec: &LayerSpec, rng: &mut R) -> Self {
        // Glorot uniform
        let limit = (6.0 / (inputs + spec.units) as f64).sqrt();
        let weights = (0..inputs * spec.units).map(|_| rng.gen_range(-limit..=limit)).collect();

        Self {
            inputs,
            units: spec.units,
            weights,
            biases: vec![0.0; spec.units],
            activation: spec.activation,
            l2: spec.l2,
            dropout: spec.dropout,
        }
    }

    fn pre_activation(&self, input: &[f64]) -> Vec<f64> {
        (0..self.units)
            .map(|unit| {
                let row = &self.weights[unit * self.inputs..(unit + 1) * self.inputs];
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + self.biases[unit]
            })
            .collect()
    }

    fn penalty(&self) -> f64 {
        if self.l2 == 0.0 {
            return 0.0;
        }
        self.l2 * self.weights.iter().map(|w| w * w).sum::<f64>()
    }
}

/// Per-sample values recorded by the training forward pass.
struct Trace {
    /// Input to each layer; the last entry is the network output.
    activations: Vec<Vec<f64>>,
    pre_activations: Vec<Vec<f64>>,
    /// Inverted-dropout multipliers (0 or 1/keep) per layer output.
    masks: Vec<Option<Vec<f64>>>,
}

#[derive(Clone, Debug)]
pub struct Network {
    layers: Vec<Dense>,
}

impl Network {
    /// Builds a network for `input_dim` features. The architecture must end
    /// in a single sigmoid unit and every layer must have at least one unit.
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        specs: &[LayerSpec],
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        if input_dim == 0 {
            return Err(ModelError::InvalidArchitecture("input dimension is zero".to_string()));
        }
        let Some(last) = specs.last() else {
            return Err(ModelError::InvalidArchitecture("no layers configured".to_string()));
        };
        if last.units != 1 || last.activation != Activation::Sigmoid {
            return Err(ModelError::InvalidArchitecture(
                "output layer must be a single sigmoid unit".to_string(),
            ));
        }

        let mut layers = Vec::with_capacity(specs.len());
        let mut inputs = input_dim;
        for (index, spec) in specs.iter().enumerate() {
            if spec.units == 0 {
                return Err(ModelError::InvalidArchitecture(format!("layer {index} has zero units")));
            }
            if !(0.0..1.0).contains(&spec.dropout) || !spec.l2.is_finite() || spec.l2 < 0.0 {
                return Err(ModelError::InvalidArchitecture(format!(
                    "layer {index} has invalid regularization (dropout {}, l2 {})",
                    spec.dropout, spec.l2
                )));
            }
            layers.push(Dense::new(inputs, spec, rng));
            inputs = spec.units;
        }

        Ok(Self { layers })
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.weights.len() + layer.biases.len()).sum()
    }

    /// Inference pass; dropout is disabled.
    pub fn predict(&self, input: &[f64]) -> f64 {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer
                .pre_activation(&current)
                .into_iter()
                .map(|z| layer.activation.apply(z))
                .collect();
        }
        current.first().copied().unwrap_or(0.0)
    }

    fn forward_train<R: Rng + ?Sized>(&self, input: &[f64], rng: &mut R) -> Trace {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(self.layers.len());
        activations.push(input.to_vec());

        for layer in &self.layers {
            let Some(current) = activations.last() else { break };
            let z = layer.pre_activation(current);
            let mut a: Vec<f64> = z.iter().map(|value| layer.activation.apply(*value)).collect();

            let mask = (layer.dropout > 0.0).then(|| {
                let keep = 1.0 - layer.dropout;
                a.iter_mut()
                    .map(|value| {
                        let factor = if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 };
                        *value *= factor;
                        factor
                    })
                    .collect::<Vec<f64>>()
            });

            pre_activations.push(z);
            masks.push(mask);
            activations.push(a);
        }

        Trace { activations, pre_activations, masks }
    }

    /// Mean binary cross-entropy of `predictions` against soft `labels`.
    pub fn binary_cross_entropy(prediction: f64, label: f64) -> f64 {
        const EPSILON: f64 = 1e-7;
        let p = prediction.clamp(EPSILON, 1.0 - EPSILON);
        -(label * p.ln() + (1.0 - label) * (1.0 - p).ln())
    }

    pub fn regularization_penalty(&self) -> f64 {
        self.layers.iter().map(Dense::penalty).sum()
    }

    /// One optimizer step on a mini-batch. Returns the mean batch loss
    /// including the L2 penalty.
    pub fn train_batch<R: Rng + ?Sized>(
        &mut self,
        inputs: &[&[f64]],
        labels: &[f64],
        optimizer: &mut Optimizer,
        rng: &mut R,
    ) -> f64 {
        let batch = inputs.len().max(1) as f64;
        let mut weight_grads: Vec<Vec<f64>> =
            self.layers.iter().map(|layer| vec![0.0; layer.weights.len()]).collect();
        let mut bias_grads: Vec<Vec<f64>> =
            self.layers.iter().map(|layer| vec![0.0; layer.biases.len()]).collect();
        let mut loss = 0.0;

        for (input, label) in inputs.iter().zip(labels) {
            let trace = self.forward_train(input, rng);
            let output = trace.activations.last().and_then(|a| a.first()).copied().unwrap_or(0.0);
            loss += Self::binary_cross_entropy(output, *label);

            // sigmoid + cross-entropy: dL/dz = p - y
            let mut delta = vec![(output - label) / batch];

            for index in (0..self.layers.len()).rev() {
                let layer = &self.layers[index];
                let input = &trace.activations[index];

                for unit in 0..layer.units {
                    bias_grads[index][unit] += delta[unit];
                    let row = unit * layer.inputs;
                    for (offset, x) in input.iter().enumerate() {
                        weight_grads[index][row + offset] += delta[unit] * x;
                    }
                }

                if index == 0 {
                    break;
                }

                let below = &self.layers[index - 1];
                let mut next = vec![0.0; layer.inputs];
                for (unit, d) in delta.iter().enumerate() {
                    let row = unit * layer.inputs;
                    for (offset, slot) in next.iter_mut().enumerate() {
                        *slot += layer.weights[row + offset] * d;
                    }
                }
                let z = &trace.pre_activations[index - 1];
                let a = &trace.activations[index];
                let mask = trace.masks[index - 1].as_deref();
                for (offset, slot) in next.iter_mut().enumerate() {
                    let dropout_factor = mask.map_or(1.0, |mask| mask[offset]);
                    // `a` already carries the dropout scaling; undo it for the
                    // sigmoid derivative, which depends on the raw output.
                    let raw = if dropout_factor > 0.0 { a[offset] / dropout_factor } else { 0.0 };
                    *slot *= below.activation.derivative(z[offset], raw) * dropout_factor;
                }
                delta = next;
            }
        }

        optimizer.begin_step();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            if layer.l2 > 0.0 {
                for (grad, weight) in weight_grads[index].iter_mut().zip(&layer.weights) {
                    *grad += 2.0 * layer.l2 * weight;
                }
            }
            optimizer.update(index * 2, &mut layer.weights, &weight_grads[index]);
            optimizer.update(index * 2 + 1, &mut layer.biases, &bias_grads[index]);
        }

        loss / batch + self.regularization_penalty()
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(|layer| {
            layer.weights.iter().chain(&layer.biases).all(|value| value.is_finite())
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{sigmoid, Activation, LayerSpec, Network};
    use crate::ml::optimizer::Optimizer;
    use crate::ml::ModelError;

    fn small_specs() -> Vec<LayerSpec> {
        vec![LayerSpec::dense(4, Activation::Relu), LayerSpec::dense(1, Activation::Sigmoid)]
    }

    #[test]
    fn sigmoid_computes_correctly() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(5.0) > 0.99);
        assert!(sigmoid(-5.0) < 0.01);
        assert!(sigmoid(1e6).is_finite());
    }

    #[test]
    fn rejects_degenerate_architectures() {
        let mut rng = StdRng::seed_from_u64(1);

        assert!(matches!(
            Network::new(0, &small_specs(), &mut rng),
            Err(ModelError::InvalidArchitecture(_))
        ));
        assert!(matches!(
            Network::new(3, &[LayerSpec::dense(0, Activation::Relu)], &mut rng),
            Err(ModelError::InvalidArchitecture(_))
        ));
        assert!(matches!(
            Network::new(3, &[LayerSpec::dense(2, Activation::Sigmoid)], &mut rng),
            Err(ModelError::InvalidArchitecture(_))
        ));
        let bad_dropout = vec![
            LayerSpec::dense(4, Activation::Relu).with_dropout(1.0),
            LayerSpec::dense(1, Activation::Sigmoid),
        ];
        assert!(Network::new(3, &bad_dropout, &mut rng).is_err());
    }

    #[test]
    fn predictions_are_probabilities() {
        let mut rng = StdRng::seed_from_u64(7);
        let network = Network::new(3, &small_specs(), &mut rng).expect("valid network");

        for input in [[0.0, 0.0, 0.0], [1.0, 0.5, 0.25], [10.0, -3.0, 7.0]] {
            let p = network.predict(&input);
            assert!((0.0..=1.0).contains(&p));
        }
        assert_eq!(network.parameter_count(), 3 * 4 + 4 + 4 + 1);
    }

    #[test]
    fn training_reduces_loss_on_separable_data() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut network = Network::new(2, &small_specs(), &mut rng).expect("valid network");
        let mut optimizer = Optimizer::adam(0.05);

        let inputs: Vec<Vec<f64>> =
            vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0], vec![0.1, 0.9]];
        let labels = vec![1.0, 1.0, 0.0, 0.0];
        let batch: Vec<&[f64]> = inputs.iter().map(Vec::as_slice).collect();

        let first = network.train_batch(&batch, &labels, &mut optimizer, &mut rng);
        let mut last = first;
        for _ in 0..300 {
            last = network.train_batch(&batch, &labels, &mut optimizer, &mut rng);
        }

        assert!(last < first, "loss should decrease: first={first}, last={last}");
        assert!(network.predict(&[1.0, 0.0]) > network.predict(&[0.0, 1.0]));
        assert!(network.is_finite());
    }

    #[test]
    fn binary_cross_entropy_handles_extremes() {
        assert!(Network::binary_cross_entropy(1.0, 1.0) < 1e-6);
        assert!(Network::binary_cross_entropy(0.0, 1.0).is_finite());
        assert!(Network::binary_cross_entropy(0.5, 0.5) > 0.69);
    }

    #[test]
    fn l2_penalty_is_zero_without_regularized_layers() {
        let mut rng = StdRng::seed_from_u64(3);
        let plain = Network::new(2, &small_specs(), &mut rng).expect("valid network");
        assert_eq!(plain.regularization_penalty(), 0.0);

        let regularized = Network::new(
            2,
            &[
                LayerSpec::dense(4, Activation::Relu).with_l2(0.001),
                LayerSpec::dense(1, Activation::Sigmoid),
            ],
            &mut rng,
        )
        .expect("valid network");
        assert!(regularized.regularization_penalty() > 0.0);
    }
}
