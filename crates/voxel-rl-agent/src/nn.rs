//! Small fully-connected networks with hand-written backpropagation
//!
//! Just enough tensor plumbing for the value and policy networks used by
//! the DQN and PPO agents: dense layers, a forward pass that keeps its
//! intermediate values, and a backward pass that turns an output gradient
//! into per-layer weight and bias gradients.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use voxel_rl_core::math::gaussian_matrix;
use voxel_rl_core::{ensure_dimension, AgentSnapshot, GaussianInit, Result};

/// Element-wise layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// `tanh(x)`
    Tanh,
    /// `x`
    Identity,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Tanh => x.tanh(),
            Self::Identity => x,
        }
    }

    /// Derivative given pre-activation `z` and output `a`
    fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Self::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Tanh => 1.0 - a * a,
            Self::Identity => 1.0,
        }
    }
}

/// Dense layer `a = f(W x + b)` with `W` stored as `outputs × inputs`
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    /// Weight matrix
    pub weights: Array2<f64>,
    /// Bias vector
    pub bias: Array1<f64>,
    /// Activation
    pub activation: Activation,
}

impl Dense {
    /// Gaussian weights with variance `2 / (inputs + outputs)`, zero bias
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let mut layer = Self {
            weights: Array2::zeros((outputs, inputs)),
            bias: Array1::zeros(outputs),
            activation,
        };
        layer.redraw(rng);
        layer
    }

    #[allow(clippy::cast_precision_loss)]
    fn redraw<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (outputs, inputs) = self.weights.dim();
        let init = GaussianInit {
            mean: 0.0,
            std: (2.0 / (inputs + outputs) as f64).sqrt(),
        };
        self.weights = gaussian_matrix(outputs, inputs, init, rng);
        self.bias.fill(0.0);
    }

    fn forward(&self, input: ArrayView1<'_, f64>) -> (Array1<f64>, Array1<f64>) {
        let z = self.weights.dot(&input) + &self.bias;
        let activation = self.activation;
        let a = z.mapv(|v| activation.apply(v));
        (z, a)
    }
}

/// Intermediate values of one forward pass
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// Input to each layer
    inputs: Vec<Array1<f64>>,
    /// Pre-activation of each layer
    pre: Vec<Array1<f64>>,
    /// Output of the last layer
    pub output: Array1<f64>,
}

/// Per-layer parameter gradients
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// Weight gradients, one per layer
    pub weights: Vec<Array2<f64>>,
    /// Bias gradients, one per layer
    pub biases: Vec<Array1<f64>>,
}

impl Gradients {
    /// Zero gradients shaped like `network`
    #[must_use]
    pub fn zeros_like(network: &Mlp) -> Self {
        Self {
            weights: network.layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            biases: network.layers.iter().map(|l| Array1::zeros(l.bias.len())).collect(),
        }
    }

    /// `self += other`
    pub fn accumulate(&mut self, other: &Self) {
        for (w, o) in self.weights.iter_mut().zip(&other.weights) {
            *w += o;
        }
        for (b, o) in self.biases.iter_mut().zip(&other.biases) {
            *b += o;
        }
    }

    /// `self *= factor`
    pub fn scale(&mut self, factor: f64) {
        for w in &mut self.weights {
            *w *= factor;
        }
        for b in &mut self.biases {
            *b *= factor;
        }
    }

    /// Euclidean norm over every entry
    #[must_use]
    pub fn norm(&self) -> f64 {
        let w: f64 = self.weights.iter().map(|w| w.iter().map(|x| x * x).sum::<f64>()).sum();
        let b: f64 = self.biases.iter().map(|b| b.dot(b)).sum();
        (w + b).sqrt()
    }
}

/// Multilayer perceptron
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Dense>,
}

impl Mlp {
    /// Three dense layers `input → hidden.0 → hidden.1 → output`
    pub fn three_layer<R: Rng + ?Sized>(
        input: usize,
        hidden: (usize, usize),
        output: usize,
        activations: [Activation; 3],
        rng: &mut R,
    ) -> Self {
        let sizes = [input, hidden.0, hidden.1, output];
        let layers = activations
            .iter()
            .enumerate()
            .map(|(i, &act)| Dense::new(sizes[i], sizes[i + 1], act, &mut *rng))
            .collect();
        Self { layers }
    }

    /// Layers, input first
    #[must_use]
    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Input width
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.ncols())
    }

    /// Output width
    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.nrows())
    }

    /// Redraw every layer from its initial distribution
    pub fn reinitialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for layer in &mut self.layers {
            layer.redraw(&mut *rng);
        }
    }

    /// Network output
    pub fn forward(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        Ok(self.forward_pass(input)?.output)
    }

    /// Forward pass keeping what [`Mlp::backward`] needs
    pub fn forward_pass(&self, input: ArrayView1<'_, f64>) -> Result<ForwardPass> {
        ensure_dimension("network input", self.input_dim(), input.len())?;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut current = input.to_owned();
        for layer in &self.layers {
            let (z, a) = layer.forward(current.view());
            inputs.push(current);
            pre.push(z);
            current = a;
        }
        Ok(ForwardPass {
            inputs,
            pre,
            output: current,
        })
    }

    /// Gradients of a loss whose derivative with respect to the output is
    /// `grad_output`
    pub fn backward(&self, pass: &ForwardPass, grad_output: &Array1<f64>) -> Result<Gradients> {
        ensure_dimension("output gradient", self.output_dim(), grad_output.len())?;
        let n = self.layers.len();
        let mut weights = Vec::with_capacity(n);
        let mut biases = Vec::with_capacity(n);

        let mut upstream = grad_output.clone();
        for i in (0..n).rev() {
            let layer = &self.layers[i];
            let z = &pass.pre[i];
            let a = if i + 1 == n { &pass.output } else { &pass.inputs[i + 1] };
            let activation = layer.activation;
            let delta: Array1<f64> = upstream
                .iter()
                .zip(z.iter().zip(a))
                .map(|(g, (&z, &a))| g * activation.derivative(z, a))
                .collect();

            let outer = delta
                .view()
                .insert_axis(Axis(1))
                .dot(&pass.inputs[i].view().insert_axis(Axis(0)));
            upstream = layer.weights.t().dot(&delta);
            weights.push(outer);
            biases.push(delta);
        }
        weights.reverse();
        biases.reverse();
        Ok(Gradients { weights, biases })
    }

    /// Gradient descent step `θ -= lr * g`
    pub fn apply_gradients(&mut self, gradients: &Gradients, learning_rate: f64) {
        for (layer, (w, b)) in self
            .layers
            .iter_mut()
            .zip(gradients.weights.iter().zip(&gradients.biases))
        {
            layer.weights.scaled_add(-learning_rate, w);
            layer.bias.scaled_add(-learning_rate, b);
        }
    }

    /// Copy every parameter from `other`
    pub fn copy_from(&mut self, other: &Self) {
        self.layers.clone_from(&other.layers);
    }

    /// Add each layer's weights and bias to `snapshot` under `prefix`
    #[must_use]
    pub fn export(&self, prefix: &str, mut snapshot: AgentSnapshot) -> AgentSnapshot {
        for (i, layer) in self.layers.iter().enumerate() {
            snapshot = snapshot
                .with_tensor(&format!("{prefix}.{i}.weights"), layer.weights.clone())
                .with_tensor(
                    &format!("{prefix}.{i}.bias"),
                    layer.bias.clone().insert_axis(Axis(0)),
                );
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn net(activations: [Activation; 3]) -> Mlp {
        let mut rng = StdRng::seed_from_u64(17);
        Mlp::three_layer(3, (5, 4), 2, activations, &mut rng)
    }

    fn half_squared_loss(net: &Mlp, x: &Array1<f64>, target: &Array1<f64>) -> f64 {
        let y = net.forward(x.view()).unwrap();
        0.5 * (&y - target).mapv(|d| d * d).sum()
    }

    #[test]
    fn test_shapes() {
        let n = net([Activation::Relu; 3]);
        assert_eq!(n.input_dim(), 3);
        assert_eq!(n.output_dim(), 2);
        assert_eq!(n.layers()[1].weights.dim(), (4, 5));
        assert!(n.forward(arr1(&[1.0, 2.0]).view()).is_err());
    }

    #[test]
    fn test_relu_output_is_non_negative() {
        let n = net([Activation::Relu; 3]);
        for i in 0..20 {
            let x = f64::from(i) - 10.0;
            let y = n.forward(arr1(&[x, -x, 0.5 * x]).view()).unwrap();
            assert!(y.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let n = net([Activation::Tanh, Activation::Tanh, Activation::Identity]);
        let x = arr1(&[0.3, -0.7, 0.9]);
        let target = arr1(&[0.5, -0.25]);

        let pass = n.forward_pass(x.view()).unwrap();
        let grad_out = &pass.output - &target;
        let grads = n.backward(&pass, &grad_out).unwrap();

        let h = 1e-6;
        for layer in 0..3 {
            let (rows, cols) = n.layers()[layer].weights.dim();
            for r in 0..rows {
                for c in 0..cols {
                    let mut plus = n.clone();
                    plus.layers[layer].weights[[r, c]] += h;
                    let mut minus = n.clone();
                    minus.layers[layer].weights[[r, c]] -= h;
                    let numeric = (half_squared_loss(&plus, &x, &target)
                        - half_squared_loss(&minus, &x, &target))
                        / (2.0 * h);
                    assert_relative_eq!(grads.weights[layer][[r, c]], numeric, epsilon = 1e-6);
                }
                let mut plus = n.clone();
                plus.layers[layer].bias[r] += h;
                let mut minus = n.clone();
                minus.layers[layer].bias[r] -= h;
                let numeric = (half_squared_loss(&plus, &x, &target)
                    - half_squared_loss(&minus, &x, &target))
                    / (2.0 * h);
                assert_relative_eq!(grads.biases[layer][r], numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_gradient_step_reduces_loss() {
        let mut n = net([Activation::Tanh, Activation::Tanh, Activation::Identity]);
        let x = arr1(&[0.1, 0.2, 0.3]);
        let target = arr1(&[1.0, -1.0]);
        let before = half_squared_loss(&n, &x, &target);
        for _ in 0..50 {
            let pass = n.forward_pass(x.view()).unwrap();
            let grads = n.backward(&pass, &(&pass.output - &target)).unwrap();
            n.apply_gradients(&grads, 0.05);
        }
        assert!(half_squared_loss(&n, &x, &target) < before);
    }

    #[test]
    fn test_copy_from_and_reinitialize() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = net([Activation::Relu; 3]);
        let mut b = Mlp::three_layer(3, (5, 4), 2, [Activation::Relu; 3], &mut rng);
        assert_ne!(a, b);
        b.copy_from(&a);
        assert_eq!(a, b);
        b.reinitialize(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_gradient_accumulate_and_scale() {
        let n = net([Activation::Identity; 3]);
        let pass = n.forward_pass(arr1(&[1.0, 0.0, -1.0]).view()).unwrap();
        let g = n.backward(&pass, &arr1(&[1.0, 1.0])).unwrap();
        let mut sum = Gradients::zeros_like(&n);
        sum.accumulate(&g);
        sum.accumulate(&g);
        sum.scale(0.5);
        assert_relative_eq!(sum.norm(), g.norm(), epsilon = 1e-12);
    }
}
