use ndarray::Array1;
use serde::{Serialize, Deserialize};

use super::gelu::Gelu;

/// An enumeration of the activation functions a convolutional layer can apply.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Sigmoid,
    Relu,
    Linear,
    Tanh,
    LeakyRelu { alpha: f32 },
    Elu { alpha: f32 },
    Gelu,
}

impl Activation {
    /// The activation a layer receives when none is configured.
    ///
    /// Every channel uses the same canonical function, so the channel count
    /// only matters to callers that build per-channel values.
    pub fn canonical(_channels: usize) -> Self {
        Activation::Sigmoid
    }

    /// Evaluate the activation at a single value.
    pub fn evaluate(&self, v: f32) -> f32 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Linear => v,
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Activation::Tanh => v.tanh(),
            Activation::LeakyRelu { alpha } => if v > 0.0 { v } else { alpha * v },
            Activation::Elu { alpha } => if v > 0.0 { v } else { alpha * (v.exp() - 1.0) },
            Activation::Gelu => Gelu::evaluate(v),
        }
    }

    /// Derivative of the activation at a single pre-activation value.
    pub fn derivative_at(&self, v: f32) -> f32 {
        match self {
            Activation::Relu => if v > 0.0 { 1.0 } else { 0.0 },
            Activation::Linear => 1.0,
            Activation::Sigmoid => {
                let sigmoid = 1.0 / (1.0 + (-v).exp());
                sigmoid * (1.0 - sigmoid)
            }
            Activation::Tanh => {
                let tanh_v = v.tanh();
                1.0 - tanh_v * tanh_v
            }
            Activation::LeakyRelu { alpha } => if v > 0.0 { 1.0 } else { *alpha },
            Activation::Elu { alpha } => if v > 0.0 { 1.0 } else { alpha * v.exp() },
            Activation::Gelu => Gelu::derivative_at(v),
        }
    }

    /// Apply the activation function to every channel in-place.
    pub fn apply(&self, input: &mut Array1<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Gelu => Gelu::apply(input),
            _ => input.mapv_inplace(|v| self.evaluate(v)),
        }
    }

    /// Compute the channel-wise derivative of the activation function.
    pub fn derivative(&self, input: &Array1<f32>) -> Array1<f32> {
        match self {
            Activation::Linear => Array1::ones(input.len()),
            Activation::Gelu => Gelu::derivative(input),
            _ => input.mapv(|v| self.derivative_at(v)),
        }
    }
}
