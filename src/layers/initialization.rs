use ndarray::Array4;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{StandardNormal, Uniform};
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::geometry::Extent;

/// Kernel initialization strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization
    XavierUniform,

    /// Xavier/Glorot normal initialization
    XavierNormal,

    /// He/Kaiming uniform initialization (for ReLU)
    HeUniform,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// Normal distribution with custom mean and std
    Normal { mean: f32, std: f32 },

    /// All zeros
    Zeros,

    /// All ones
    Ones,
}

impl WeightInit {
    /// Initialize a kernel of the given extent.
    ///
    /// `fan_in` and `fan_out` default to the number of kernel taps times the
    /// channel count on each side.
    pub fn initialize_kernel(&self, extent: Extent, fan_in: usize, fan_out: usize) -> Array4<f32> {
        let shape = extent.shape();
        let fan_in = fan_in.max(1);
        let fan_out = fan_out.max(1);

        match self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                Array4::random(shape, Uniform::new_inclusive(-limit, limit))
            }

            WeightInit::XavierNormal => {
                let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
                normal(shape, 0.0, std)
            }

            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in as f32).sqrt();
                Array4::random(shape, Uniform::new_inclusive(-limit, limit))
            }

            WeightInit::HeNormal => {
                let std = (2.0 / fan_in as f32).sqrt();
                normal(shape, 0.0, std)
            }

            WeightInit::Uniform { min, max } => {
                if min < max {
                    Array4::random(shape, Uniform::new(*min, *max))
                } else {
                    Array4::from_elem(shape, *min)
                }
            }

            WeightInit::Normal { mean, std } => normal(shape, *mean, *std),

            WeightInit::Zeros => Array4::zeros(shape),

            WeightInit::Ones => Array4::ones(shape),
        }
    }

    /// Initialize a scalar bias
    pub fn initialize_bias(&self) -> f32 {
        match self {
            WeightInit::Ones => 1.0,
            WeightInit::Uniform { min, max } if min < max => rand::thread_rng().gen_range(*min..*max),
            WeightInit::Normal { mean, std } => {
                let z: f32 = rand::thread_rng().sample(StandardNormal);
                mean + std.abs() * z
            }
            _ => 0.0,
        }
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: &Activation) -> Self {
        match activation {
            Activation::Relu | Activation::LeakyRelu { .. } | Activation::Elu { .. } => {
                WeightInit::HeNormal
            }
            Activation::Sigmoid | Activation::Tanh => {
                WeightInit::XavierNormal
            }
            Activation::Linear | Activation::Gelu => {
                WeightInit::XavierNormal
            }
        }
    }
}

fn normal(shape: (usize, usize, usize, usize), mean: f32, std: f32) -> Array4<f32> {
    let std = if std.is_finite() { std.abs() } else { 0.01 };
    Array4::<f32>::random(shape, StandardNormal).mapv(|z| mean + std * z)
}
