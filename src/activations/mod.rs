//! # Activation Functions Module
//!
//! Activation functions applied to a neuron's pre-activation input to obtain
//! its output value. Every variant can be evaluated on a single scalar (the
//! single-channel case) or channel-wise over an `Array1<f32>`.
//!
//! ## Available Activations
//!
//! - **ReLU**: `max(0, x)`
//! - **Sigmoid**: `1 / (1 + e^(-x))`, the canonical activation of a fresh layer
//! - **Tanh**: hyperbolic tangent
//! - **Linear**: identity, used when a convolution should stay affine
//! - **LeakyReLU**, **ELU**, **GELU**
//!
//! ## Usage Example
//!
//! ```rust
//! use convnd::activations::Activation;
//! use ndarray::array;
//!
//! let sigmoid = Activation::Sigmoid;
//! assert!((sigmoid.evaluate(0.0) - 0.5).abs() < 1e-6);
//!
//! let mut channels = array![1.0, -0.5, 0.0];
//! Activation::Relu.apply(&mut channels);
//! assert_eq!(channels, array![1.0, 0.0, 0.0]);
//! ```

pub mod functions;
pub mod gelu;

pub use functions::Activation;
