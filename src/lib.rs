//! # convnd - N-dimensional Convolutional Layer Engine
//!
//! convnd implements convolution and deconvolution layers of rank one to four
//! (width, height, depth and time) over a generic neuron value type. Layers
//! forward-propagate through strided filters with optional zero padding and
//! transposed modes, pass region-limited partial updates between neighbours,
//! and learn filter kernels between a large and a small layer by a localized
//! gradient descent rule.
//!
//! ## Key Features
//!
//! - **One engine for every rank**: a single rank-parameterized layer type;
//!   lower ranks are higher ranks with unit extents
//! - **Filters**: block or slide-by-one product filters, transposed filters,
//!   and transposed filters that gather every covering source neuron
//! - **Region mapping**: translate a sub-region between adjacent layers and
//!   propagate only what changed
//! - **Filter learning**: kernel extent inferred from the layer size ratio
//! - **Multi-channel values**: `f32` or per-channel [`value::Vector`]
//!
//! ## Quick Start
//!
//! ```rust
//! use convnd::activations::Activation;
//! use convnd::filter::Filter;
//! use convnd::geometry::{Extent, Rank};
//! use convnd::layers::ConvLayer;
//! use convnd::propagation::forward;
//! use ndarray::Array4;
//!
//! let kernel = Array4::from_elem((1, 1, 1, 2), 1.0f32);
//! let filter = Filter::product(Rank::One, kernel, 0.5, 2);
//!
//! let mut source = ConvLayer::new(1, Rank::One, Extent::line(6), Some(Activation::Linear));
//! source.set_data(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None);
//! let mut dest = ConvLayer::new(1, Rank::One, Extent::line(3), Some(Activation::Linear));
//!
//! let result = forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
//! assert_eq!(result.outputs(), vec![1.5, 3.5, 5.5]);
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions (Sigmoid, ReLU, Tanh, etc.)
//! - [`builders`] - Builder patterns for layers and filters
//! - [`chain`] - Index-addressed chains of linked layers
//! - [`config`] - Serde configuration for chains and learning runs
//! - [`content`] - Named feature maps with algebra and reshaping
//! - [`debug`] - Numerical checks for kernels and buffers
//! - [`error`] - Error types and result handling
//! - [`filter`] - Convolution filters and their derivative maps
//! - [`geometry`] - Ranks, extents, coordinates and regions
//! - [`layers`] - The convolutional layer and kernel initialization
//! - [`learning`] - Online filter learning between a large and a small layer
//! - [`propagation`] - The forward pass
//! - [`region`] - Region mapping between adjacent layers
//! - [`value`] - The neuron value algebra

#[macro_use]
pub mod macros;

pub mod activations;
pub mod builders;
pub mod chain;
pub mod config;
pub mod content;
pub mod debug;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod layers;
pub mod learning;
pub mod propagation;
pub mod region;
pub mod value;

#[cfg(test)]
mod tests;
