//! Numeric element stored in every neuron
//!
//! Layers, filters and contents are generic over [`NeuronValue`], a field-like
//! element with the four arithmetic operations, additive and multiplicative
//! identities, and activation evaluation. `f32` is the single-channel value;
//! [`Vector`] holds one `f32` per channel.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::activations::Activation;

/// Algebra required of a neuron value
pub trait NeuronValue: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Additive identity with the given channel count
    fn zero(channels: usize) -> Self;

    /// Multiplicative identity with the given channel count
    fn unit(channels: usize) -> Self;

    /// Every channel set to `value`
    fn splat(value: f32, channels: usize) -> Self;

    fn channels(&self) -> usize;

    fn add(&self, other: &Self) -> Self;

    fn subtract(&self, other: &Self) -> Self;

    fn multiply(&self, other: &Self) -> Self;

    fn divide(&self, other: &Self) -> Self;

    /// Multiply every channel by a plain scalar
    fn scale(&self, factor: f32) -> Self;

    /// Activation output for this pre-activation value
    fn evaluate(&self, activation: &Activation) -> Self;

    /// Activation derivative at this pre-activation value
    fn derivative(&self, activation: &Activation) -> Self;

    /// Mean absolute channel value
    fn norm(&self) -> f32;

    fn is_finite(&self) -> bool;
}

impl NeuronValue for f32 {
    fn zero(_channels: usize) -> Self {
        0.0
    }

    fn unit(_channels: usize) -> Self {
        1.0
    }

    fn splat(value: f32, _channels: usize) -> Self {
        value
    }

    fn channels(&self) -> usize {
        1
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn subtract(&self, other: &Self) -> Self {
        self - other
    }

    fn multiply(&self, other: &Self) -> Self {
        self * other
    }

    fn divide(&self, other: &Self) -> Self {
        self / other
    }

    fn scale(&self, factor: f32) -> Self {
        self * factor
    }

    fn evaluate(&self, activation: &Activation) -> Self {
        activation.evaluate(*self)
    }

    fn derivative(&self, activation: &Activation) -> Self {
        activation.derivative_at(*self)
    }

    fn norm(&self) -> f32 {
        self.abs()
    }

    fn is_finite(&self) -> bool {
        f32::is_finite(*self)
    }
}

/// A multi-channel neuron value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vector(pub Array1<f32>);

impl Vector {
    pub fn from_vec(channels: Vec<f32>) -> Self {
        Vector(Array1::from_vec(channels))
    }

    /// Combine channel-wise; the shorter operand is padded with zeros.
    fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let len = self.0.len().max(other.0.len());
        let channel = |v: &Array1<f32>, i: usize| v.get(i).copied().unwrap_or(0.0);
        Vector(Array1::from_shape_fn(len, |i| f(channel(&self.0, i), channel(&other.0, i))))
    }
}

impl NeuronValue for Vector {
    fn zero(channels: usize) -> Self {
        Vector(Array1::zeros(channels.max(1)))
    }

    fn unit(channels: usize) -> Self {
        Vector(Array1::ones(channels.max(1)))
    }

    fn splat(value: f32, channels: usize) -> Self {
        Vector(Array1::from_elem(channels.max(1), value))
    }

    fn channels(&self) -> usize {
        self.0.len()
    }

    fn add(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a + b)
    }

    fn subtract(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a - b)
    }

    fn multiply(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a * b)
    }

    fn divide(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a / b)
    }

    fn scale(&self, factor: f32) -> Self {
        Vector(&self.0 * factor)
    }

    fn evaluate(&self, activation: &Activation) -> Self {
        let mut channels = self.0.clone();
        activation.apply(&mut channels);
        Vector(channels)
    }

    fn derivative(&self, activation: &Activation) -> Self {
        Vector(activation.derivative(&self.0))
    }

    fn norm(&self) -> f32 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().map(|v| v.abs()).sum::<f32>() / self.0.len() as f32
    }

    fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}
