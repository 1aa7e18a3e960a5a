//! Named feature maps over layer buffers
//!
//! A [`Content`] copies a layer's output values into a standalone tensor that
//! supports elementwise algebra and reshaping along an axis. Every operation
//! returns a new content. Operands of different extents are reconciled to the
//! receiver's extent by padding with zero or truncating, never rejected.

use log::warn;
use ndarray::{Array4, Axis, Slice, Zip};
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::geometry::{nd_index, Coord, Extent, Region, MAX_RANK};
use crate::layers::ConvLayer;
use crate::value::NeuronValue;

/// Geometric axis to ndarray axis; buffers are stored `(time, depth, height, width)`
fn array_axis(axis: usize) -> Axis {
    Axis(MAX_RANK - 1 - axis)
}

/// A named tensor of neuron values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content<V> {
    name: String,
    channels: usize,
    data: Array4<V>,
}

impl<V: NeuronValue> Content<V> {
    /// A zeroed content
    pub fn new<S: Into<String>>(name: S, channels: usize, extent: Extent) -> Self {
        let channels = channels.max(1);
        Content {
            name: name.into(),
            channels,
            data: Array4::from_elem(extent.shape(), V::zero(channels)),
        }
    }

    /// Content laid out width-fastest from `values`; missing values are zero
    /// and extra values are dropped
    pub fn from_values<S: Into<String>>(name: S, channels: usize, extent: Extent, values: &[V]) -> Self {
        let mut content = Content::new(name, channels, extent);
        if values.len() != extent.count() {
            warn!(
                "content '{}' expects {} values, got {}; reconciling",
                content.name,
                extent.count(),
                values.len()
            );
        }
        for (slot, value) in content.data.iter_mut().zip(values) {
            *slot = value.clone();
        }
        content
    }

    /// Snapshot of a layer's output values
    pub fn from_layer<S: Into<String>>(name: S, layer: &ConvLayer<V>) -> Self {
        Content {
            name: name.into(),
            channels: layer.channels(),
            data: layer.neurons().map(|n| n.output.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn extent(&self) -> Extent {
        Extent::from_shape(self.data.shape())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array4<V> {
        &self.data
    }

    pub fn get(&self, coord: &Coord) -> Option<&V> {
        self.data.get(nd_index(coord))
    }

    /// Values in width-fastest order
    pub fn values(&self) -> Vec<V> {
        self.data.iter().cloned().collect()
    }

    /// Copy into a new extent, keeping the overlap and zero-filling the rest
    pub fn resize(&self, extent: Extent) -> Self {
        let mut resized = Content::new(self.name.clone(), self.channels, extent);
        if let Some(overlap) = Region::full(self.extent()).clamp_to(&extent) {
            for coord in overlap.coords() {
                resized.data[nd_index(&coord)] = self.data[nd_index(&coord)].clone();
            }
        }
        resized
    }

    /// `other` reshaped to this content's extent
    fn reconciled(&self, other: &Content<V>) -> Array4<V> {
        if other.extent() == self.extent() {
            return other.data.clone();
        }
        warn!(
            "reconciling content '{}' ({}) to '{}' ({})",
            other.name,
            other.extent(),
            self.name,
            self.extent()
        );
        other.resize(self.extent()).data
    }

    fn zip_with(&self, other: &Content<V>, f: impl Fn(&V, &V) -> V) -> Self {
        let other = self.reconciled(other);
        let data = Zip::from(&self.data).and(&other).map_collect(|a, b| f(a, b));
        Content { name: self.name.clone(), channels: self.channels, data }
    }

    fn map(&self, f: impl Fn(&V) -> V) -> Self {
        Content { name: self.name.clone(), channels: self.channels, data: self.data.map(f) }
    }

    pub fn add(&self, other: &Content<V>) -> Self {
        self.zip_with(other, |a, b| a.add(b))
    }

    pub fn subtract(&self, other: &Content<V>) -> Self {
        self.zip_with(other, |a, b| a.subtract(b))
    }

    /// Elementwise product
    pub fn multiply(&self, other: &Content<V>) -> Self {
        self.zip_with(other, |a, b| a.multiply(b))
    }

    pub fn multiply_value(&self, value: &V) -> Self {
        self.map(|a| a.multiply(value))
    }

    pub fn divide_value(&self, value: &V) -> Self {
        self.map(|a| a.divide(value))
    }

    pub fn scale(&self, factor: f32) -> Self {
        self.map(|a| a.scale(factor))
    }

    /// Mean over every element
    pub fn mean(&self) -> V {
        let sum = self
            .data
            .iter()
            .fold(V::zero(self.channels), |acc, v| acc.add(v));
        sum.scale(1.0 / self.data.len().max(1) as f32)
    }

    /// Activation applied to every element
    pub fn evaluate(&self, activation: &Activation) -> Self {
        self.map(|a| a.evaluate(activation))
    }

    /// Activation derivative at every element
    pub fn derivative(&self, activation: &Activation) -> Self {
        self.map(|a| a.derivative(activation))
    }

    /// Repeat every element `factor` times along `axis`
    pub fn increase(&self, axis: usize, factor: usize) -> Self {
        if axis >= MAX_RANK {
            return self.clone();
        }
        let factor = factor.max(1);
        let source = self.extent();
        let extent = source.with_axis(axis, source.axis(axis) * factor);
        let data = Array4::from_shape_fn(extent.shape(), |(t, z, y, x)| {
            let mut coord = [x, y, z, t];
            coord[axis] /= factor;
            self.data[nd_index(&coord)].clone()
        });
        Content { name: self.name.clone(), channels: self.channels, data }
    }

    /// Average groups of `factor` elements along `axis`; a trailing partial
    /// group is averaged over its own length
    pub fn decrease(&self, axis: usize, factor: usize) -> Self {
        if axis >= MAX_RANK {
            return self.clone();
        }
        let factor = factor.max(1);
        let source = self.extent();
        let len = source.axis(axis);
        let extent = source.with_axis(axis, (len + factor - 1) / factor);
        let data = Array4::from_shape_fn(extent.shape(), |(t, z, y, x)| {
            let mut coord = [x, y, z, t];
            let start = coord[axis] * factor;
            let end = (start + factor).min(len);
            let mut sum = V::zero(self.channels);
            for i in start..end {
                coord[axis] = i;
                sum = sum.add(&self.data[nd_index(&coord)]);
            }
            sum.scale(1.0 / (end - start) as f32)
        });
        Content { name: self.name.clone(), channels: self.channels, data }
    }

    /// Split into `parts` near-equal contents along `axis`; earlier parts take
    /// the remainder
    pub fn split(&self, axis: usize, parts: usize) -> Vec<Self> {
        if axis >= MAX_RANK {
            return vec![self.clone()];
        }
        let len = self.extent().axis(axis);
        let parts = parts.clamp(1, len);
        let base = len / parts;
        let remainder = len % parts;

        let mut start = 0;
        (0..parts)
            .map(|part| {
                let size = base + usize::from(part < remainder);
                let slice = self
                    .data
                    .slice_axis(array_axis(axis), Slice::from(start..start + size))
                    .to_owned();
                start += size;
                Content {
                    name: format!("{}[{}]", self.name, part),
                    channels: self.channels,
                    data: slice,
                }
            })
            .collect()
    }

    /// Join contents along `axis`, reconciling the other axes to the first
    /// content. `None` for an empty list.
    pub fn concatenate(contents: &[Content<V>], axis: usize) -> Option<Self> {
        let first = contents.first()?;
        if axis >= MAX_RANK {
            return None;
        }
        let base = first.extent();
        let parts: Vec<Array4<V>> = contents
            .iter()
            .map(|content| {
                let target = base.with_axis(axis, content.extent().axis(axis));
                if content.extent() == target {
                    content.data.clone()
                } else {
                    warn!("reconciling content '{}' to {} for concatenation", content.name, target);
                    content.resize(target).data
                }
            })
            .collect();
        let views: Vec<_> = parts.iter().map(|part| part.view()).collect();
        let data = ndarray::concatenate(array_axis(axis), &views).ok()?;
        let channels = contents.iter().map(|c| c.channels).max().unwrap_or(first.channels);
        Some(Content { name: first.name.clone(), channels, data })
    }

    /// Write into `layer`, reconciled to the layer's extent
    pub fn write_to(&self, layer: &mut ConvLayer<V>) {
        let extent = layer.extent();
        let values = if extent == self.extent() {
            self.values()
        } else {
            warn!(
                "reconciling content '{}' ({}) to layer {} ({})",
                self.name,
                self.extent(),
                layer.id(),
                extent
            );
            self.resize(extent).values()
        };
        layer.set_data(&values, None);
    }
}

impl<V: NeuronValue> ConvLayer<V> {
    /// Snapshot this layer's output values as a named content
    pub fn content<S: Into<String>>(&self, name: S) -> Content<V> {
        Content::from_layer(name, self)
    }

    /// Overwrite this layer's values from `content`
    pub fn set_content(&mut self, content: &Content<V>) {
        content.write_to(self);
    }
}
