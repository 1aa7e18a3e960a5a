use ndarray::Array4;

use crate::activations::Activation;
use crate::error::{ConvError, Result};
use crate::filter::{Filter, FilterKind};
use crate::geometry::{Extent, Rank, MAX_RANK};
use crate::layers::initialization::WeightInit;
use crate::layers::{ConvLayer, IdSource};
use crate::value::NeuronValue;

/// Builder for ConvLayer
pub struct ConvLayerBuilder<V> {
    channels: usize,
    rank: Option<Rank>,
    extent: Option<Extent>,
    activation: Option<Activation>,
    identity_output: bool,
    pad_zero: bool,
    bias: Option<V>,
    filter: Option<Filter<V>>,
    ids: Option<IdSource>,
}

impl<V: NeuronValue> ConvLayerBuilder<V> {
    /// Create a new layer builder
    pub fn new() -> Self {
        ConvLayerBuilder {
            channels: 1,
            rank: None,
            extent: None,
            activation: None,
            identity_output: false,
            pad_zero: false,
            bias: None,
            filter: None,
            ids: None,
        }
    }

    /// Set the channel count of every neuron
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Set the rank; inferred from the extent when unset
    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn width(self, width: usize) -> Self {
        self.extent_axis(0, width)
    }

    pub fn height(self, height: usize) -> Self {
        self.extent_axis(1, height)
    }

    pub fn depth(self, depth: usize) -> Self {
        self.extent_axis(2, depth)
    }

    pub fn time(self, time: usize) -> Self {
        self.extent_axis(3, time)
    }

    fn extent_axis(mut self, axis: usize, len: usize) -> Self {
        self.extent = Some(self.extent.unwrap_or_default().with_axis(axis, len));
        self
    }

    /// Set activation function; defaults to the canonical activation for the
    /// channel count
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = Some(activation);
        self.identity_output = false;
        self
    }

    /// Build a layer without activation; forward passes into it fall back to
    /// the source layer's activation
    pub fn without_activation(mut self) -> Self {
        self.activation = None;
        self.identity_output = true;
        self
    }

    pub fn pad_zero(mut self, pad_zero: bool) -> Self {
        self.pad_zero = pad_zero;
        self
    }

    pub fn bias(mut self, bias: V) -> Self {
        self.bias = Some(bias);
        self
    }

    /// Filter used to compute the next layer
    pub fn filter(mut self, filter: Filter<V>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Draw the layer identifier from a source shared by a whole chain
    pub fn id_source(mut self, ids: &IdSource) -> Self {
        self.ids = Some(ids.clone());
        self
    }

    /// Build the layer
    pub fn build(self) -> Result<ConvLayer<V>> {
        let extent = self.extent.ok_or_else(|| {
            ConvError::invalid_parameter("extent", "Layer extent not specified")
        })?;

        let rank = self.rank.unwrap_or_else(|| extent.rank());
        if extent.rank() > rank {
            return Err(ConvError::dimension_mismatch(
                format!("extent of rank {} or lower", rank),
                format!("{} (rank {})", extent, extent.rank()),
            ));
        }

        if let Some(filter) = &self.filter {
            if filter.rank() > rank {
                return Err(ConvError::InvalidParameter {
                    name: "filter".to_string(),
                    reason: format!("filter rank {} exceeds layer rank {}", filter.rank(), rank),
                });
            }
        }

        let layer = if self.identity_output {
            ConvLayer::new(self.channels, rank, extent, None)
        } else {
            ConvLayer::with_default_activation(self.channels, rank, extent, self.activation)
        };
        let mut layer = layer.with_pad_zero(self.pad_zero);
        if let Some(ids) = &self.ids {
            layer = layer.with_id_source(ids);
        }
        if let Some(bias) = self.bias {
            layer = layer.with_bias(bias);
        }
        if let Some(filter) = self.filter {
            layer = layer.with_filter(filter);
        }
        Ok(layer)
    }
}

impl<V: NeuronValue> Default for ConvLayerBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for Filter
pub struct FilterBuilder<V> {
    kind: FilterKind,
    rank: Option<Rank>,
    stride: [usize; MAX_RANK],
    kernel_extent: Option<Extent>,
    kernel: Option<Array4<V>>,
    weight: Option<V>,
    slide_by_one: bool,
    weight_init: WeightInit,
    channels: usize,
}

impl<V: NeuronValue> FilterBuilder<V> {
    /// Create a new filter builder
    pub fn new() -> Self {
        FilterBuilder {
            kind: FilterKind::Product,
            rank: None,
            stride: [1; MAX_RANK],
            kernel_extent: None,
            kernel: None,
            weight: None,
            slide_by_one: false,
            weight_init: WeightInit::XavierUniform,
            channels: 1,
        }
    }

    pub fn kind(mut self, kind: FilterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the rank; inferred from an explicit kernel when unset
    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Same stride on every axis
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = [stride; MAX_RANK];
        self
    }

    /// Stride per axis, ordered width, height, depth, time
    pub fn strides(mut self, stride: [usize; MAX_RANK]) -> Self {
        self.stride = stride;
        self
    }

    /// Same kernel extent on every axis of the filter rank; defaults to the stride
    pub fn kernel_extent(mut self, n: usize) -> Self {
        self.kernel_extent = Some(Extent::from_array([n; MAX_RANK]));
        self
    }

    pub fn kernel_extents(mut self, extent: Extent) -> Self {
        self.kernel_extent = Some(extent);
        self
    }

    /// Explicit kernel values, shape `(time, depth, height, width)`
    pub fn kernel(mut self, kernel: Array4<V>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Scale applied to the kernel sum; defaults to the unit value
    pub fn weight(mut self, weight: V) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn slide_by_one(mut self, slide_by_one: bool) -> Self {
        self.slide_by_one = slide_by_one;
        self
    }

    /// Set kernel initialization, used when no explicit kernel is given
    pub fn weight_init(mut self, init: WeightInit) -> Self {
        self.weight_init = init;
        self
    }

    /// Channel count of generated kernel values and the default weight
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Build the filter
    pub fn build(self) -> Result<Filter<V>> {
        let rank = match (self.rank, &self.kernel) {
            (Some(rank), _) => rank,
            (None, Some(kernel)) => Extent::from_shape(kernel.shape()).rank(),
            (None, None) => {
                return Err(ConvError::invalid_parameter("rank", "Filter rank not specified"));
            }
        };

        for axis in 0..rank.axes() {
            if self.stride[axis] == 0 {
                return Err(ConvError::InvalidParameter {
                    name: "stride".to_string(),
                    reason: format!("stride along axis {} must be at least 1", axis),
                });
            }
        }

        let mut default_extent = [1; MAX_RANK];
        for axis in 0..rank.axes() {
            default_extent[axis] = self
                .kernel_extent
                .map_or(self.stride[axis], |extent| extent.axis(axis));
        }
        let expected = Extent::from_array(default_extent);

        let kernel = match self.kernel {
            Some(kernel) => {
                let actual = Extent::from_shape(kernel.shape());
                if actual.rank() > rank || (self.kernel_extent.is_some() && actual != expected) {
                    return Err(ConvError::dimension_mismatch(
                        format!("kernel extent {}", expected),
                        format!("{}", actual),
                    ));
                }
                kernel
            }
            None => {
                let taps = expected.count();
                let channels = self.channels;
                self.weight_init
                    .initialize_kernel(expected, taps * channels, channels)
                    .map(|&w| V::splat(w, channels))
            }
        };

        let weight = self.weight.unwrap_or_else(|| V::unit(self.channels));
        Ok(Filter::new(self.kind, rank, kernel, weight, self.stride, self.slide_by_one))
    }
}

impl<V: NeuronValue> Default for FilterBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_builder_defaults() {
        let layer: ConvLayer<f32> = ConvLayerBuilder::new().width(4).height(3).build().unwrap();
        assert_eq!(layer.rank(), Rank::Two);
        assert_eq!(layer.extent(), Extent::plane(4, 3));
        assert_eq!(layer.activation(), Some(Activation::Sigmoid));
        assert!(layer.filter().is_none());
    }

    #[test]
    fn test_layer_builder_requires_extent() {
        let result: Result<ConvLayer<f32>> = ConvLayerBuilder::new().channels(2).build();
        assert!(matches!(result, Err(ConvError::InvalidParameter { .. })));
    }

    #[test]
    fn test_layer_builder_rejects_extent_above_rank() {
        let result: Result<ConvLayer<f32>> = ConvLayerBuilder::new()
            .rank(Rank::One)
            .extent(Extent::plane(3, 3))
            .build();
        assert!(matches!(result, Err(ConvError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_filter_builder_generates_kernel_from_stride() {
        let filter: Filter<f32> = FilterBuilder::new()
            .rank(Rank::Two)
            .stride(2)
            .weight_init(WeightInit::Ones)
            .build()
            .unwrap();
        assert_eq!(filter.kernel_extent(), Extent::plane(2, 2));
        assert_eq!(filter.strides(), [2, 2, 1, 1]);
        assert!(filter.kernel().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_filter_builder_rejects_zero_stride() {
        let result: Result<Filter<f32>> = FilterBuilder::new().rank(Rank::One).stride(0).build();
        assert!(matches!(result, Err(ConvError::InvalidParameter { .. })));
    }

    #[test]
    fn test_filter_builder_kernel_mismatch() {
        let result: Result<Filter<f32>> = FilterBuilder::new()
            .rank(Rank::One)
            .kernel_extent(3)
            .kernel(Array4::zeros((1, 1, 1, 2)))
            .build();
        assert!(matches!(result, Err(ConvError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_filter_rank_above_layer_rank() {
        let filter: Filter<f32> = FilterBuilder::new().rank(Rank::Three).build().unwrap();
        let result = ConvLayerBuilder::new().width(4).filter(filter).build();
        assert!(result.is_err());
    }
}
