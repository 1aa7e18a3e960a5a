//! N-dimensional convolutional layer
//!
//! A [`ConvLayer`] owns a buffer of neurons laid out over up to four axes,
//! plus the filter and bias used to compute the *next* layer of a chain.
//! Each neuron keeps both its pre-activation input and its output value.

use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::activations::Activation;
use crate::filter::Filter;
use crate::geometry::{nd_index, view_region, Coord, Extent, Rank, Region, MAX_RANK};
use crate::value::NeuronValue;

/// Pre-activation input and activated output of one neuron
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neuron<V> {
    pub input: V,
    pub output: V,
}

impl<V: NeuronValue> Neuron<V> {
    pub fn zero(channels: usize) -> Self {
        Neuron { input: V::zero(channels), output: V::zero(channels) }
    }

    /// A neuron whose input and output are both `value`
    pub fn settled(value: V) -> Self {
        Neuron { input: value.clone(), output: value }
    }
}

/// Monotonically increasing identifiers shared by every layer of a network.
///
/// Identifiers are only used in diagnostics.
#[derive(Clone, Debug, Default)]
pub struct IdSource(Arc<AtomicUsize>);

impl IdSource {
    pub fn new() -> Self {
        IdSource::default()
    }

    pub fn next_id(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// A rank 1-4 convolutional layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvLayer<V> {
    #[serde(skip)]
    id: usize,
    channels: usize,
    rank: Rank,
    /// Neurons, shape `(time, depth, height, width)`
    neurons: Array4<Neuron<V>>,
    bias: Option<V>,
    filter: Option<Filter<V>>,
    activation: Option<Activation>,
    pad_zero: bool,
}

impl<V: NeuronValue> ConvLayer<V> {
    /// Create a zeroed layer with exactly the given activation.
    ///
    /// `channels` below one is coerced to one and extents above `rank` are
    /// collapsed to one. `None` leaves the layer without an activation, so a
    /// forward pass into it falls back to the source layer's activation; use
    /// [`ConvLayer::with_default_activation`] for the canonical default.
    pub fn new(channels: usize, rank: Rank, extent: Extent, activation: Option<Activation>) -> Self {
        let channels = channels.max(1);
        let extent = extent.truncate(rank);
        ConvLayer {
            id: 0,
            channels,
            rank,
            neurons: Array4::from_elem(extent.shape(), Neuron::zero(channels)),
            bias: None,
            filter: None,
            activation,
            pad_zero: false,
        }
    }

    /// Create a zeroed layer, substituting the canonical activation for the
    /// channel count when `activation` is `None`
    pub fn with_default_activation(channels: usize, rank: Rank, extent: Extent, activation: Option<Activation>) -> Self {
        let channels = channels.max(1);
        let activation = activation.unwrap_or_else(|| Activation::canonical(channels));
        ConvLayer::new(channels, rank, extent, Some(activation))
    }

    /// Draw this layer's diagnostic identifier from a shared source
    pub fn with_id_source(mut self, ids: &IdSource) -> Self {
        self.id = ids.next_id();
        self
    }

    pub fn with_filter(mut self, filter: Filter<V>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_bias(mut self, bias: V) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn with_pad_zero(mut self, pad_zero: bool) -> Self {
        self.pad_zero = pad_zero;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn extent(&self) -> Extent {
        Extent::from_shape(self.neurons.shape())
    }

    pub fn width(&self) -> usize {
        self.extent().width
    }

    pub fn height(&self) -> usize {
        self.extent().height
    }

    pub fn depth(&self) -> usize {
        self.extent().depth
    }

    pub fn time(&self) -> usize {
        self.extent().time
    }

    /// Number of neurons
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    /// A layer always holds at least one neuron
    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn neurons(&self) -> &Array4<Neuron<V>> {
        &self.neurons
    }

    pub fn neurons_mut(&mut self) -> &mut Array4<Neuron<V>> {
        &mut self.neurons
    }

    pub fn neuron(&self, coord: &Coord) -> Option<&Neuron<V>> {
        self.neurons.get(nd_index(coord))
    }

    /// Output value at `coord`, `None` outside the layer
    pub fn get(&self, coord: &Coord) -> Option<&V> {
        self.neuron(coord).map(|n| &n.output)
    }

    /// Pre-activation input at `coord`
    pub fn input_at(&self, coord: &Coord) -> Option<&V> {
        self.neuron(coord).map(|n| &n.input)
    }

    /// Output value by width-fastest linear index
    pub fn get_linear(&self, index: usize) -> Option<&V> {
        if index >= self.len() {
            return None;
        }
        self.get(&self.extent().coord_of(index))
    }

    /// Set input and output of the neuron at `coord`; `false` when out of bounds
    pub fn set(&mut self, coord: &Coord, value: V) -> bool {
        self.set_neuron(coord, Neuron::settled(value))
    }

    pub fn set_neuron(&mut self, coord: &Coord, neuron: Neuron<V>) -> bool {
        match self.neurons.get_mut(nd_index(coord)) {
            Some(slot) => {
                *slot = neuron;
                true
            }
            None => false,
        }
    }

    /// Every output value in width-fastest order
    pub fn outputs(&self) -> Vec<V> {
        self.neurons.iter().map(|n| n.output.clone()).collect()
    }

    /// Every pre-activation input in width-fastest order
    pub fn inputs(&self) -> Vec<V> {
        self.neurons.iter().map(|n| n.input.clone()).collect()
    }

    /// Non-owning view of the neurons inside `region`, clamped to the layer
    pub fn view(&self, region: &Region) -> Option<ArrayView4<'_, Neuron<V>>> {
        let clamped = region.clamp_to(&self.extent())?;
        Some(view_region(&self.neurons, &clamped))
    }

    /// Output values inside `region` (the whole layer for `None`).
    ///
    /// An out-of-bounds region is clamped to the valid intersection; a region
    /// entirely outside the layer yields `None`.
    pub fn get_data(&self, region: Option<&Region>) -> Option<Vec<V>> {
        let region = region.copied().unwrap_or_else(|| Region::full(self.extent()));
        let view = self.view(&region)?;
        Some(view.iter().map(|n| n.output.clone()).collect())
    }

    /// Write `data` into `region` (the whole layer for `None`).
    ///
    /// `data` is laid out width-fastest over the requested region; entries
    /// that clamp outside the layer are skipped, as are missing trailing
    /// entries. Returns the clamped region actually addressed.
    pub fn set_data(&mut self, data: &[V], region: Option<&Region>) -> Option<Region> {
        let region = region.copied().unwrap_or_else(|| Region::full(self.extent()));
        let clamped = region.clamp_to(&self.extent())?;
        for coord in clamped.coords() {
            let mut local = [0; MAX_RANK];
            for axis in 0..MAX_RANK {
                local[axis] = coord[axis] - region.origin[axis];
            }
            if let Some(value) = data.get(region.extent.linear_index(&local)) {
                self.neurons[nd_index(&coord)] = Neuron::settled(value.clone());
            }
        }
        Some(clamped)
    }

    /// Reset every neuron to the additive identity
    pub fn clear(&mut self) {
        self.neurons.fill(Neuron::zero(self.channels));
    }

    /// Reallocate with a new extent, copying the overlap and zero-padding the rest
    pub fn resize(&mut self, extent: Extent) {
        let extent = extent.truncate(self.rank);
        if extent == self.extent() {
            return;
        }
        let mut resized = Array4::from_elem(extent.shape(), Neuron::zero(self.channels));
        if let Some(overlap) = Region::full(self.extent()).clamp_to(&extent) {
            for coord in overlap.coords() {
                resized[nd_index(&coord)] = self.neurons[nd_index(&coord)].clone();
            }
        }
        self.neurons = resized;
    }

    pub fn bias(&self) -> Option<&V> {
        self.bias.as_ref()
    }

    pub fn set_bias(&mut self, bias: Option<V>) {
        self.bias = bias;
    }

    /// Filter used to compute the next layer
    pub fn filter(&self) -> Option<&Filter<V>> {
        self.filter.as_ref()
    }

    pub fn filter_mut(&mut self) -> Option<&mut Filter<V>> {
        self.filter.as_mut()
    }

    /// Replace the filter, returning the previous one
    pub fn set_filter(&mut self, filter: Option<Filter<V>>) -> Option<Filter<V>> {
        std::mem::replace(&mut self.filter, filter)
    }

    pub fn activation(&self) -> Option<Activation> {
        self.activation
    }

    pub fn set_activation(&mut self, activation: Option<Activation>) {
        self.activation = activation;
    }

    pub fn pad_zero(&self) -> bool {
        self.pad_zero
    }

    pub fn set_pad_zero(&mut self, pad_zero: bool) {
        self.pad_zero = pad_zero;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_length_matches_extents() {
        let layer = ConvLayer::<f32>::new(0, Rank::Three, Extent::new(3, 2, 4, 5), None);
        assert_eq!(layer.channels(), 1);
        // time collapses to one for a rank-3 layer
        assert_eq!(layer.extent(), Extent::volume(3, 2, 4));
        assert_eq!(layer.len(), 24);
    }

    #[test]
    fn test_set_and_get_by_coordinate() {
        let mut layer = ConvLayer::<f32>::new(1, Rank::Two, Extent::plane(3, 3), None);
        assert!(layer.set(&[2, 1, 0, 0], 7.0));
        assert!(!layer.set(&[3, 0, 0, 0], 1.0));
        assert_eq!(layer.get(&[2, 1, 0, 0]), Some(&7.0));
        assert_eq!(layer.get_linear(5), Some(&7.0));
        assert_eq!(layer.get(&[0, 3, 0, 0]), None);
    }

    #[test]
    fn test_region_data_clamped() {
        let mut layer = ConvLayer::<f32>::new(1, Rank::Two, Extent::plane(4, 4), None);
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        layer.set_data(&values, None);

        let region = Region::new([2, 2, 0, 0], Extent::plane(5, 5));
        assert_eq!(layer.get_data(Some(&region)), Some(vec![10.0, 11.0, 14.0, 15.0]));

        let outside = Region::new([9, 0, 0, 0], Extent::plane(2, 2));
        assert_eq!(layer.get_data(Some(&outside)), None);
        assert_eq!(layer.set_data(&[1.0], Some(&outside)), None);
    }

    #[test]
    fn test_set_data_into_region() {
        let mut layer = ConvLayer::<f32>::new(1, Rank::Two, Extent::plane(3, 3), None);
        let region = Region::new([1, 1, 0, 0], Extent::plane(3, 2));
        let written = layer.set_data(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Some(&region)).unwrap();
        assert_eq!(written.extent, Extent::plane(2, 2));
        assert_eq!(layer.outputs(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 4.0, 5.0]);
    }

    #[test]
    fn test_resize_pads_and_truncates() {
        let mut layer = ConvLayer::<f32>::new(1, Rank::Two, Extent::plane(2, 2), None);
        layer.set_data(&[1.0, 2.0, 3.0, 4.0], None);
        layer.resize(Extent::plane(3, 1));
        assert_eq!(layer.outputs(), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_ids_are_shared_and_increasing() {
        let ids = IdSource::new();
        let a = ConvLayer::<f32>::new(1, Rank::One, Extent::line(2), None).with_id_source(&ids);
        let b = ConvLayer::<f32>::new(1, Rank::One, Extent::line(2), None).with_id_source(&ids);
        assert!(b.id() > a.id());
    }
}
