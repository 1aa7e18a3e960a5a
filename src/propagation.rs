//! Forward propagation through a convolution filter
//!
//! [`forward`] computes every destination neuron from the source layer: the
//! destination coordinate is mapped onto a source anchor with
//! [`Filter::anchor`], the filter is evaluated there, the source bias is added
//! to form the neuron's input, and the destination activation (or the
//! source's, when the destination has none) produces its output.
//!
//! A pass can be restricted to a region of either layer. Only one restriction
//! is honoured per call; when both are given the source region wins and the
//! destination region is ignored.

use log::{debug, warn};
use ndarray::{Array4, ArrayView4, CowArray, Ix4};

use crate::activations::Activation;
use crate::filter::{Filter, FilterKind};
use crate::geometry::{nd_index, view_region, Coord, Extent, Region};
use crate::layers::{ConvLayer, Neuron};
use crate::region::map_forward;
use crate::value::NeuronValue;

/// Destination neurons written by a forward pass.
///
/// An in-place pass borrows the destination buffer; a detached pass owns a
/// copy and leaves the destination untouched.
#[derive(Debug, Clone)]
pub struct Propagation<'a, V> {
    region: Region,
    neurons: CowArray<'a, Neuron<V>, Ix4>,
}

impl<'a, V: NeuronValue> Propagation<'a, V> {
    /// The destination region covered by this result
    pub fn region(&self) -> Region {
        self.region
    }

    /// Whether the result is a view over the destination layer
    pub fn is_in_place(&self) -> bool {
        self.neurons.is_view()
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn neurons(&self) -> ArrayView4<'_, Neuron<V>> {
        self.neurons.view()
    }

    /// Output value at a coordinate relative to the region origin
    pub fn get(&self, local: &Coord) -> Option<&V> {
        self.neurons.get(nd_index(local)).map(|n| &n.output)
    }

    /// Output values in width-fastest order
    pub fn outputs(&self) -> Vec<V> {
        self.neurons.iter().map(|n| n.output.clone()).collect()
    }

    /// Pre-activation inputs in width-fastest order
    pub fn inputs(&self) -> Vec<V> {
        self.neurons.iter().map(|n| n.input.clone()).collect()
    }
}

/// The single region restriction honoured by a pass
#[derive(Debug, Clone, Copy, PartialEq)]
enum Restriction {
    Unrestricted,
    Source(Region),
    Destination(Region),
}

impl Restriction {
    fn resolve(
        source: &Extent,
        dest: &Extent,
        source_region: Option<&Region>,
        dest_region: Option<&Region>,
    ) -> Self {
        if let Some(region) = source_region {
            if dest_region.is_some() {
                warn!("both source and destination regions supplied; ignoring destination region");
            }
            return region
                .clamp_to(source)
                .map_or(Restriction::Unrestricted, Restriction::Source);
        }
        dest_region
            .and_then(|region| region.clamp_to(dest))
            .map_or(Restriction::Unrestricted, Restriction::Destination)
    }

    fn touched<V: NeuronValue>(&self, filter: &Filter<V>, dest: &Extent) -> Region {
        match self {
            Restriction::Unrestricted => Region::full(*dest),
            Restriction::Destination(region) => *region,
            Restriction::Source(region) => {
                map_forward(region, filter, dest).unwrap_or_else(|| Region::full(*dest))
            }
        }
    }
}

/// Propagate `source` into `dest` through `filter`.
///
/// Returns the written destination neurons, limited to the touched region
/// when a restriction is supplied, or `None` when no filter is given. With
/// `in_place` unset the destination is left untouched and the result owns the
/// computed values.
///
/// Coordinates outside the returned region are not visited.
/// A destination coordinate whose anchor falls outside the source, or whose
/// filter evaluation reaches no source neuron, is set to zero.
pub fn forward<'a, V: NeuronValue>(
    source: &ConvLayer<V>,
    dest: &'a mut ConvLayer<V>,
    filter: Option<&Filter<V>>,
    source_region: Option<&Region>,
    dest_region: Option<&Region>,
    in_place: bool,
) -> Option<Propagation<'a, V>> {
    let filter = filter?;
    let dest_extent = dest.extent();
    let restriction = Restriction::resolve(&source.extent(), &dest_extent, source_region, dest_region);
    let touched = restriction.touched(filter, &dest_extent);
    let activation = dest.activation().or(source.activation());
    let channels = dest.channels();

    debug!(
        "forward layer {} -> {}: {:?} filter, restriction {:?}, touched {}",
        source.id(),
        dest.id(),
        filter.kind(),
        restriction,
        touched
    );

    if in_place {
        propagate(source, filter, &restriction, &touched, activation, channels, dest.neurons_mut());
        let dest: &'a ConvLayer<V> = dest;
        let view = view_region(dest.neurons(), &touched);
        Some(Propagation { region: touched, neurons: CowArray::from(view) })
    } else {
        let mut neurons = dest.neurons().clone();
        propagate(source, filter, &restriction, &touched, activation, channels, &mut neurons);
        let owned = view_region(&neurons, &touched).to_owned();
        Some(Propagation { region: touched, neurons: CowArray::from(owned) })
    }
}

fn propagate<V: NeuronValue>(
    source: &ConvLayer<V>,
    filter: &Filter<V>,
    restriction: &Restriction,
    touched: &Region,
    activation: Option<Activation>,
    channels: usize,
    neurons: &mut Array4<Neuron<V>>,
) {
    let source_extent = source.extent();

    // block clamping can fold coordinates beyond the touched region onto
    // anchors inside a source region; those are never written
    for dest in touched.coords() {
        let anchor = filter.anchor(&dest, &source_extent, source.pad_zero());
        let slot = &mut neurons[nd_index(&dest)];
        if !source_extent.contains(&anchor) {
            *slot = Neuron::zero(channels);
            continue;
        }
        if let Restriction::Source(region) = restriction {
            if !region.contains(&anchor) {
                continue;
            }
        }

        let value = match filter.kind() {
            FilterKind::TransposeWithConv => filter.apply_transposed(&dest, source),
            FilterKind::Product | FilterKind::Transpose => filter.apply(&anchor, source),
        };
        let Some(value) = value else {
            *slot = Neuron::zero(channels);
            continue;
        };

        let input = match source.bias() {
            Some(bias) => value.add(bias),
            None => value,
        };
        let output = match activation {
            Some(activation) => input.evaluate(&activation),
            None => input.clone(),
        };
        *slot = Neuron { input, output };
    }
}
