//! Singly linked chains of convolutional layers
//!
//! A [`ConvChain`] owns its layers in an index-addressed arena. Each slot
//! records the index of its previous and next layer, so rewiring never
//! touches the layers themselves and a detached layer stays valid in place.
//! The filter installed on a layer computes its *next* layer.

use log::debug;

use crate::activations::Activation;
use crate::config::{ChainConfig, LearningConfig};
use crate::error::{ConvError, Result};
use crate::filter::Filter;
use crate::geometry::Region;
use crate::layers::{ConvLayer, IdSource};
use crate::learning::LearnedFilter;
use crate::propagation::{forward, Propagation};
use crate::region::{region_to_next, region_to_prev};
use crate::value::NeuronValue;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Arena of layers linked into a chain
#[derive(Clone, Debug)]
pub struct ConvChain<V> {
    layers: Vec<ConvLayer<V>>,
    links: Vec<Link>,
    head: Option<usize>,
    ids: IdSource,
}

impl<V: NeuronValue> Default for ConvChain<V> {
    fn default() -> Self {
        ConvChain::new()
    }
}

impl<V: NeuronValue> ConvChain<V> {
    pub fn new() -> Self {
        ConvChain {
            layers: Vec::new(),
            links: Vec::new(),
            head: None,
            ids: IdSource::new(),
        }
    }

    /// Identifier source shared by every layer of this chain
    pub fn ids(&self) -> &IdSource {
        &self.ids
    }

    /// Number of layers in the arena, linked or not
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&ConvLayer<V>> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut ConvLayer<V>> {
        self.layers.get_mut(index)
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn prev(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.prev
    }

    pub fn next(&self, index: usize) -> Option<usize> {
        self.links.get(index)?.next
    }

    /// Last layer reachable from the head
    pub fn tail(&self) -> Option<usize> {
        self.order().last().copied()
    }

    /// Layer indices from the head to the tail
    pub fn order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut current = self.head;
        while let Some(index) = current {
            if order.contains(&index) {
                break;
            }
            order.push(index);
            current = self.next(index);
        }
        order
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(ConvError::MissingLayer(index))
        }
    }

    /// Add a layer to the arena without linking it
    pub fn add(&mut self, layer: ConvLayer<V>) -> usize {
        let layer = layer.with_id_source(&self.ids);
        self.layers.push(layer);
        self.links.push(Link::default());
        self.layers.len() - 1
    }

    /// Append a layer after the current tail
    pub fn push(&mut self, layer: ConvLayer<V>) -> usize {
        let tail = self.tail();
        let index = self.add(layer);
        match tail {
            Some(tail) => self.link(tail, index),
            None => self.head = Some(index),
        }
        index
    }

    /// Append a layer sized by the tail's filter output extent.
    ///
    /// `None` when the chain is empty or the tail has no filter.
    pub fn push_derived(&mut self, activation: Option<Activation>) -> Option<usize> {
        let tail = self.layer(self.tail()?)?;
        let filter = tail.filter()?;
        let extent = filter.output_extent(&tail.extent());
        let rank = tail.rank().max(extent.rank());
        let layer = ConvLayer::new(tail.channels(), rank, extent, activation);
        Some(self.push(layer))
    }

    /// Insert a layer directly after `index`
    pub fn insert_after(&mut self, index: usize, layer: ConvLayer<V>) -> Result<usize> {
        self.check(index)?;
        let next = self.next(index);
        let inserted = self.add(layer);
        self.link(index, inserted);
        if let Some(next) = next {
            self.link(inserted, next);
        }
        Ok(inserted)
    }

    /// Make `to` the next layer of `from`.
    ///
    /// Any previous successor of `from` and predecessor of `to` are unlinked.
    /// Linking that would close a cycle is rejected.
    pub fn connect(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Err(ConvError::invalid_parameter("to", "a layer cannot follow itself"));
        }
        if self.reaches(to, from) {
            return Err(ConvError::InvalidParameter {
                name: "to".to_string(),
                reason: format!("layer {} already leads to layer {}", to, from),
            });
        }
        if let Some(old) = self.links[from].next {
            self.links[old].prev = None;
        }
        if let Some(old) = self.links[to].prev {
            self.links[old].next = None;
        }
        self.link(from, to);
        if self.head.is_none() || self.head == Some(to) {
            self.head = Some(from);
        }
        Ok(())
    }

    /// Whether walking forward from `start` arrives at `target`
    fn reaches(&self, start: usize, target: usize) -> bool {
        let mut current = Some(start);
        for _ in 0..self.links.len() {
            match current {
                Some(index) if index == target => return true,
                Some(index) => current = self.next(index),
                None => return false,
            }
        }
        false
    }

    fn link(&mut self, from: usize, to: usize) {
        self.links[from].next = Some(to);
        self.links[to].prev = Some(from);
    }

    /// Unlink a layer from both neighbours, joining them to each other.
    ///
    /// The layer stays in the arena at the same index.
    pub fn detach(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        let Link { prev, next } = self.links[index];
        match (prev, next) {
            (Some(prev), Some(next)) => self.link(prev, next),
            (Some(prev), None) => self.links[prev].next = None,
            (None, Some(next)) => self.links[next].prev = None,
            (None, None) => {}
        }
        if self.head == Some(index) {
            self.head = next;
        }
        self.links[index] = Link::default();
        Ok(())
    }

    /// Exchange the positions of two layers in the chain
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.check(a)?;
        self.check(b)?;
        self.layers.swap(a, b);
        Ok(())
    }

    /// Drop every layer
    pub fn reset(&mut self) {
        debug!("resetting chain of {} layers", self.layers.len());
        self.layers.clear();
        self.links.clear();
        self.head = None;
    }

    /// Shared source and mutable destination
    fn pair_mut(&mut self, source: usize, dest: usize) -> Option<(&ConvLayer<V>, &mut ConvLayer<V>)> {
        if source == dest || source >= self.layers.len() || dest >= self.layers.len() {
            return None;
        }
        if source < dest {
            let (left, right) = self.layers.split_at_mut(dest);
            Some((&left[source], &mut right[0]))
        } else {
            let (left, right) = self.layers.split_at_mut(source);
            Some((&right[0], &mut left[dest]))
        }
    }

    /// Propagate layer `index` into its next layer with its installed filter.
    ///
    /// `None` when the layer has no next layer or no filter.
    pub fn forward(
        &mut self,
        index: usize,
        source_region: Option<&Region>,
        dest_region: Option<&Region>,
        in_place: bool,
    ) -> Option<Propagation<'_, V>> {
        let next = self.next(index)?;
        let (source, dest) = self.pair_mut(index, next)?;
        forward(source, dest, source.filter(), source_region, dest_region, in_place)
    }

    /// Propagate with an explicit filter instead of the installed one
    pub fn forward_with(
        &mut self,
        index: usize,
        filter: &Filter<V>,
        source_region: Option<&Region>,
        dest_region: Option<&Region>,
        in_place: bool,
    ) -> Option<Propagation<'_, V>> {
        let next = self.next(index)?;
        let (source, dest) = self.pair_mut(index, next)?;
        forward(source, dest, Some(filter), source_region, dest_region, in_place)
    }

    /// Propagate in place from the head to the tail.
    ///
    /// Returns the index of the last layer written, or `None` when some layer
    /// before the tail has no filter.
    pub fn forward_all(&mut self) -> Option<usize> {
        let order = self.order();
        for pair in order.windows(2) {
            self.forward(pair[0], None, None, true)?;
        }
        order.last().copied()
    }

    /// Map a region of layer `index` onto its next layer
    pub fn region_to_next(&self, index: usize, region: &Region) -> Option<Region> {
        let next = self.next(index)?;
        region_to_next(self.layer(index)?, region, self.layer(next)?)
    }

    /// Map a region of layer `index` onto its previous layer
    pub fn region_to_prev(&self, index: usize, region: &Region) -> Option<Region> {
        let prev = self.prev(index)?;
        region_to_prev(self.layer(index)?, region, self.layer(prev)?)
    }

    /// Learn a filter between layer `index` and its next layer
    pub fn learn_filter(
        &self,
        index: usize,
        config: &LearningConfig,
        initial: Option<&LearnedFilter<V>>,
    ) -> Option<LearnedFilter<V>> {
        let next = self.next(index)?;
        self.layer(index)?.learn_filter(self.layer(next)?, config, initial)
    }

    /// Install a filter learned by [`ConvChain::learn_filter`] on whichever
    /// of layer `index` and its next layer was the large one
    pub fn install_learned(&mut self, index: usize, learned: LearnedFilter<V>) -> Result<Option<Filter<V>>> {
        self.check(index)?;
        let target = if learned.this_is_large {
            index
        } else {
            self.next(index).ok_or(ConvError::MissingLayer(index + 1))?
        };
        Ok(self.layers[target].install(learned))
    }
}

impl ConvChain<f32> {
    /// Build a linked chain from a configuration
    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        let mut chain = ConvChain::new();
        for layer in &config.layers {
            let built = layer.build(&chain.ids)?;
            chain.push(built);
        }
        Ok(chain)
    }
}
