//! Exact per-coordinate derivatives of a product filter
//!
//! For a destination neuron `d` with source anchor `s`, the filter output is
//! `weight * Σ kernel[k] * source[s + k]`. These maps give the partial
//! derivatives of that output with respect to every kernel tap and every
//! contributing source value, laid out in kernel shape.
//!
//! Only ranks two and above are available. The rank-1 maps are not
//! implemented and panic; callers needing rank-1 kernels go through the
//! iterative learner in [`crate::learning`].

use ndarray::Array4;

use super::Filter;
use crate::geometry::{nd_index, offset, Coord, Rank};
use crate::layers::ConvLayer;
use crate::value::NeuronValue;

impl<V: NeuronValue> Filter<V> {
    /// Partial derivatives of the output at `dest` with respect to each tap.
    ///
    /// Entry `k` is `weight * source[s + k]`, or zero where the tap falls
    /// outside the source.
    ///
    /// # Panics
    ///
    /// Always panics for rank-1 filters.
    pub fn d_kernel(&self, dest: &Coord, source: &ConvLayer<V>) -> Array4<V> {
        if self.rank() == Rank::One {
            unimplemented!("exact kernel derivative is not available for rank-1 filters");
        }
        let anchor = self.anchor(dest, &source.extent(), source.pad_zero());
        let channels = source.channels();
        let mut grads = Array4::from_elem(self.kernel().raw_dim(), V::zero(channels));
        for tap in self.kernel_extent().coords() {
            if let Some(x) = source.get(&offset(&anchor, &tap)) {
                grads[nd_index(&tap)] = self.weight().multiply(x);
            }
        }
        grads
    }

    /// Partial derivatives of the output at `dest` with respect to each
    /// contributing source value, indexed by tap.
    ///
    /// Entry `k` is `weight * kernel[k]` when `s + k` lies in the source,
    /// zero otherwise.
    ///
    /// # Panics
    ///
    /// Always panics for rank-1 filters.
    pub fn d_value(&self, dest: &Coord, source: &ConvLayer<V>) -> Array4<V> {
        if self.rank() == Rank::One {
            unimplemented!("exact value derivative is not available for rank-1 filters");
        }
        let anchor = self.anchor(dest, &source.extent(), source.pad_zero());
        let channels = source.channels();
        let mut grads = Array4::from_elem(self.kernel().raw_dim(), V::zero(channels));
        for tap in self.kernel_extent().coords() {
            if source.extent().contains(&offset(&anchor, &tap)) {
                grads[nd_index(&tap)] = self.weight().multiply(self.tap(&tap));
            }
        }
        grads
    }
}
