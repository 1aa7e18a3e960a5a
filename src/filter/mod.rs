//! Convolution filters
//!
//! A [`Filter`] is a kernel of neuron values with a per-axis stride, a scalar
//! weight applied to the kernel sum, an addressing mode and a [`FilterKind`].
//! The kind decides how a destination coordinate is mapped back onto the
//! source layer:
//!
//! - [`FilterKind::Product`] divides the source into stride blocks and maps
//!   destination `d` to the anchor `d * stride`, producing a smaller layer.
//! - [`FilterKind::Transpose`] maps `d` to `d / stride`, producing a larger
//!   layer (deconvolution).
//! - [`FilterKind::TransposeWithConv`] maps like `Transpose` but evaluates
//!   the kernel by gathering every source neuron whose stride-spread
//!   footprint covers `d`, so its value depends on both ends.

pub mod derivative;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::geometry::{nd_index, offset, Coord, Extent, Rank, MAX_RANK};
use crate::layers::ConvLayer;
use crate::value::NeuronValue;

/// Coordinate-mapping family of a filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterKind {
    #[default]
    Product,
    Transpose,
    TransposeWithConv,
}

impl FilterKind {
    /// Whether destination coordinates are derived by dividing by the stride
    pub fn is_transposed(self) -> bool {
        matches!(self, FilterKind::Transpose | FilterKind::TransposeWithConv)
    }
}

/// A learnable convolution kernel with stride and addressing mode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter<V> {
    kind: FilterKind,
    rank: Rank,
    /// Kernel values, shape `(time, depth, height, width)`
    kernel: Array4<V>,
    /// Scale applied to the kernel sum
    weight: V,
    stride: [usize; MAX_RANK],
    slide_by_one: bool,
}

impl<V: NeuronValue> Filter<V> {
    /// Create a filter.
    ///
    /// Strides are coerced to at least one and axes above `rank` get stride
    /// one, as does the kernel extent along those axes.
    pub fn new(
        kind: FilterKind,
        rank: Rank,
        kernel: Array4<V>,
        weight: V,
        stride: [usize; MAX_RANK],
        slide_by_one: bool,
    ) -> Self {
        let mut strides = [1; MAX_RANK];
        for axis in 0..rank.axes() {
            strides[axis] = stride[axis].max(1);
        }
        let kernel = if Extent::from_shape(kernel.shape()).rank() > rank {
            let extent = Extent::from_shape(kernel.shape()).truncate(rank);
            crate::geometry::view_region(&kernel, &crate::geometry::Region::full(extent)).to_owned()
        } else {
            kernel
        };
        Filter { kind, rank, kernel, weight, stride: strides, slide_by_one }
    }

    /// A block product filter with the same stride on every axis of `rank`
    pub fn product(rank: Rank, kernel: Array4<V>, weight: V, stride: usize) -> Self {
        let strides = Extent::uniform(rank, stride).as_array();
        Filter::new(FilterKind::Product, rank, kernel, weight, strides, false)
    }

    /// A transposed filter with the same stride on every axis of `rank`
    pub fn transpose(rank: Rank, kernel: Array4<V>, weight: V, stride: usize) -> Self {
        let strides = Extent::uniform(rank, stride).as_array();
        Filter::new(FilterKind::Transpose, rank, kernel, weight, strides, false)
    }

    /// A transposed filter that gathers every covering source neuron
    pub fn transpose_with_conv(rank: Rank, kernel: Array4<V>, weight: V, stride: usize) -> Self {
        let strides = Extent::uniform(rank, stride).as_array();
        Filter::new(FilterKind::TransposeWithConv, rank, kernel, weight, strides, false)
    }

    /// Single-tap unit filter: stride one, slide-by-one, reproduces its source
    pub fn identity(rank: Rank, channels: usize) -> Self {
        let kernel = Array4::from_elem((1, 1, 1, 1), V::unit(channels));
        Filter::new(FilterKind::Product, rank, kernel, V::unit(channels), [1; MAX_RANK], true)
    }

    pub fn with_slide_by_one(mut self, slide_by_one: bool) -> Self {
        self.slide_by_one = slide_by_one;
        self
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn is_transposed(&self) -> bool {
        self.kind.is_transposed()
    }

    pub fn is_slide_by_one(&self) -> bool {
        self.slide_by_one
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.stride.get(axis).copied().unwrap_or(1)
    }

    pub fn strides(&self) -> [usize; MAX_RANK] {
        self.stride
    }

    pub fn kernel(&self) -> &Array4<V> {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Array4<V> {
        &mut self.kernel
    }

    pub fn kernel_extent(&self) -> Extent {
        Extent::from_shape(self.kernel.shape())
    }

    pub fn tap(&self, tap: &Coord) -> &V {
        &self.kernel[nd_index(tap)]
    }

    pub fn weight(&self) -> &V {
        &self.weight
    }

    pub fn set_weight(&mut self, weight: V) {
        self.weight = weight;
    }

    /// Map a destination coordinate onto its source anchor.
    ///
    /// Block mode clamps the block index to the last full block of the source
    /// unless `pad_zero` is set; slide-by-one treats the whole source extent
    /// as the block count. Transposed filters divide by the stride and clamp
    /// to the last source index unless `pad_zero` is set. The anchor may lie
    /// outside `source` when zero-padding.
    pub fn anchor(&self, dest: &Coord, source: &Extent, pad_zero: bool) -> Coord {
        let mut anchor = [0; MAX_RANK];
        for axis in 0..MAX_RANK {
            let stride = self.stride[axis];
            let len = source.axis(axis);
            anchor[axis] = if self.is_transposed() {
                let s = dest[axis] / stride;
                if pad_zero { s } else { s.min(len - 1) }
            } else {
                let blocks = if self.slide_by_one { len } else { (len / stride).max(1) };
                let block = if pad_zero { dest[axis] } else { dest[axis].min(blocks - 1) };
                block * stride
            };
        }
        anchor
    }

    /// Destination extent implied by the coordinate law for a source extent.
    ///
    /// Counts destination positions whose anchor still starts a full stride
    /// block of the source (at least one), or, for transposed filters, whose
    /// quotient by the stride still addresses a source neuron.
    pub fn output_extent(&self, source: &Extent) -> Extent {
        let mut axes = [1; MAX_RANK];
        for (axis, slot) in axes.iter_mut().enumerate() {
            let stride = self.stride[axis];
            let len = source.axis(axis);
            let mut count = 0;
            if self.is_transposed() {
                while count / stride < len {
                    count += 1;
                }
            } else {
                while (count + 1) * stride <= len {
                    count += 1;
                }
            }
            *slot = count.max(1);
        }
        Extent::from_array(axes)
    }

    /// Weighted kernel sum anchored at `anchor` in `source`.
    ///
    /// Taps that fall outside the source contribute nothing; `None` when no
    /// tap lands inside it.
    pub fn apply(&self, anchor: &Coord, source: &ConvLayer<V>) -> Option<V> {
        let mut sum: Option<V> = None;
        for tap in self.kernel_extent().coords() {
            if let Some(x) = source.get(&offset(anchor, &tap)) {
                let term = self.tap(&tap).multiply(x);
                sum = Some(match sum {
                    Some(acc) => acc.add(&term),
                    None => term,
                });
            }
        }
        sum.map(|s| self.weight.multiply(&s))
    }

    /// Gather evaluation for [`FilterKind::TransposeWithConv`].
    ///
    /// Sums `kernel[k] * source[q]` over every tap `k` and source position
    /// `q` with `q * stride + k == dest`. `None` when no source neuron reaches
    /// `dest`.
    pub fn apply_transposed(&self, dest: &Coord, source: &ConvLayer<V>) -> Option<V> {
        let mut sum: Option<V> = None;
        'taps: for tap in self.kernel_extent().coords() {
            let mut q = [0; MAX_RANK];
            for axis in 0..MAX_RANK {
                if dest[axis] < tap[axis] {
                    continue 'taps;
                }
                let diff = dest[axis] - tap[axis];
                if diff % self.stride[axis] != 0 {
                    continue 'taps;
                }
                q[axis] = diff / self.stride[axis];
            }
            if let Some(x) = source.get(&q) {
                let term = self.tap(&tap).multiply(x);
                sum = Some(match sum {
                    Some(acc) => acc.add(&term),
                    None => term,
                });
            }
        }
        sum.map(|s| self.weight.multiply(&s))
    }
}
