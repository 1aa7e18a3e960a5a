//! Region mapping between adjacent layers
//!
//! Translates an axis-aligned region from one layer's coordinate space into
//! the coordinate space of its neighbour, using the stride and transpose rules
//! of the filter that connects them:
//!
//! | direction | filter      | origin                        | extent                 |
//! |-----------|-------------|-------------------------------|------------------------|
//! | forward   | block/slide | `origin / stride`             | `max(1, extent/stride)` |
//! | forward   | transposed  | `origin * stride`             | `extent * stride`      |
//! | backward  | block/slide | `clamp_block(origin) * stride` | `extent * stride`      |
//! | backward  | transposed  | `origin / stride` (clamped)   | `max(1, extent/stride)` |
//!
//! Backward mapping uses the previous layer's filter, with block indices
//! clamped to the previous layer's extent measured in stride blocks unless
//! that layer zero-pads. Results are clamped to the target layer; a region
//! that clamps away on any axis maps to `None`.
//!
//! Mapping is composed by rank: a rank-`k` mapping resolves axes `0..k-1`
//! through the rank-`k-1` mapping and then resolves its own last axis.

use crate::filter::Filter;
use crate::geometry::{Extent, Rank, Region, MAX_RANK};
use crate::layers::ConvLayer;
use crate::value::NeuronValue;

/// Map `region` of a source layer through `filter` without clamping.
///
/// Applied to the whole source extent this yields the destination extent the
/// filter produces.
pub fn project_forward<V: NeuronValue>(region: &Region, filter: &Filter<V>) -> Region {
    let mut origin = [0; MAX_RANK];
    let mut extent = [1; MAX_RANK];
    for axis in 0..MAX_RANK {
        let (o, e) = forward_axis(filter, axis, region.origin[axis], region.extent.axis(axis));
        origin[axis] = o;
        extent[axis] = e;
    }
    Region::new(origin, Extent::from_array(extent))
}

/// Map a region of the source layer onto the destination layer of extent `next`
pub fn map_forward<V: NeuronValue>(region: &Region, filter: &Filter<V>, next: &Extent) -> Option<Region> {
    let rank = mapping_rank(region, filter, next);
    map_rank(rank, region, next, &|axis, origin, extent| forward_axis(filter, axis, origin, extent))
}

/// Map a region of a layer back onto its previous layer.
///
/// `prev_filter` is the filter the previous layer uses to compute this one.
pub fn map_backward<V: NeuronValue>(
    region: &Region,
    prev_filter: &Filter<V>,
    prev: &Extent,
    prev_pad_zero: bool,
) -> Option<Region> {
    let rank = mapping_rank(region, prev_filter, prev);
    map_rank(rank, region, prev, &|axis, origin, extent| {
        backward_axis(prev_filter, axis, origin, extent, prev.axis(axis), prev_pad_zero)
    })
}

/// Map a region of `this` onto `next` using the filter installed on `this`.
///
/// The region is first clamped to `this`.
pub fn region_to_next<V: NeuronValue>(this: &ConvLayer<V>, region: &Region, next: &ConvLayer<V>) -> Option<Region> {
    let filter = this.filter()?;
    let region = region.clamp_to(&this.extent())?;
    map_forward(&region, filter, &next.extent())
}

/// Map a region of `this` onto `prev` using the filter installed on `prev`.
///
/// The region is first clamped to `this`.
pub fn region_to_prev<V: NeuronValue>(this: &ConvLayer<V>, region: &Region, prev: &ConvLayer<V>) -> Option<Region> {
    let filter = prev.filter()?;
    let region = region.clamp_to(&this.extent())?;
    map_backward(&region, filter, &prev.extent(), prev.pad_zero())
}

fn forward_axis<V: NeuronValue>(filter: &Filter<V>, axis: usize, origin: usize, extent: usize) -> (usize, usize) {
    let stride = filter.stride(axis);
    if filter.is_transposed() {
        (origin * stride, extent * stride)
    } else {
        (origin / stride, (extent / stride).max(1))
    }
}

fn backward_axis<V: NeuronValue>(
    filter: &Filter<V>,
    axis: usize,
    origin: usize,
    extent: usize,
    prev_len: usize,
    pad_zero: bool,
) -> (usize, usize) {
    let stride = filter.stride(axis);
    if filter.is_transposed() {
        let o = origin / stride;
        let o = if pad_zero { o } else { o.min(prev_len - 1) };
        (o, (extent / stride).max(1))
    } else {
        let blocks = if filter.is_slide_by_one() { prev_len } else { (prev_len / stride).max(1) };
        let block = if pad_zero { origin } else { origin.min(blocks - 1) };
        (block * stride, extent * stride)
    }
}

fn mapping_rank<V: NeuronValue>(region: &Region, filter: &Filter<V>, target: &Extent) -> Rank {
    let highest_used = (0..MAX_RANK)
        .rev()
        .find(|&axis| region.origin[axis] > 0 || region.extent.axis(axis) > 1)
        .map(|axis| axis + 1)
        .and_then(Rank::from_axes)
        .unwrap_or_default();
    filter.rank().max(target.rank()).max(highest_used)
}

fn map_rank(
    rank: Rank,
    region: &Region,
    target: &Extent,
    map_axis: &dyn Fn(usize, usize, usize) -> (usize, usize),
) -> Option<Region> {
    let mut mapped = match rank.lower() {
        Some(lower) => map_rank(lower, region, target, map_axis)?,
        None => Region::full(Extent::default()),
    };
    let axis = rank.last_axis();
    let (origin, extent) = map_axis(axis, region.origin[axis], region.extent.axis(axis));
    let limit = target.axis(axis);
    if origin >= limit || extent == 0 {
        return None;
    }
    mapped.origin[axis] = origin;
    mapped.extent = mapped.extent.with_axis(axis, extent.min(limit - origin));
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn block(rank: Rank, stride: usize) -> Filter<f32> {
        Filter::product(rank, Array4::from_elem(Extent::uniform(rank, stride).shape(), 1.0), 1.0, stride)
    }

    #[test]
    fn test_forward_block_mapping() {
        let filter = block(Rank::Two, 2);
        let region = Region::new([2, 4, 0, 0], Extent::plane(4, 3));
        let mapped = map_forward(&region, &filter, &Extent::plane(5, 5)).unwrap();
        assert_eq!(mapped.origin, [1, 2, 0, 0]);
        assert_eq!(mapped.extent, Extent::plane(2, 1));
    }

    #[test]
    fn test_forward_transposed_mapping_clamps() {
        let filter = Filter::transpose(Rank::One, Array4::from_elem((1, 1, 1, 1), 1.0f32), 1.0, 3);
        let region = Region::new([1, 0, 0, 0], Extent::line(2));
        let mapped = map_forward(&region, &filter, &Extent::line(8)).unwrap();
        assert_eq!(mapped.origin[0], 3);
        assert_eq!(mapped.extent, Extent::line(5));
    }

    #[test]
    fn test_forward_outside_target_is_none() {
        let filter = block(Rank::One, 2);
        let region = Region::new([10, 0, 0, 0], Extent::line(2));
        assert!(map_forward(&region, &filter, &Extent::line(4)).is_none());
    }

    #[test]
    fn test_backward_mirrors_forward() {
        let filter = block(Rank::Two, 2);
        let prev = Extent::plane(8, 8);
        let region = Region::new([1, 2, 0, 0], Extent::plane(2, 1));
        let mapped = map_backward(&region, &filter, &prev, false).unwrap();
        assert_eq!(mapped.origin, [2, 4, 0, 0]);
        assert_eq!(mapped.extent, Extent::plane(4, 2));
    }

    #[test]
    fn test_backward_block_clamp() {
        let filter = block(Rank::One, 3);
        let prev = Extent::line(10);
        let region = Region::new([5, 0, 0, 0], Extent::line(1));
        let clamped = map_backward(&region, &filter, &prev, false).unwrap();
        assert_eq!(clamped.origin[0], 6);
        assert_eq!(clamped.extent, Extent::line(3));
        assert!(map_backward(&region, &filter, &prev, true).is_none());
    }

    #[test]
    fn test_project_forward_matches_output_extent() {
        let filter = block(Rank::Three, 2);
        let source = Extent::volume(9, 4, 5);
        let projected = project_forward(&Region::full(source), &filter);
        assert_eq!(projected.extent, filter.output_extent(&source));
    }
}
