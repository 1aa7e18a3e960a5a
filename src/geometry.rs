//! Geometry descriptors for N-dimensional layers
//!
//! Every layer is addressed by a four-axis coordinate `(x, y, z, t)` over
//! width, height, depth and time. Lower-rank layers simply carry an extent of
//! one on the axes they do not use, so a rank-1 layer is a rank-4 layer with
//! `height = depth = time = 1`.
//!
//! Buffers are flat and row-major with width fastest:
//! `index = x + width * (y + height * (z + depth * t))`. The ndarray storage
//! used by layers has shape `(time, depth, height, width)`, which yields the
//! same linear order.

use ndarray::{s, ArrayView4, ArrayViewMut4};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of axes a layer can have
pub const MAX_RANK: usize = 4;

/// A coordinate ordered `[x, y, z, t]`
pub type Coord = [usize; MAX_RANK];

/// Number of active axes of a layer or filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Rank {
    #[default]
    One,
    Two,
    Three,
    Four,
}

impl Rank {
    /// Convert an axis count into a rank, `None` outside 1..=4
    pub fn from_axes(axes: usize) -> Option<Rank> {
        match axes {
            1 => Some(Rank::One),
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            4 => Some(Rank::Four),
            _ => None,
        }
    }

    /// Number of axes covered by this rank
    pub fn axes(self) -> usize {
        match self {
            Rank::One => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
        }
    }

    /// Index of the highest axis this rank owns
    pub fn last_axis(self) -> usize {
        self.axes() - 1
    }

    /// The next rank down, `None` for rank one
    pub fn lower(self) -> Option<Rank> {
        Rank::from_axes(self.axes() - 1)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.axes())
    }
}

/// Extents of a layer along width, height, depth and time.
///
/// Every extent is at least one; constructors coerce zero to one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub time: usize,
}

impl Default for Extent {
    fn default() -> Self {
        Extent::new(1, 1, 1, 1)
    }
}

impl Extent {
    pub fn new(width: usize, height: usize, depth: usize, time: usize) -> Self {
        Extent {
            width: width.max(1),
            height: height.max(1),
            depth: depth.max(1),
            time: time.max(1),
        }
    }

    pub fn line(width: usize) -> Self {
        Extent::new(width, 1, 1, 1)
    }

    pub fn plane(width: usize, height: usize) -> Self {
        Extent::new(width, height, 1, 1)
    }

    pub fn volume(width: usize, height: usize, depth: usize) -> Self {
        Extent::new(width, height, depth, 1)
    }

    pub fn from_array(axes: [usize; MAX_RANK]) -> Self {
        Extent::new(axes[0], axes[1], axes[2], axes[3])
    }

    /// The same extent `n` on every axis of `rank`, one elsewhere
    pub fn uniform(rank: Rank, n: usize) -> Self {
        let mut axes = [1; MAX_RANK];
        for axis in axes.iter_mut().take(rank.axes()) {
            *axis = n;
        }
        Extent::from_array(axes)
    }

    /// Build from an ndarray shape ordered `(time, depth, height, width)`
    pub fn from_shape(shape: &[usize]) -> Self {
        let mut axes = [1; MAX_RANK];
        for (axis, &len) in shape.iter().rev().take(MAX_RANK).enumerate() {
            axes[axis] = len;
        }
        Extent::from_array(axes)
    }

    pub fn as_array(&self) -> [usize; MAX_RANK] {
        [self.width, self.height, self.depth, self.time]
    }

    /// ndarray shape `(time, depth, height, width)`
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.time, self.depth, self.height, self.width)
    }

    pub fn axis(&self, axis: usize) -> usize {
        self.as_array().get(axis).copied().unwrap_or(1)
    }

    pub fn with_axis(&self, axis: usize, len: usize) -> Self {
        let mut axes = self.as_array();
        if axis < MAX_RANK {
            axes[axis] = len;
        }
        Extent::from_array(axes)
    }

    /// Collapse every axis above `rank` to one
    pub fn truncate(&self, rank: Rank) -> Self {
        let mut axes = self.as_array();
        for axis in axes.iter_mut().skip(rank.axes()) {
            *axis = 1;
        }
        Extent::from_array(axes)
    }

    /// Smallest rank that covers every axis longer than one
    pub fn rank(&self) -> Rank {
        let axes = self.as_array();
        let highest = (0..MAX_RANK).rev().find(|&a| axes[a] > 1).unwrap_or(0);
        Rank::from_axes(highest + 1).unwrap_or_default()
    }

    /// Total number of elements
    pub fn count(&self) -> usize {
        self.width * self.height * self.depth * self.time
    }

    pub fn contains(&self, coord: &Coord) -> bool {
        coord.iter().zip(self.as_array()).all(|(&c, len)| c < len)
    }

    /// Flatten a coordinate, width fastest
    pub fn linear_index(&self, coord: &Coord) -> usize {
        let axes = self.as_array();
        let mut index = 0;
        let mut step = 1;
        for axis in 0..MAX_RANK {
            index += coord[axis] * step;
            step *= axes[axis];
        }
        index
    }

    /// Inverse of [`Extent::linear_index`]
    pub fn coord_of(&self, mut index: usize) -> Coord {
        let axes = self.as_array();
        let mut coord = [0; MAX_RANK];
        for axis in 0..MAX_RANK {
            coord[axis] = index % axes[axis];
            index /= axes[axis];
        }
        coord
    }

    /// Iterate every coordinate, outermost axis first and width fastest
    pub fn coords(&self) -> CoordIter {
        Region::full(*self).coords()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{}", self.width, self.height, self.depth, self.time)
    }
}

/// An axis-aligned box in a layer's coordinate space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub origin: Coord,
    pub extent: Extent,
}

impl Region {
    pub fn new(origin: Coord, extent: Extent) -> Self {
        Region { origin, extent }
    }

    /// The region covering an entire layer
    pub fn full(extent: Extent) -> Self {
        Region { origin: [0; MAX_RANK], extent }
    }

    /// Exclusive end along `axis`
    pub fn end(&self, axis: usize) -> usize {
        self.origin[axis] + self.extent.axis(axis)
    }

    pub fn contains(&self, coord: &Coord) -> bool {
        (0..MAX_RANK).all(|a| coord[a] >= self.origin[a] && coord[a] < self.end(a))
    }

    pub fn count(&self) -> usize {
        self.extent.count()
    }

    /// Intersect with a layer of extent `bounds`.
    ///
    /// Returns `None` when the intersection is empty on any axis.
    pub fn clamp_to(&self, bounds: &Extent) -> Option<Region> {
        let limits = bounds.as_array();
        let mut extent = [1; MAX_RANK];
        for axis in 0..MAX_RANK {
            if self.origin[axis] >= limits[axis] {
                return None;
            }
            extent[axis] = self.end(axis).min(limits[axis]) - self.origin[axis];
        }
        Some(Region::new(self.origin, Extent::from_array(extent)))
    }

    /// Iterate the absolute coordinates inside the region
    pub fn coords(&self) -> CoordIter {
        let mut end = [0; MAX_RANK];
        for (axis, slot) in end.iter_mut().enumerate() {
            *slot = self.end(axis);
        }
        CoordIter {
            origin: self.origin,
            end,
            next: Some(self.origin),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+{}", self.origin, self.extent)
    }
}

/// Row-major coordinate iterator over a region
#[derive(Clone, Debug)]
pub struct CoordIter {
    origin: Coord,
    end: Coord,
    next: Option<Coord>,
}

impl Iterator for CoordIter {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let current = self.next?;
        let mut advanced = current;
        self.next = None;
        for axis in 0..MAX_RANK {
            advanced[axis] += 1;
            if advanced[axis] < self.end[axis] {
                self.next = Some(advanced);
                break;
            }
            advanced[axis] = self.origin[axis];
        }
        Some(current)
    }
}

/// Translate a coordinate into an ndarray index `[t, z, y, x]`
#[inline]
pub fn nd_index(coord: &Coord) -> [usize; MAX_RANK] {
    [coord[3], coord[2], coord[1], coord[0]]
}

/// Component-wise sum of two coordinates
#[inline]
pub fn offset(base: &Coord, delta: &Coord) -> Coord {
    [base[0] + delta[0], base[1] + delta[1], base[2] + delta[2], base[3] + delta[3]]
}

pub(crate) fn view_region<'a, A>(array: &'a ndarray::Array4<A>, region: &Region) -> ArrayView4<'a, A> {
    array.slice(s![
        region.origin[3]..region.end(3),
        region.origin[2]..region.end(2),
        region.origin[1]..region.end(1),
        region.origin[0]..region.end(0)
    ])
}

pub(crate) fn view_region_mut<'a, A>(array: &'a mut ndarray::Array4<A>, region: &Region) -> ArrayViewMut4<'a, A> {
    array.slice_mut(s![
        region.origin[3]..region.end(3),
        region.origin[2]..region.end(2),
        region.origin[1]..region.end(1),
        region.origin[0]..region.end(0)
    ])
}
