//! Online estimation of a product filter between two connected layers
//!
//! Given a *large* and a *small* layer (named by neuron count, not by their
//! position in a chain), [`learn_filter`] estimates a square kernel and a bias
//! that predict the small layer's values from stride blocks of the large one,
//! by stochastic gradient descent over every small-layer coordinate.
//!
//! The kernel extent is inferred from the size ratio of the two layers. The
//! learner never touches the filters installed on either layer; the caller
//! decides whether to [`ConvLayer::install`] the result.
//!
//! ```rust
//! use convnd::geometry::{Extent, Rank};
//! use convnd::layers::ConvLayer;
//! use convnd::config::LearningConfig;
//! use convnd::activations::Activation;
//!
//! let mut large = ConvLayer::<f32>::new(1, Rank::One, Extent::line(8), None);
//! large.set_data(&[1.0, 3.0, 2.0, 2.0, 5.0, 7.0, 0.0, 4.0], None);
//! let mut small = ConvLayer::<f32>::new(1, Rank::One, Extent::line(4), Some(Activation::Linear));
//! small.set_data(&[2.0, 2.0, 6.0, 2.0], None);
//!
//! let config = LearningConfig::new(0.02, 200).fixed_rate();
//! let learned = large.learn_filter(&small, &config, None).unwrap();
//! assert_eq!(learned.kernel_extent(), Extent::line(2));
//! ```

pub mod schedule;

pub use schedule::LearningRateSchedule;

use log::{info, trace, warn};
use ndarray::Array4;

use crate::config::LearningConfig;
use crate::debug::check_values;
use crate::filter::{Filter, FilterKind};
use crate::geometry::{nd_index, offset, Coord, Extent, Rank, Region, MAX_RANK};
use crate::layers::ConvLayer;
use crate::value::NeuronValue;

/// Kernel and bias estimated by the learner
#[derive(Clone, Debug, PartialEq)]
pub struct LearnedFilter<V> {
    /// Kernel values, shape `(time, depth, height, width)`
    pub kernel: Array4<V>,
    pub bias: V,
    /// Rank the kernel was learned at, after degenerate axes were dropped
    pub rank: Rank,
    pub stride: usize,
    pub slide_by_one: bool,
    /// Whether the `this` layer of the call was the large layer
    pub this_is_large: bool,
    /// Mean absolute prediction error of each completed iteration
    pub errors: Vec<f32>,
}

impl<V: NeuronValue> LearnedFilter<V> {
    pub fn kernel_extent(&self) -> Extent {
        Extent::from_shape(self.kernel.shape())
    }

    pub fn first_error(&self) -> Option<f32> {
        self.errors.first().copied()
    }

    pub fn last_error(&self) -> Option<f32> {
        self.errors.last().copied()
    }

    /// Product filter with unit weight carrying the learned kernel
    pub fn to_filter(&self) -> Filter<V> {
        let channels = self.bias.channels();
        Filter::new(
            FilterKind::Product,
            self.rank,
            self.kernel.clone(),
            V::unit(channels),
            Extent::uniform(self.rank, self.stride).as_array(),
            self.slide_by_one,
        )
    }

    pub fn into_filter(self) -> Filter<V> {
        self.to_filter()
    }
}

impl<V: NeuronValue> ConvLayer<V> {
    /// Learn a product filter between this layer and `other`.
    ///
    /// See [`learn_filter`].
    pub fn learn_filter(
        &self,
        other: &ConvLayer<V>,
        config: &LearningConfig,
        initial: Option<&LearnedFilter<V>>,
    ) -> Option<LearnedFilter<V>> {
        learn_filter(self, other, config, initial)
    }

    /// Install a learned kernel as this layer's filter and its bias as this
    /// layer's bias, returning the previous filter.
    pub fn install(&mut self, learned: LearnedFilter<V>) -> Option<Filter<V>> {
        let filter = learned.to_filter();
        self.set_bias(Some(learned.bias));
        self.set_filter(Some(filter))
    }
}

/// Estimate the kernel and bias predicting the smaller of two layers from the
/// larger one.
///
/// `this` is treated as the large layer when both hold the same number of
/// neurons. `initial` seeds the kernel when its extent matches the inferred
/// one, and seeds the bias whenever given. Returns `None` when no small-layer
/// coordinate maps inside the large layer.
pub fn learn_filter<V: NeuronValue>(
    this: &ConvLayer<V>,
    other: &ConvLayer<V>,
    config: &LearningConfig,
    initial: Option<&LearnedFilter<V>>,
) -> Option<LearnedFilter<V>> {
    let this_is_large = this.len() >= other.len();
    let (large, small) = if this_is_large { (this, other) } else { (other, this) };
    let rank = large.rank().max(small.rank());

    let mut learned = learn_rank(rank, large, small, config, initial)?;
    learned.this_is_large = this_is_large;
    Some(learned)
}

fn learn_rank<V: NeuronValue>(
    rank: Rank,
    large: &ConvLayer<V>,
    small: &ConvLayer<V>,
    config: &LearningConfig,
    initial: Option<&LearnedFilter<V>>,
) -> Option<LearnedFilter<V>> {
    if let Some(lower) = rank.lower() {
        if large.extent().axis(rank.last_axis()) <= 1 {
            return learn_rank(lower, large, small, config, initial);
        }
    }
    FilterLearner::new(rank, large, small, config, initial).run()
}

/// Kernel geometry inferred from a pair of layer extents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KernelShape {
    extent: usize,
    stride: usize,
    slide_by_one: bool,
}

impl KernelShape {
    fn infer(rank: Rank, large: &Extent, small: &Extent) -> Self {
        let ratio: usize = (0..rank.axes())
            .map(|axis| (large.axis(axis) / small.axis(axis)).max(1))
            .product();
        let n = integer_root(ratio, rank.axes() as u32);
        if n > 1 {
            KernelShape { extent: n, stride: n, slide_by_one: false }
        } else {
            let extent = if rank == Rank::Four { 4 } else { 3 };
            KernelShape { extent, stride: 1, slide_by_one: true }
        }
    }
}

/// Largest `n >= 1` with `n^degree <= value`, by bisection
fn integer_root(value: usize, degree: u32) -> usize {
    if degree <= 1 || value <= 1 {
        return value.max(1);
    }
    let fits = |n: usize| n.checked_pow(degree).map_or(false, |p| p <= value);
    let (mut lo, mut hi) = (1usize, value);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

struct FilterLearner<'a, V> {
    large: &'a ConvLayer<V>,
    small: &'a ConvLayer<V>,
    config: &'a LearningConfig,
    filter: Filter<V>,
    bias: V,
    sweep: Region,
}

impl<'a, V: NeuronValue> FilterLearner<'a, V> {
    fn new(
        rank: Rank,
        large: &'a ConvLayer<V>,
        small: &'a ConvLayer<V>,
        config: &'a LearningConfig,
        initial: Option<&LearnedFilter<V>>,
    ) -> Self {
        let shape = KernelShape::infer(rank, &large.extent(), &small.extent());
        let channels = large.channels().max(small.channels());
        let kernel_extent = Extent::uniform(rank, shape.extent);

        let kernel = initial
            .filter(|seed| seed.kernel_extent() == kernel_extent)
            .map(|seed| seed.kernel.clone())
            .unwrap_or_else(|| Array4::from_elem(kernel_extent.shape(), V::zero(channels)));
        let bias = initial.map_or_else(|| V::zero(channels), |seed| seed.bias.clone());
        let filter = Filter::new(
            FilterKind::Product,
            rank,
            kernel,
            V::unit(channels),
            Extent::uniform(rank, shape.stride).as_array(),
            shape.slide_by_one,
        );

        // the last coordinate along every non-degenerate axis is not swept
        let small_extent = small.extent();
        let mut sweep = [1; MAX_RANK];
        for (axis, len) in sweep.iter_mut().enumerate().take(rank.axes()) {
            let n = small_extent.axis(axis);
            *len = if n > 1 { n - 1 } else { 1 };
        }

        trace!(
            "learning rank {} kernel {} (stride {}, slide-by-one {}) from layer {} to layer {}",
            rank,
            kernel_extent,
            shape.stride,
            shape.slide_by_one,
            large.id(),
            small.id()
        );

        FilterLearner {
            large,
            small,
            config,
            filter,
            bias,
            sweep: Region::full(Extent::from_array(sweep)),
        }
    }

    fn run(mut self) -> Option<LearnedFilter<V>> {
        let (large, small) = (self.large, self.small);
        let large_extent = large.extent();
        let activation = small.activation();
        let mut errors = Vec::with_capacity(self.config.iterations);

        for iteration in 1..=self.config.iterations {
            let rate = self.config.schedule.get_lr(iteration);
            let mut total = 0.0;
            let mut samples = 0usize;

            for dest in self.sweep.coords() {
                let anchor = self.filter.anchor(&dest, &large_extent, large.pad_zero());
                if !large_extent.contains(&anchor) {
                    continue;
                }
                let Some(real) = small.get(&dest) else {
                    continue;
                };
                let Some(raw) = self.filter.apply(&anchor, large) else {
                    continue;
                };

                let predicted = raw.add(&self.bias);
                let (output, slope) = match activation {
                    Some(activation) => (predicted.evaluate(&activation), Some(predicted.derivative(&activation))),
                    None => (predicted, None),
                };
                let error = real.subtract(&output);
                total += error.norm();
                samples += 1;

                let delta = match slope {
                    Some(slope) => error.multiply(&slope),
                    None => error,
                };
                self.step(&anchor, &delta.scale(rate));
            }

            if samples == 0 {
                return None;
            }
            let mean = total / samples as f32;
            trace!("iteration {}: rate {:.6}, mean error {:.6}", iteration, rate, mean);
            errors.push(mean);

            let issues = check_values(self.filter.kernel().iter().chain(std::iter::once(&self.bias)));
            if !issues.is_empty() {
                warn!("kernel diverged at iteration {}: {:?}; stopping early", iteration, issues);
                break;
            }
        }

        info!(
            "learned {} kernel over {} iterations, final mean error {:?}",
            self.filter.kernel_extent(),
            errors.len(),
            errors.last()
        );

        let stride = self.filter.stride(0);
        let slide_by_one = self.filter.is_slide_by_one();
        let rank = self.filter.rank();
        Some(LearnedFilter {
            kernel: self.filter.kernel().clone(),
            bias: self.bias,
            rank,
            stride,
            slide_by_one,
            this_is_large: true,
            errors,
        })
    }

    /// Move every tap along `delta` scaled by the source value under it
    fn step(&mut self, anchor: &Coord, delta: &V) {
        let taps = self.filter.kernel_extent();
        let kernel = self.filter.kernel_mut();
        for tap in taps.coords() {
            if let Some(x) = self.large.get(&offset(anchor, &tap)) {
                let slot = &mut kernel[nd_index(&tap)];
                *slot = slot.add(&delta.multiply(x));
            }
        }
        if self.config.learn_bias {
            self.bias = self.bias.add(delta);
        }
    }
}
