//! Serde configuration for learning runs and whole chains
//!
//! A chain is described as an ordered list of layers, each optionally carrying
//! the filter that computes the next layer:
//!
//! ```json
//! {
//!   "layers": [
//!     { "width": 6, "activation": "Linear",
//!       "filter": { "stride": 2, "weight": 0.5, "kernel": [1.0, 1.0] } },
//!     { "width": 3, "activation": "Linear" }
//!   ]
//! }
//! ```

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::activations::Activation;
use crate::builders::{ConvLayerBuilder, FilterBuilder};
use crate::error::{ConvError, Result};
use crate::filter::{Filter, FilterKind};
use crate::geometry::{Extent, Rank};
use crate::layers::initialization::WeightInit;
use crate::layers::{ConvLayer, IdSource};
use crate::learning::LearningRateSchedule;

/// Parameters of a filter learning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate per iteration; carries the starting rate
    pub schedule: LearningRateSchedule,
    pub iterations: usize,
    /// Whether the bias is learned alongside the kernel
    pub learn_bias: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            schedule: LearningRateSchedule::default(),
            iterations: 100,
            learn_bias: true,
        }
    }
}

impl LearningConfig {
    /// Inverse square root decay from `learning_rate`
    pub fn new(learning_rate: f32, iterations: usize) -> Self {
        LearningConfig {
            schedule: LearningRateSchedule::InverseSqrt { initial_lr: learning_rate },
            iterations,
            learn_bias: true,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.schedule.initial_lr()
    }

    /// Keep the decay family, restart it from `learning_rate`
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.schedule = match self.schedule {
            LearningRateSchedule::Constant { .. } => LearningRateSchedule::Constant { lr: learning_rate },
            LearningRateSchedule::InverseSqrt { .. } => LearningRateSchedule::InverseSqrt { initial_lr: learning_rate },
            LearningRateSchedule::StepDecay { decay_rate, step_size, .. } => {
                LearningRateSchedule::StepDecay { initial_lr: learning_rate, decay_rate, step_size }
            }
            LearningRateSchedule::ExponentialDecay { decay_rate, .. } => {
                LearningRateSchedule::ExponentialDecay { initial_lr: learning_rate, decay_rate }
            }
        };
        self
    }

    pub fn with_schedule(mut self, schedule: LearningRateSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Use the starting rate for every iteration
    pub fn fixed_rate(mut self) -> Self {
        self.schedule = self.schedule.fixed();
        self
    }

    pub fn learn_bias(mut self, learn_bias: bool) -> Self {
        self.learn_bias = learn_bias;
        self
    }
}

/// Filter attached to a layer in a [`ChainConfig`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub kind: FilterKind,
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Kernel extent on every axis of the layer rank; defaults to the stride,
    /// or to the explicit kernel length on a rank-1 layer
    #[serde(default)]
    pub kernel_extent: Option<usize>,
    #[serde(default)]
    pub slide_by_one: bool,
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Explicit kernel values, width fastest
    #[serde(default)]
    pub kernel: Option<Vec<f32>>,
    /// Kernel initialization when no explicit values are given
    #[serde(default)]
    pub init: Option<WeightInit>,
}

fn default_stride() -> usize {
    1
}

fn default_weight() -> f32 {
    1.0
}

impl FilterConfig {
    /// Build a filter for a layer of the given rank
    pub fn build(&self, rank: Rank) -> Result<Filter<f32>> {
        let mut builder = FilterBuilder::new()
            .kind(self.kind)
            .rank(rank)
            .stride(self.stride)
            .slide_by_one(self.slide_by_one)
            .weight(self.weight);
        if let Some(init) = &self.init {
            builder = builder.weight_init(init.clone());
        }

        let n = match (self.kernel_extent, &self.kernel) {
            (Some(n), _) => n,
            (None, Some(values)) if rank == Rank::One => values.len(),
            (None, _) => self.stride,
        };
        builder = builder.kernel_extent(n);

        if let Some(values) = &self.kernel {
            let extent = Extent::uniform(rank, n);
            let kernel = Array4::from_shape_vec(extent.shape(), values.clone()).map_err(|_| {
                ConvError::dimension_mismatch(
                    format!("{} kernel values for extent {}", extent.count(), extent),
                    format!("{} values", values.len()),
                )
            })?;
            builder = builder.kernel(kernel);
        }
        builder.build()
    }
}

/// One layer of a [`ChainConfig`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Axis count 1-4; inferred from the extents when absent
    #[serde(default)]
    pub rank: Option<usize>,
    pub width: usize,
    #[serde(default = "default_extent")]
    pub height: usize,
    #[serde(default = "default_extent")]
    pub depth: usize,
    #[serde(default = "default_extent")]
    pub time: usize,
    /// Canonical activation when absent
    #[serde(default)]
    pub activation: Option<Activation>,
    #[serde(default)]
    pub pad_zero: bool,
    #[serde(default)]
    pub bias: Option<f32>,
    /// Filter computing the next layer
    #[serde(default)]
    pub filter: Option<FilterConfig>,
}

fn default_channels() -> usize {
    1
}

fn default_extent() -> usize {
    1
}

impl LayerConfig {
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height, self.depth, self.time)
    }

    /// Build the layer, drawing its identifier from `ids`
    pub fn build(&self, ids: &IdSource) -> Result<ConvLayer<f32>> {
        let extent = self.extent();
        let rank = match self.rank {
            Some(axes) => Rank::from_axes(axes).ok_or_else(|| ConvError::InvalidParameter {
                name: "rank".to_string(),
                reason: format!("rank must be between 1 and 4, got {}", axes),
            })?,
            None => extent.rank(),
        };

        let mut builder = ConvLayerBuilder::new()
            .channels(self.channels)
            .rank(rank)
            .extent(extent)
            .pad_zero(self.pad_zero)
            .id_source(ids);
        if let Some(activation) = self.activation {
            builder = builder.activation(activation);
        }
        if let Some(bias) = self.bias {
            builder = builder.bias(bias);
        }
        if let Some(filter) = &self.filter {
            builder = builder.filter(filter.build(rank)?);
        }
        builder.build()
    }
}

/// Ordered description of a chain of layers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub layers: Vec<LayerConfig>,
}

impl ChainConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_config_defaults() {
        let config = LearningConfig::default();
        assert_eq!(config.iterations, 100);
        assert!(config.learn_bias);
        assert!((config.learning_rate() - 0.01).abs() < 1e-7);

        let fixed = LearningConfig::new(0.1, 10).fixed_rate();
        assert_eq!(fixed.schedule, LearningRateSchedule::Constant { lr: 0.1 });
    }

    #[test]
    fn test_learning_config_partial_json() {
        let config: LearningConfig = serde_json::from_str(r#"{ "iterations": 7 }"#).unwrap();
        assert_eq!(config.iterations, 7);
        assert!(config.learn_bias);
    }

    #[test]
    fn test_layer_config_defaults() {
        let config: LayerConfig = serde_json::from_str(r#"{ "width": 5, "height": 2 }"#).unwrap();
        let layer = config.build(&IdSource::new()).unwrap();
        assert_eq!(layer.extent(), Extent::plane(5, 2));
        assert_eq!(layer.channels(), 1);
        assert_eq!(layer.activation(), Some(Activation::Sigmoid));
    }

    #[test]
    fn test_filter_config_explicit_kernel() {
        let config: FilterConfig =
            serde_json::from_str(r#"{ "stride": 2, "weight": 0.5, "kernel": [1.0, 1.0] }"#).unwrap();
        let filter = config.build(Rank::One).unwrap();
        assert_eq!(filter.kernel_extent(), Extent::line(2));
        assert_eq!(*filter.weight(), 0.5);
    }

    #[test]
    fn test_filter_config_kernel_length_mismatch() {
        let config: FilterConfig =
            serde_json::from_str(r#"{ "stride": 2, "kernel_extent": 2, "kernel": [1.0, 1.0, 1.0] }"#).unwrap();
        assert!(matches!(config.build(Rank::Two), Err(ConvError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_invalid_rank_rejected() {
        let config: LayerConfig = serde_json::from_str(r#"{ "width": 5, "rank": 6 }"#).unwrap();
        assert!(config.build(&IdSource::new()).is_err());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(ChainConfig::from_json_str("{ layers: "), Err(ConvError::ConfigError(_))));
    }
}
