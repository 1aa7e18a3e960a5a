pub mod layers;

pub use layers::{ConvLayerBuilder, FilterBuilder};
