pub mod conv;
pub mod initialization;

pub use conv::{ConvLayer, IdSource, Neuron};
pub use initialization::WeightInit;
