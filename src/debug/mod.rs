//! Numerical diagnostics for kernels and neuron buffers

pub mod numerical_check;

pub use numerical_check::{check_values, sanitize, NumericalIssue};
