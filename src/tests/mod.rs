pub mod test_propagation;
