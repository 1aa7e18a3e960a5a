use ndarray::Array4;

use crate::activations::Activation;
use crate::filter::Filter;
use crate::geometry::{Extent, Rank, Region};
use crate::layers::ConvLayer;
use crate::propagation::forward;
use crate::value::{NeuronValue, Vector};

fn line(values: &[f32], activation: Option<Activation>) -> ConvLayer<f32> {
    let mut layer = ConvLayer::new(1, Rank::One, Extent::line(values.len()), activation);
    layer.set_data(values, None);
    layer
}

fn kernel(values: &[f32]) -> Array4<f32> {
    Array4::from_shape_vec((1, 1, 1, values.len()), values.to_vec()).unwrap()
}

fn ramp(extent: Extent) -> Vec<f32> {
    (0..extent.count()).map(|v| v as f32).collect()
}

#[test]
fn test_block_pair_sum() {
    let source = line(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Some(Activation::Linear));
    let mut dest = line(&[0.0; 3], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0]), 0.5, 2);

    let result = forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.outputs(), vec![1.5, 3.5, 5.5]);
    assert_eq!(dest.outputs(), vec![1.5, 3.5, 5.5]);
}

#[test]
fn test_identity_filter_round_trip() {
    let extent = Extent::plane(5, 4);
    let mut source = ConvLayer::new(1, Rank::Two, extent, None);
    source.set_data(&ramp(extent), None);
    let mut dest = ConvLayer::new(1, Rank::Two, extent, Some(Activation::Linear));

    let filter = Filter::identity(Rank::Two, 1);
    let result = forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(result.outputs(), source.outputs());
    assert_eq!(dest.inputs(), source.outputs());
}

#[test]
fn test_zero_padding_boundary() {
    let values: Vec<f32> = (1..=10).map(|v| v as f32).collect();
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0, 1.0]), 1.0, 3);

    // without padding the last destinations reuse the last full block
    let clamped = line(&values, Some(Activation::Linear));
    let mut dest = line(&[0.0; 5], Some(Activation::Linear));
    forward(&clamped, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![6.0, 15.0, 24.0, 24.0, 24.0]);

    let padded = line(&values, Some(Activation::Linear)).with_pad_zero(true);
    let mut dest = line(&[7.0; 5], Some(Activation::Linear));
    forward(&padded, &mut dest, Some(&filter), None, None, true).unwrap();
    // anchor 9 keeps its single in-range tap, anchor 12 lies outside the source
    assert_eq!(dest.outputs(), vec![6.0, 15.0, 24.0, 10.0, 0.0]);
}

#[test]
fn test_region_sub_pass_matches_full_pass() {
    let extent = Extent::plane(8, 8);
    let mut source = ConvLayer::new(1, Rank::Two, extent, Some(Activation::Tanh));
    source.set_data(&ramp(extent).iter().map(|v| v / 64.0).collect::<Vec<_>>(), None);
    let filter = Filter::product(
        Rank::Two,
        Array4::from_shape_vec((1, 1, 2, 2), vec![0.5, -0.25, 1.0, 0.75]).unwrap(),
        1.0,
        2,
    );

    let mut full = ConvLayer::new(1, Rank::Two, Extent::plane(4, 4), Some(Activation::Tanh));
    forward(&source, &mut full, Some(&filter), None, None, true).unwrap();

    let region = Region::new([1, 1, 0, 0], Extent::plane(2, 3));
    let mut partial = ConvLayer::new(1, Rank::Two, Extent::plane(4, 4), Some(Activation::Tanh));
    let result = forward(&source, &mut partial, Some(&filter), None, Some(&region), true).unwrap();

    assert_eq!(result.region(), region);
    assert_eq!(result.len(), 6);
    assert_eq!(Some(result.outputs()), full.get_data(Some(&region)));
    // outside the region nothing was written
    assert_eq!(partial.get(&[0, 0, 0, 0]), Some(&0.0));
}

#[test]
fn test_rank_four_degenerates_to_rank_one() {
    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut source4 = ConvLayer::new(1, Rank::Four, Extent::new(6, 1, 1, 1), Some(Activation::Sigmoid));
    source4.set_data(&values, None);
    let mut dest4 = ConvLayer::new(1, Rank::Four, Extent::new(3, 1, 1, 1), Some(Activation::Sigmoid));
    let filter4 = Filter::product(Rank::Four, kernel(&[0.3, -0.2]), 0.5, 2);

    let source1 = line(&values, Some(Activation::Sigmoid));
    let mut dest1 = line(&[0.0; 3], Some(Activation::Sigmoid));
    let filter1 = Filter::product(Rank::One, kernel(&[0.3, -0.2]), 0.5, 2);

    let out4 = forward(&source4, &mut dest4, Some(&filter4), None, None, false).unwrap().outputs();
    let out1 = forward(&source1, &mut dest1, Some(&filter1), None, None, false).unwrap().outputs();
    assert_eq!(out4, out1);
}

#[test]
fn test_transpose_filter_upsamples() {
    let source = line(&[1.0, 2.0, 3.0], Some(Activation::Linear));
    let mut dest = line(&[0.0; 6], Some(Activation::Linear));
    let filter = Filter::transpose(Rank::One, kernel(&[1.0]), 1.0, 2);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
}

#[test]
fn test_transpose_with_conv_gathers_contributions() {
    let source = line(&[1.0, 2.0, 3.0], Some(Activation::Linear));
    let mut dest = line(&[0.0; 6], Some(Activation::Linear));
    let filter = Filter::transpose_with_conv(Rank::One, kernel(&[1.0, 0.5]), 1.0, 2);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![1.0, 0.5, 2.0, 1.0, 3.0, 1.5]);
}

#[test]
fn test_transpose_with_conv_unreached_is_zero() {
    let source = line(&[4.0, 5.0], Some(Activation::Linear));
    let mut dest = line(&[9.0; 6], Some(Activation::Linear));
    let filter = Filter::transpose_with_conv(Rank::One, kernel(&[1.0]), 1.0, 3);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![4.0, 0.0, 0.0, 5.0, 0.0, 0.0]);
    assert_eq!(dest.inputs(), vec![4.0, 0.0, 0.0, 5.0, 0.0, 0.0]);
}

#[test]
fn test_missing_filter_is_no_result() {
    let source = line(&[1.0, 2.0], None);
    let mut dest = line(&[5.0, 5.0], None);
    assert!(forward(&source, &mut dest, None, None, None, true).is_none());
    assert_eq!(dest.outputs(), vec![5.0, 5.0]);
}

#[test]
fn test_detached_pass_leaves_destination() {
    let source = line(&[1.0, 2.0, 3.0, 4.0], Some(Activation::Linear));
    let mut dest = line(&[0.0; 2], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0]), 1.0, 2);

    let result = forward(&source, &mut dest, Some(&filter), None, None, false).unwrap();
    assert!(!result.is_in_place());
    assert_eq!(result.outputs(), vec![3.0, 7.0]);
    assert_eq!(dest.outputs(), vec![0.0, 0.0]);
}

#[test]
fn test_bias_and_activation() {
    let source = line(&[-3.0, 1.0], None).with_bias(1.0);
    let mut dest = line(&[0.0; 2], Some(Activation::Relu));
    let filter = Filter::identity(Rank::One, 1);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.inputs(), vec![-2.0, 2.0]);
    assert_eq!(dest.outputs(), vec![0.0, 2.0]);
}

#[test]
fn test_activation_falls_back_to_source() {
    let source = line(&[-1.0, 1.0], Some(Activation::Relu));
    let mut dest = line(&[0.0; 2], None);
    let filter = Filter::identity(Rank::One, 1);
    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![0.0, 1.0]);

    let source = line(&[-1.0, 1.0], None);
    let mut dest = line(&[0.0; 2], None);
    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.outputs(), vec![-1.0, 1.0]);
}

#[test]
fn test_source_region_restricts_destination() {
    let source = line(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], Some(Activation::Linear));
    let mut dest = line(&[9.0; 4], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0]), 1.0, 2);

    let region = Region::new([4, 0, 0, 0], Extent::line(4));
    let result = forward(&source, &mut dest, Some(&filter), Some(&region), None, true).unwrap();
    assert_eq!(result.region(), Region::new([2, 0, 0, 0], Extent::line(2)));
    assert_eq!(result.outputs(), vec![11.0, 15.0]);
    assert_eq!(result.get(&[1, 0, 0, 0]), Some(&15.0));
    assert_eq!(dest.outputs(), vec![9.0, 9.0, 11.0, 15.0]);
}

#[test]
fn test_source_region_writes_only_returned_range() {
    let values: Vec<f32> = (1..=10).map(|v| v as f32).collect();
    let source = line(&values, Some(Activation::Linear));
    let mut dest = line(&[7.0; 5], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0, 1.0]), 1.0, 3);

    // destinations 3 and 4 clamp onto anchor 6 but lie outside the mapped range
    let region = Region::new([6, 0, 0, 0], Extent::line(4));
    let result = forward(&source, &mut dest, Some(&filter), Some(&region), None, true).unwrap();
    assert_eq!(result.region(), Region::new([2, 0, 0, 0], Extent::line(1)));
    assert_eq!(result.outputs(), vec![24.0]);
    assert_eq!(dest.outputs(), vec![7.0, 7.0, 24.0, 7.0, 7.0]);
}

#[test]
fn test_source_region_wins_over_destination_region() {
    let source = line(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], Some(Activation::Linear));
    let mut dest = line(&[9.0; 4], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0]), 1.0, 2);

    let source_region = Region::new([0, 0, 0, 0], Extent::line(2));
    let dest_region = Region::new([3, 0, 0, 0], Extent::line(1));
    let result =
        forward(&source, &mut dest, Some(&filter), Some(&source_region), Some(&dest_region), true).unwrap();
    assert_eq!(result.region(), Region::new([0, 0, 0, 0], Extent::line(1)));
    assert_eq!(dest.outputs(), vec![3.0, 9.0, 9.0, 9.0]);
}

#[test]
fn test_empty_destination_region_means_full_pass() {
    let source = line(&[1.0, 2.0, 3.0, 4.0], Some(Activation::Linear));
    let mut dest = line(&[9.0; 2], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0, 1.0]), 1.0, 2);

    let outside = Region::new([5, 0, 0, 0], Extent::line(3));
    let result = forward(&source, &mut dest, Some(&filter), None, Some(&outside), true).unwrap();
    assert_eq!(result.region(), Region::full(Extent::line(2)));
    assert_eq!(dest.outputs(), vec![3.0, 7.0]);
}

#[test]
fn test_multi_channel_forward() {
    let mut source = ConvLayer::new(2, Rank::One, Extent::line(4), Some(Activation::Linear));
    let values: Vec<Vector> = (0..4).map(|i| Vector::from_vec(vec![i as f32, -(i as f32)])).collect();
    source.set_data(&values, None);
    let mut dest = ConvLayer::new(2, Rank::One, Extent::line(2), Some(Activation::Relu));
    let filter = Filter::product(Rank::One, Array4::from_elem((1, 1, 1, 2), Vector::unit(2)), Vector::unit(2), 2);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert_eq!(dest.get(&[1, 0, 0, 0]), Some(&Vector::from_vec(vec![5.0, 0.0])));
    assert_eq!(dest.input_at(&[1, 0, 0, 0]), Some(&Vector::from_vec(vec![5.0, -5.0])));
}

#[test]
fn test_full_pass_defines_every_neuron() {
    let source = line(&[1.0, 2.0, 3.0], Some(Activation::Linear)).with_pad_zero(true);
    let mut dest = line(&[f32::NAN; 5], Some(Activation::Linear));
    let filter = Filter::product(Rank::One, kernel(&[1.0]), 1.0, 1);

    forward(&source, &mut dest, Some(&filter), None, None, true).unwrap();
    assert!(dest.outputs().iter().all(|v| v.is_finite()));
    assert_eq!(dest.outputs(), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
}
