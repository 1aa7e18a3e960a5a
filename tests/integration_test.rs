use convnd::activations::Activation;
use convnd::chain::ConvChain;
use convnd::config::{ChainConfig, FilterConfig, LayerConfig, LearningConfig};
use convnd::content::Content;
use convnd::filter::FilterKind;
use convnd::geometry::{Extent, Region};
use tempfile::TempDir;

fn layer(width: usize, height: usize, filter: Option<FilterConfig>) -> LayerConfig {
    LayerConfig {
        channels: 1,
        rank: Some(2),
        width,
        height,
        depth: 1,
        time: 1,
        activation: Some(Activation::Linear),
        pad_zero: false,
        bias: None,
        filter,
    }
}

fn mean_filter() -> FilterConfig {
    FilterConfig {
        kind: FilterKind::Product,
        stride: 2,
        kernel_extent: Some(2),
        slide_by_one: false,
        weight: 0.25,
        kernel: Some(vec![1.0; 4]),
        init: None,
    }
}

#[test]
fn test_chain_config_file_round_trip() {
    let config = ChainConfig {
        layers: vec![layer(8, 8, Some(mean_filter())), layer(4, 4, Some(mean_filter())), layer(2, 2, None)],
    };

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chain.json");
    config.save(&path).unwrap();
    let loaded = ChainConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut chain = ConvChain::from_config(&loaded).unwrap();
    assert_eq!(chain.order(), vec![0, 1, 2]);
    chain.layer_mut(0).unwrap().set_data(&[2.0; 64], None);
    assert_eq!(chain.forward_all(), Some(2));
    assert_eq!(chain.layer(2).unwrap().outputs(), vec![2.0; 4]);
}

#[test]
fn test_missing_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    assert!(ChainConfig::from_file(dir.path().join("absent.json")).is_err());
}

#[test]
fn test_partial_update_propagates_changed_region() {
    let config = ChainConfig { layers: vec![layer(8, 8, Some(mean_filter())), layer(4, 4, None)] };
    let mut chain = ConvChain::from_config(&config).unwrap();
    chain.layer_mut(0).unwrap().set_data(&[1.0; 64], None);
    chain.forward_all().unwrap();

    let changed = Region::new([0, 0, 0, 0], Extent::plane(2, 2));
    chain.layer_mut(0).unwrap().set_data(&[5.0; 4], Some(&changed));
    let touched = chain.region_to_next(0, &changed).unwrap();
    assert_eq!(touched, Region::new([0, 0, 0, 0], Extent::plane(1, 1)));

    let result = chain.forward(0, Some(&changed), None, true).unwrap();
    assert_eq!(result.region(), touched);
    drop(result);

    let outputs = chain.layer(1).unwrap().outputs();
    assert_eq!(outputs[0], 5.0);
    assert!(outputs[1..].iter().all(|&v| v == 1.0));
}

#[test]
fn test_learn_install_and_reproduce() {
    let large_values: Vec<f32> = (0..64).map(|i| ((i * 7) % 10) as f32 / 10.0).collect();
    let large = Content::from_values("large", 1, Extent::plane(8, 8), &large_values);
    let small = large.decrease(0, 2).decrease(1, 2);

    let config = ChainConfig { layers: vec![layer(8, 8, None), layer(4, 4, None)] };
    let mut chain = ConvChain::from_config(&config).unwrap();
    large.write_to(chain.layer_mut(0).unwrap());
    small.write_to(chain.layer_mut(1).unwrap());

    let learning = LearningConfig::new(0.05, 300).fixed_rate();
    let learned = chain.learn_filter(0, &learning, None).unwrap();
    assert!(learned.last_error().unwrap() < learned.first_error().unwrap());
    chain.install_learned(0, learned).unwrap();

    chain.layer_mut(1).unwrap().clear();
    chain.forward_all().unwrap();
    for (p, s) in chain.layer(1).unwrap().outputs().iter().zip(small.values()) {
        assert!((p - s).abs() < 0.1, "predicted {} for {}", p, s);
    }
}
