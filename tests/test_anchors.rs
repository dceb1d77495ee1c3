use ssd_detect::anchors::AnchorConfig;
use ssd_detect::common::ModelPreset;
use ssd_detect::DetectError;

fn two_level_config() -> AnchorConfig {
    AnchorConfig::new()
        .with_feature_maps(&[(2, 2), (1, 1)])
        .with_aspect_ratios(&[&[1.], &[1.]])
        .with_scale_range(0.2, 0.9)
}

#[test]
fn two_level_grid_counts() {
    let anchors = two_level_config().build().unwrap();

    // 2 anchors per cell, 4 cells on level 0 and 1 cell on level 1.
    assert_eq!(anchors.len(), 10);
    assert_eq!(anchors.level_counts(), &[8, 2]);
    assert_eq!(anchors.anchors_per_location(), &[2, 2]);
    assert_eq!(anchors.level_range(1), 8..10);
}

#[test]
fn scales_interpolate_linearly() {
    let config = two_level_config();
    let scales = config.scales();
    assert!((scales[0] - 0.2).abs() < 1e-6);
    assert!((scales[1] - 0.9).abs() < 1e-6);

    let six = ModelPreset::SsdLite320MobileNetV3.anchor_config().scales();
    let expected = [0.2, 0.35, 0.5, 0.65, 0.8, 0.95];
    for (s, e) in six.iter().zip(expected.iter()) {
        assert!((s - e).abs() < 1e-5);
    }
}

#[test]
fn emission_order_is_level_major_row_major_square_first() {
    let anchors = two_level_config().build().unwrap();
    let boxes = anchors.boxes();

    // First cell of level 0: the square then the ratio-1 rectangle.
    assert_eq!(boxes[[0, 0]], 0.25);
    assert_eq!(boxes[[0, 1]], 0.25);
    assert!((boxes[[0, 2]] - 0.2).abs() < 1e-6);
    assert!((boxes[[0, 3]] - 0.2).abs() < 1e-6);
    assert_eq!(boxes[[1, 0]], 0.25);

    // Second cell walks the row before the column moves.
    assert_eq!(boxes[[2, 0]], 0.75);
    assert_eq!(boxes[[2, 1]], 0.25);
    assert_eq!(boxes[[4, 0]], 0.25);
    assert_eq!(boxes[[4, 1]], 0.75);

    // Level 1 sits after every level 0 anchor.
    assert_eq!(boxes[[8, 0]], 0.5);
    assert_eq!(boxes[[8, 1]], 0.5);
    assert!((boxes[[8, 2]] - 0.9).abs() < 1e-6);
}

#[test]
fn generation_is_deterministic() {
    let a = two_level_config().build().unwrap();
    let b = two_level_config().build().unwrap();
    assert_eq!(a, b);
}

#[test]
fn empty_ratio_list_still_emits_the_square() {
    let anchors = AnchorConfig::new()
        .with_feature_maps(&[(3, 3)])
        .with_aspect_ratios(&[&[]])
        .with_scale_range(0.4, 0.4)
        .build()
        .unwrap();

    assert_eq!(anchors.len(), 9);
    assert_eq!(anchors.anchors_per_location(), &[1]);
}

#[test]
fn aspect_ratios_shape_the_rectangle() {
    let anchors = AnchorConfig::new()
        .with_feature_maps(&[(1, 1)])
        .with_aspect_ratios(&[&[2.]])
        .with_scale_range(0.5, 0.5)
        .build()
        .unwrap();

    let boxes = anchors.boxes();
    let (w, h) = (boxes[[1, 2]], boxes[[1, 3]]);
    assert!((w / h - 2.).abs() < 1e-5);
    // Area is preserved by the sqrt split.
    assert!((w * h - 0.25).abs() < 1e-5);
}

#[test]
fn ssdlite_preset_anchor_count() {
    let anchors = ModelPreset::SsdLite320MobileNetV3
        .anchor_config()
        .build()
        .unwrap();

    // 5 anchors per location over 20^2 + 10^2 + 5^2 + 3^2 + 2^2 + 1 cells.
    assert_eq!(anchors.num_levels(), 6);
    assert_eq!(anchors.len(), 5 * (400 + 100 + 25 + 9 + 4 + 1));
    assert_eq!(anchors.level_counts()[0], 2000);
}

#[test]
fn bad_configurations_are_rejected() {
    let mismatched = AnchorConfig::new()
        .with_feature_maps(&[(2, 2), (1, 1)])
        .with_aspect_ratios(&[&[1.]]);
    assert!(matches!(
        mismatched.build(),
        Err(DetectError::AnchorConfig(_))
    ));

    let inverted = AnchorConfig::new()
        .with_feature_maps(&[(2, 2)])
        .with_aspect_ratios(&[&[1.]])
        .with_scale_range(0.9, 0.2);
    assert!(inverted.build().is_err());

    assert!(AnchorConfig::new().build().is_err());
}

#[test]
fn preset_registry_resolves_by_name() {
    let preset = ModelPreset::from_name("ssdlite320_mobilenet_v3_large").unwrap();
    assert_eq!(preset, ModelPreset::SsdLite320MobileNetV3);
    assert_eq!(preset.input_size(), (320, 320));
    assert!(ModelPreset::from_name("resnet50_frcnn").is_none());
}
