use ndarray::Array3;

use ssd_detect::anchors::{AnchorConfig, AnchorSet};
use ssd_detect::coder::BoxCoder;
use ssd_detect::common::ModelPreset;
use ssd_detect::head::{
    ClassificationHead, PostprocessConfig, RegressionHead, SsdHead, SsdPipeline,
};
use ssd_detect::{init_pipeline, run_detection, DetectError};

const NUM_CLASSES: usize = 3;

fn two_level_anchors() -> AnchorSet {
    AnchorConfig::new()
        .with_feature_maps(&[(2, 2), (1, 1)])
        .with_aspect_ratios(&[&[1.], &[1.]])
        .with_scale_range(0.2, 0.9)
        .build()
        .unwrap()
}

/// Stand-in for the external network: every regression output is zero, so
/// decoded boxes coincide with their anchors.
struct ZeroRegression;

impl RegressionHead for ZeroRegression {
    fn forward(&self, _features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>> {
        Ok(vec![Array3::zeros((8, 2, 2)), Array3::zeros((8, 1, 1))])
    }
}

/// Scripted logits: background everywhere, except the first level-0 anchor
/// votes class 1 and the first level-1 anchor votes class 2.
struct ScriptedClassification;

impl ClassificationHead for ScriptedClassification {
    fn forward(&self, _features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>> {
        let mut level0 = Array3::zeros((2 * NUM_CLASSES, 2, 2));
        let mut level1 = Array3::zeros((2 * NUM_CLASSES, 1, 1));

        for j in 0..2 {
            for i in 0..2 {
                level0[[0, j, i]] = 4.;
                level0[[NUM_CLASSES, j, i]] = 4.;
            }
        }
        level0[[1, 0, 0]] = 9.;

        level1[[0, 0, 0]] = 4.;
        level1[[NUM_CLASSES, 0, 0]] = 4.;
        level1[[2, 0, 0]] = 8.;

        Ok(vec![level0, level1])
    }
}

fn test_config() -> PostprocessConfig {
    PostprocessConfig::new()
        .with_score_threshold(0.5)
        .with_iou_threshold(0.5)
}

#[test]
fn scripted_head_yields_the_expected_detections() {
    let anchors = two_level_anchors();
    let head = SsdHead::new(ZeroRegression, ScriptedClassification, NUM_CLASSES);

    let features = vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 1, 1))];
    let candidates = head.forward(&features, &anchors).unwrap();
    assert_eq!(candidates.num_candidates(), anchors.len());
    assert_eq!(candidates.num_classes(), NUM_CLASSES);

    let pipeline = SsdPipeline::new(anchors, BoxCoder::ssd(), test_config());
    let detections = run_detection(&pipeline, &candidates, (320, 320)).unwrap();

    assert_eq!(detections.len(), 2);

    // The level-0 vote carries the larger logit, so class 1 comes first.
    let class1_score = 9f32.exp() / (9f32.exp() + 4f32.exp() + 1.);
    let class2_score = 8f32.exp() / (8f32.exp() + 4f32.exp() + 1.);
    assert!((detections[0].score - class1_score).abs() < 1e-5);
    assert!((detections[1].score - class2_score).abs() < 1e-5);

    assert_eq!(detections[0].class_id, 1);
    let (x1, y1, x2, y2) = detections[0].bbox.xyxy();
    assert!((x1 - 48.).abs() < 1e-3);
    assert!((y1 - 48.).abs() < 1e-3);
    assert!((x2 - 112.).abs() < 1e-3);
    assert!((y2 - 112.).abs() < 1e-3);

    assert_eq!(detections[1].class_id, 2);
    let (x1, y1, x2, y2) = detections[1].bbox.xyxy();
    assert!((x1 - 16.).abs() < 1e-3);
    assert!((x2 - 304.).abs() < 1e-3);
    assert!((y1 - 16.).abs() < 1e-3);
    assert!((y2 - 304.).abs() < 1e-3);
}

#[test]
fn batch_postprocessing_matches_the_single_image_path() {
    let anchors = two_level_anchors();
    let head = SsdHead::new(ZeroRegression, ScriptedClassification, NUM_CLASSES);

    let features = vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 1, 1))];
    let candidates = head.forward(&features, &anchors).unwrap();

    let pipeline = SsdPipeline::new(anchors, BoxCoder::ssd(), test_config());
    let single = pipeline.detect(&candidates, (320, 320)).unwrap();
    let batch = pipeline
        .detect_batch(
            &[candidates.clone(), candidates.clone()],
            &[(320, 320), (320, 320)],
        )
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], single);
    assert_eq!(batch[1], single);
}

struct BadChannelClassification;

impl ClassificationHead for BadChannelClassification {
    fn forward(&self, _features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>> {
        Ok(vec![Array3::zeros((5, 2, 2)), Array3::zeros((6, 1, 1))])
    }
}

#[test]
fn channel_contract_violations_are_reported_with_the_level() {
    let anchors = two_level_anchors();
    let head = SsdHead::new(ZeroRegression, BadChannelClassification, NUM_CLASSES);

    let features = vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 1, 1))];
    let err = head.forward(&features, &anchors).unwrap_err();

    match err.downcast_ref::<DetectError>() {
        Some(DetectError::ChannelMismatch {
            level,
            expected,
            got,
            ..
        }) => {
            assert_eq!(*level, 0);
            assert_eq!(*expected, 6);
            assert_eq!(*got, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

struct MissingLevelRegression;

impl RegressionHead for MissingLevelRegression {
    fn forward(&self, _features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>> {
        Ok(vec![Array3::zeros((8, 2, 2))])
    }
}

#[test]
fn level_count_violations_are_rejected() {
    let anchors = two_level_anchors();
    let head = SsdHead::new(MissingLevelRegression, ScriptedClassification, NUM_CLASSES);

    let features = vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 1, 1))];
    let err = head.forward(&features, &anchors).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DetectError>(),
        Some(DetectError::LevelCount {
            expected: 2,
            got: 1
        })
    ));
}

struct WrongSizeRegression;

impl RegressionHead for WrongSizeRegression {
    fn forward(&self, _features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>> {
        Ok(vec![Array3::zeros((8, 3, 3)), Array3::zeros((8, 1, 1))])
    }
}

#[test]
fn map_size_violations_are_rejected() {
    let anchors = two_level_anchors();
    let head = SsdHead::new(WrongSizeRegression, ScriptedClassification, NUM_CLASSES);

    let features = vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 1, 1))];
    let err = head.forward(&features, &anchors).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DetectError>(),
        Some(DetectError::MapSize { level: 0, .. })
    ));
}

#[test]
fn preset_pipelines_initialize() {
    let pipeline = init_pipeline(ModelPreset::SsdLite320MobileNetV3).unwrap();
    assert_eq!(pipeline.anchors().len(), 2695);
    assert_eq!(pipeline.config().iou_threshold, 0.55);

    let ssd300 = init_pipeline(ModelPreset::Ssd300Vgg16).unwrap();
    assert_eq!(ssd300.anchors().num_levels(), 6);
    // 3 anchors per cell on the first level, 5 on the middle ones.
    assert_eq!(ssd300.anchors().level_counts()[0], 3 * 38 * 38);
    assert_eq!(ssd300.anchors().level_counts()[1], 5 * 19 * 19);
}
