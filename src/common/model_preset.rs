use serde::{Deserialize, Serialize};

use crate::anchors::AnchorConfig;
use crate::coder::BoxCoder;
use crate::head::PostprocessConfig;

const RATIOS_2: &[f32] = &[2., 0.5];
const RATIOS_2_3: &[f32] = &[2., 3., 0.5, 1. / 3.];

/// The detector configurations this crate knows how to assemble.
///
/// A closed registry: each variant resolves to its anchor grid, box coder
/// and post-processing defaults through named constructors, so an unknown
/// configuration is a compile error rather than a failed string lookup.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelPreset {
    /// Classic 300x300 VGG16-backed SSD.
    Ssd300Vgg16,

    /// 320x320 MobileNetV3-backed SSDLite.
    #[default]
    SsdLite320MobileNetV3,
}

impl ModelPreset {
    pub fn name(&self) -> String {
        match self {
            Self::Ssd300Vgg16 => "ssd300_vgg16".to_string(),
            Self::SsdLite320MobileNetV3 => "ssdlite320_mobilenet_v3_large".to_string(),
        }
    }

    pub fn from_name(name: &str) -> Option<ModelPreset> {
        match name.to_lowercase().as_str() {
            "ssd300_vgg16" => Some(ModelPreset::Ssd300Vgg16),
            "ssdlite320_mobilenet_v3_large" => Some(ModelPreset::SsdLite320MobileNetV3),
            _ => None,
        }
    }

    /// Expected input resolution as `(width, height)`.
    pub fn input_size(&self) -> (u32, u32) {
        match self {
            Self::Ssd300Vgg16 => (300, 300),
            Self::SsdLite320MobileNetV3 => (320, 320),
        }
    }

    /// Anchor grid for this preset. Ratio lists spell out the reciprocals,
    /// one rectangle per listed ratio.
    pub fn anchor_config(&self) -> AnchorConfig {
        match self {
            Self::Ssd300Vgg16 => AnchorConfig::new()
                .with_feature_maps(&[(38, 38), (19, 19), (10, 10), (5, 5), (3, 3), (1, 1)])
                .with_aspect_ratios(&[
                    RATIOS_2, RATIOS_2_3, RATIOS_2_3, RATIOS_2_3, RATIOS_2, RATIOS_2,
                ])
                .with_scale_range(0.2, 0.9),
            Self::SsdLite320MobileNetV3 => AnchorConfig::new()
                .with_feature_maps(&[(20, 20), (10, 10), (5, 5), (3, 3), (2, 2), (1, 1)])
                .with_aspect_ratios(&[RATIOS_2_3; 6])
                .with_scale_range(0.2, 0.95),
        }
    }

    /// Both presets regress against SSD coder weights.
    pub fn coder(&self) -> BoxCoder {
        BoxCoder::ssd()
    }

    pub fn postprocess_defaults(&self) -> PostprocessConfig {
        match self {
            Self::Ssd300Vgg16 => PostprocessConfig::new()
                .with_score_threshold(0.01)
                .with_iou_threshold(0.45)
                .with_topk_candidates(400)
                .with_detections_per_image(200),
            Self::SsdLite320MobileNetV3 => PostprocessConfig::new()
                .with_score_threshold(0.001)
                .with_iou_threshold(0.55)
                .with_topk_candidates(300)
                .with_detections_per_image(300),
        }
    }
}
