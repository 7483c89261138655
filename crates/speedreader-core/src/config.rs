//! Pipeline configuration.
//!
//! Defaults follow the DBNet/SVTR conventions; the detection thresholds are
//! externalized because they may need calibration per model.

use serde::{Deserialize, Serialize};

/// Text-detection preprocessing and postprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Side length of the square inference canvas. Rounded up to a multiple
    /// of 32 (the detector's stride) by [`DetectionConfig::canvas_side`].
    pub target_side: u32,
    /// Threshold for binarizing the probability map.
    pub binarize_threshold: f32,
    /// Minimum mean probability inside a contour for the box to survive.
    pub box_threshold: f32,
    /// Outward expansion ratio compensating the detector's shrink-map training.
    pub unclip_ratio: f64,
    /// Minimum contour area, in canvas (model output) pixels.
    pub min_area: f64,
    /// Per-channel normalization mean (ImageNet convention).
    pub mean: [f32; 3],
    /// Per-channel normalization std (ImageNet convention).
    pub std: [f32; 3],
    /// Constant color used for the bottom-right letterbox padding.
    pub pad_color: [u8; 3],
    /// Dilate the binarized mask once before component extraction.
    pub use_dilation: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_side: 960,
            binarize_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_area: 16.0,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            pad_color: [0, 0, 0],
            use_dilation: true,
        }
    }
}

impl DetectionConfig {
    /// The effective canvas side: `target_side` rounded up to a multiple of 32.
    #[must_use]
    pub fn canvas_side(&self) -> u32 {
        self.target_side.div_ceil(32) * 32
    }
}

/// Text-recognition preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Fixed crop height fed to the recognizer; width preserves aspect ratio.
    pub crop_height: u32,
    /// Neutral color used when a crop must be padded.
    pub pad_color: [u8; 3],
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            crop_height: 48,
            pad_color: [127, 127, 127],
        }
    }
}

/// Inference engine selection. CPU-only in this repo; the variant keeps the
/// configuration explicit rather than probing at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineConfig {
    Cpu {
        /// Explicit OS CPU ids to pin workers to. `None` probes the machine
        /// topology (one primary thread per L2 cache).
        cores: Option<Vec<usize>>,
        /// Intra-op thread count handed to the kernel session.
        intra_op_threads: usize,
        /// Inter-op thread count handed to the kernel session.
        inter_op_threads: usize,
        /// Enable kernel-side profiling output.
        profiling: bool,
    },
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::Cpu {
            cores: None,
            intra_op_threads: 1,
            inter_op_threads: 1,
            profiling: false,
        }
    }
}

/// Dataflow fabric tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of each inter-stage channel.
    pub channel_capacity: usize,
    /// Max in-flight pages in the detection stage. `None` sizes to the
    /// engine's `current_max_capacity`.
    pub detect_parallelism: Option<usize>,
    /// Max in-flight regions in the recognition stage. `None` sizes to the
    /// engine's `current_max_capacity`.
    pub recognize_parallelism: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
            detect_parallelism: None,
            recognize_parallelism: None,
        }
    }
}
