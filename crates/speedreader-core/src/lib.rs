//! Shared data model for the SpeedReader OCR service.
//!
//! Every other crate in the workspace speaks the types defined here: images,
//! geometry (axis-aligned and rotated rectangles, polygons), recognized
//! words, per-page results, configuration and the common [`OcrError`].

pub mod config;
pub mod error;
pub mod geometry;
pub mod image;
pub mod json;
pub mod result;

pub use config::{DetectionConfig, EngineConfig, PipelineConfig, RecognitionConfig};
pub use error::OcrError;
pub use geometry::{
    normalize_angle, AxisAlignedRectangle, BoundingBox, Point, Polygon, RotatedRectangle,
};
pub use image::Image;
pub use json::OcrJsonResult;
pub use result::{OcrResult, PageContext, Word};
