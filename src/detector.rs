use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// One detected object, in source-image pixel coordinates.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub class_id: usize,
    /// In [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Detections for a single input image.
#[derive(Debug, Clone, Default)]
pub struct ImageResult {
    pub boxes: Vec<RawDetection>,
}

/// One prediction call: which image, how confident a detection must be to be
/// kept, and where to persist the annotated copy (`<project>/<name>/`).
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub source: PathBuf,
    pub conf: f32,
    pub save: bool,
    pub project: PathBuf,
    pub name: String,
}

/// The detection model, one result per input image. The request handler only
/// depends on this seam; tests substitute a stub.
pub trait Detector: Send + Sync {
    fn predict(&self, request: &PredictRequest) -> Result<Vec<ImageResult>, DetectError>;

    /// Class id to human label. Ids absent from the table are rendered as
    /// `Class <id>` downstream.
    fn names(&self) -> &HashMap<usize, String>;
}
