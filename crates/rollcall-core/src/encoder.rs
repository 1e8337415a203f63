//! External face-encoder capability.
//!
//! The core never runs detection or embedding itself; it consumes
//! fixed-length vectors from whatever model sits behind this trait.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("encoder unavailable: {0}")]
    Unavailable(String),
    #[error("encoder failed: {0}")]
    Failed(String),
}

/// Pixel region of a detected face. Carried through for logging;
/// matching only ever looks at the embedding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// One detected face: where it was found and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub region: FaceRegion,
    pub embedding: Embedding,
}

/// Capability that turns a decoded image into zero or more face
/// detections, one embedding per detected face. An image with no
/// detectable face yields an empty vector, not an error.
pub trait FaceEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<Detection>, EncoderError>;
}
