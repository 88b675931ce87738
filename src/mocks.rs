use std::sync::Arc;

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use parking_lot::Mutex;

use crate::errors::{RestoreError, Result};
use crate::traits::{BackgroundUpsampler, DetectedFace, FaceDetector, FaceRestorer};

/// Detector returning a fixed set of faces for every image.
#[derive(Debug, Clone)]
pub struct MockFaceDetector {
    pub faces: Vec<DetectedFace>,
}

impl MockFaceDetector {
    pub const fn new(faces: Vec<DetectedFace>) -> Self {
        Self { faces }
    }
}

impl FaceDetector for MockFaceDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<DetectedFace>> {
        Ok(self.faces.clone())
    }
}

/// Restorer that inverts the crop so pasted faces are easy to spot.
#[derive(Debug, Clone)]
pub struct MockFaceRestorer {
    pub face_size: u32,
    pub fail: bool,
}

impl MockFaceRestorer {
    pub const fn new(face_size: u32) -> Self {
        Self {
            face_size,
            fail: false,
        }
    }

    pub const fn failing(face_size: u32) -> Self {
        Self {
            face_size,
            fail: true,
        }
    }
}

impl FaceRestorer for MockFaceRestorer {
    fn face_size(&self) -> u32 {
        self.face_size
    }

    fn restore(&mut self, face: &RgbImage, _weight: f32) -> Result<RgbImage> {
        if self.fail {
            return Err(RestoreError::model("mock restoration", "configured to fail"));
        }
        let mut face = imageops::resize(face, self.face_size, self.face_size, FilterType::Nearest);
        for Rgb(px) in face.pixels_mut() {
            *px = px.map(|v| 255 - v);
        }
        Ok(face)
    }
}

/// Nearest-neighbour upsampler that counts its calls.
#[derive(Debug, Clone, Default)]
pub struct MockUpsampler {
    calls: Arc<Mutex<usize>>,
}

impl MockUpsampler {
    pub fn calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

impl BackgroundUpsampler for MockUpsampler {
    fn upsample(&mut self, image: &RgbImage, outscale: f32) -> Result<RgbImage> {
        *self.calls.lock() += 1;
        let width = (image.width() as f32 * outscale) as u32;
        let height = (image.height() as f32 * outscale) as u32;
        Ok(imageops::resize(image, width, height, FilterType::Nearest))
    }
}
