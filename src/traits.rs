use crate::errors::Result;
use image::RgbImage;

/// Five facial landmarks: left eye, right eye, nose, left and right mouth corner.
pub type Landmarks5 = [[f32; 2]; 5];

/// One detection in input image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
    pub score: f32,
    pub landmarks: Landmarks5,
}

impl DetectedFace {
    pub fn center(&self) -> [f32; 2] {
        let [x1, y1, x2, y2] = self.bbox;
        [(x1 + x2) / 2.0, (y1 + y2) / 2.0]
    }

    pub fn eye_distance(&self) -> f32 {
        let [left, right] = [self.landmarks[0], self.landmarks[1]];
        ((left[0] - right[0]).powi(2) + (left[1] - right[1]).powi(2)).sqrt()
    }
}

/// Finds faces and their landmarks.
pub trait FaceDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>>;
}

/// Restores an aligned face crop.
pub trait FaceRestorer: Send {
    /// Side length of the square crops the restorer consumes and produces.
    fn face_size(&self) -> u32;

    fn restore(&mut self, face: &RgbImage, weight: f32) -> Result<RgbImage>;
}

/// Super-resolves the whole image underneath the pasted faces.
pub trait BackgroundUpsampler: Send {
    /// Upsample so the output is `outscale` times the input size.
    fn upsample(&mut self, image: &RgbImage, outscale: f32) -> Result<RgbImage>;
}
