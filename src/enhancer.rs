use image::RgbImage;
use tracing::debug;

use crate::errors::Result;
use crate::face_helper::{align_face, paste_faces, select_faces, upscaled_size};
use crate::imageops_ai;
use crate::traits::{BackgroundUpsampler, FaceDetector, FaceRestorer};

#[derive(Debug, Clone, Copy)]
pub struct EnhanceOptions {
    pub has_aligned: bool,
    pub only_center_face: bool,
    pub paste_back: bool,
    pub weight: f32,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            has_aligned: false,
            only_center_face: false,
            paste_back: true,
            weight: 0.5,
        }
    }
}

/// Result of one `enhance` call.
#[derive(Debug, Default)]
pub struct Enhanced {
    pub cropped_faces: Vec<RgbImage>,
    pub restored_faces: Vec<RgbImage>,
    pub restored_img: Option<RgbImage>,
}

/// Detect, align, restore and paste back faces, with an optional
/// super-resolved background.
pub struct FaceEnhancer<D, R> {
    detector: D,
    restorer: R,
    bg_upsampler: Option<Box<dyn BackgroundUpsampler>>,
    upscale: u32,
}

impl<D: FaceDetector, R: FaceRestorer> FaceEnhancer<D, R> {
    pub fn new(
        detector: D,
        restorer: R,
        bg_upsampler: Option<Box<dyn BackgroundUpsampler>>,
        upscale: u32,
    ) -> Self {
        Self {
            detector,
            restorer,
            bg_upsampler,
            upscale: upscale.max(1),
        }
    }

    pub fn enhance(&mut self, image: &RgbImage, options: EnhanceOptions) -> Result<Enhanced> {
        let face_size = self.restorer.face_size();

        if options.has_aligned {
            let face = imageops_ai::resize(image, face_size, face_size);
            let restored = self.restorer.restore(&face, options.weight)?;
            return Ok(Enhanced {
                cropped_faces: vec![face],
                restored_faces: vec![restored],
                restored_img: None,
            });
        }

        let (width, height) = image.dimensions();
        let (out_w, out_h) = upscaled_size(width, height, self.upscale)?;
        let detections = self.detector.detect(image)?;
        let faces = select_faces(detections, width, height, options.only_center_face);
        debug!(faces = faces.len(), "detected faces");

        let mut enhanced = Enhanced::default();
        let mut pasted = Vec::with_capacity(faces.len());
        for face in &faces {
            let aligned = align_face(image, &face.landmarks, face_size)?;
            let restored = self.restorer.restore(&aligned.crop, options.weight)?;
            enhanced.cropped_faces.push(aligned.crop);
            enhanced.restored_faces.push(restored.clone());
            pasted.push((restored, aligned.affine));
        }

        if options.paste_back {
            let background = match self.bg_upsampler.as_mut() {
                Some(upsampler) => {
                    let upsampled = upsampler.upsample(image, self.upscale as f32)?;
                    imageops_ai::resize(&upsampled, out_w, out_h)
                }
                None => imageops_ai::resize(image, out_w, out_h),
            };
            enhanced.restored_img = Some(paste_faces(background, &pasted, self.upscale)?);
        }

        Ok(enhanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RestoreError;
    use crate::face_helper::face_template;
    use crate::mocks::{MockFaceDetector, MockFaceRestorer, MockUpsampler};
    use crate::traits::DetectedFace;
    use image::Rgb;

    fn centred_face(size: u32) -> DetectedFace {
        let template = face_template(128);
        let offset = (size as f32 - 128.0) / 2.0;
        DetectedFace {
            bbox: [offset, offset, offset + 128.0, offset + 128.0],
            score: 0.99,
            landmarks: template.map(|[x, y]| [x + offset, y + offset]),
        }
    }

    #[test]
    fn test_aligned_input_is_restored_directly() {
        let mut enhancer = FaceEnhancer::new(
            MockFaceDetector::new(vec![]),
            MockFaceRestorer::new(128),
            None,
            2,
        );
        let image = RgbImage::from_pixel(100, 100, Rgb([50, 60, 70]));
        let options = EnhanceOptions {
            has_aligned: true,
            ..Default::default()
        };

        let enhanced = enhancer.enhance(&image, options).unwrap();
        assert_eq!(enhanced.cropped_faces.len(), 1);
        assert_eq!(enhanced.cropped_faces[0].dimensions(), (128, 128));
        assert!(enhanced.restored_img.is_none());
        let restored = &enhanced.restored_faces[0];
        assert_eq!(restored.dimensions(), (128, 128));
        assert_eq!(restored.get_pixel(10, 10), &Rgb([205, 195, 185]));
    }

    #[test]
    fn test_no_faces_still_upscales() {
        let mut enhancer = FaceEnhancer::new(
            MockFaceDetector::new(vec![]),
            MockFaceRestorer::new(128),
            None,
            3,
        );
        let image = RgbImage::from_pixel(40, 30, Rgb([1, 2, 3]));

        let enhanced = enhancer.enhance(&image, EnhanceOptions::default()).unwrap();
        assert!(enhanced.restored_faces.is_empty());
        assert_eq!(enhanced.restored_img.unwrap().dimensions(), (120, 90));
    }

    #[test]
    fn test_faces_restored_and_pasted_over_upsampled_background() {
        let size = 200;
        let upsampler = MockUpsampler::default();
        let calls = upsampler.calls();
        let mut enhancer = FaceEnhancer::new(
            MockFaceDetector::new(vec![centred_face(size)]),
            MockFaceRestorer::new(128),
            Some(Box::new(upsampler)),
            2,
        );
        let image = RgbImage::from_pixel(size, size, Rgb([20, 20, 20]));

        let enhanced = enhancer.enhance(&image, EnhanceOptions::default()).unwrap();
        assert_eq!(enhanced.cropped_faces.len(), 1);
        assert_eq!(enhanced.restored_faces.len(), 1);
        assert_eq!(*calls.lock(), 1);

        let restored = enhanced.restored_img.unwrap();
        assert_eq!(restored.dimensions(), (400, 400));
        // background untouched, face centre inverted by the mock restorer
        assert_eq!(restored.get_pixel(2, 2), &Rgb([20, 20, 20]));
        assert!(restored.get_pixel(200, 220)[0] > 200);
    }

    #[test]
    fn test_overflowing_upscale_is_rejected() {
        let mut enhancer = FaceEnhancer::new(
            MockFaceDetector::new(vec![]),
            MockFaceRestorer::new(128),
            None,
            u32::MAX / 2,
        );
        let image = RgbImage::new(40, 30);

        let result = enhancer.enhance(&image, EnhanceOptions::default());
        assert!(matches!(result, Err(RestoreError::Validation { .. })));
    }

    #[test]
    fn test_without_paste_back() {
        let mut enhancer = FaceEnhancer::new(
            MockFaceDetector::new(vec![centred_face(200)]),
            MockFaceRestorer::new(128),
            None,
            2,
        );
        let image = RgbImage::from_pixel(200, 200, Rgb([20, 20, 20]));
        let options = EnhanceOptions {
            paste_back: false,
            ..Default::default()
        };

        let enhanced = enhancer.enhance(&image, options).unwrap();
        assert_eq!(enhanced.restored_faces.len(), 1);
        assert!(enhanced.restored_img.is_none());
    }
}
