use std::path::Path;

use image::RgbImage;
use ndarray::prelude::*;
use ort::{session::Session, value::TensorRef};
use tracing::debug;

use crate::errors::{RestoreError, Result};
use crate::imageops_ai;
use crate::models::{build_session, fixed_input_size, SessionOptions};
use crate::tensor::{image_to_tensor, ChannelOrder, Normalize};
use crate::traits::{DetectedFace, FaceDetector};

const MEAN_BGR: [f32; 3] = [104.0, 117.0, 123.0];
const MIN_SIZES: [[f32; 2]; 3] = [[16.0, 32.0], [64.0, 128.0], [256.0, 512.0]];
const STEPS: [u32; 3] = [8, 16, 32];
const VARIANCE: [f32; 2] = [0.1, 0.2];

/// RetinaFace (ResNet-50) exported with `loc`, `conf` and `landms` outputs,
/// scores already softmaxed.
pub struct RetinaFace {
    session: Session,
    input_size: Option<(u32, u32)>,
    pub conf_threshold: f32,
    pub nms_threshold: f32,
}

impl RetinaFace {
    pub fn new(model_path: &Path, options: &SessionOptions) -> Result<Self> {
        let session = build_session(model_path, options)?;
        check_output_count(session.outputs.len())?;
        let input_size = fixed_input_size(&session);
        debug!(?input_size, "loaded face detector");
        Ok(Self {
            session,
            input_size,
            conf_threshold: 0.8,
            nms_threshold: 0.4,
        })
    }
}

impl FaceDetector for RetinaFace {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let (width, height) = image.dimensions();
        let resized = match self.input_size {
            Some((h, w)) => imageops_ai::resize(image, w, h),
            None => image.clone(),
        };
        let (in_w, in_h) = resized.dimensions();
        let scale = [width as f32 / in_w as f32, height as f32 / in_h as f32];
        let tensor = image_to_tensor(&resized, ChannelOrder::Bgr, Normalize::MeanSubtract(MEAN_BGR));

        let (conf_threshold, nms_threshold) = (self.conf_threshold, self.nms_threshold);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(&tensor)?])?;
        let loc = outputs[0].try_extract_array::<f32>()?.into_dimensionality::<Ix3>()?;
        let conf = outputs[1].try_extract_array::<f32>()?.into_dimensionality::<Ix3>()?;
        let landms = outputs[2].try_extract_array::<f32>()?.into_dimensionality::<Ix3>()?;

        let priors = prior_boxes(in_h, in_w);
        let faces = decode(
            loc.index_axis(Axis(0), 0),
            conf.index_axis(Axis(0), 0),
            landms.index_axis(Axis(0), 0),
            &priors,
            [in_w as f32, in_h as f32],
            scale,
            conf_threshold,
        )?;
        Ok(nms(faces, nms_threshold))
    }
}

/// `detect` reads `loc`, `conf` and `landms` by position.
fn check_output_count(count: usize) -> Result<()> {
    if count < 3 {
        return Err(RestoreError::model(
            "face detector loading",
            format!("expected loc, conf and landms outputs, the model has {count}"),
        ));
    }
    Ok(())
}

/// Anchor boxes `[cx, cy, w, h]`, normalised by the input size.
pub fn prior_boxes(height: u32, width: u32) -> Vec<[f32; 4]> {
    let mut anchors = Vec::new();
    for (min_sizes, step) in MIN_SIZES.iter().zip(STEPS) {
        let rows = height.div_ceil(step);
        let cols = width.div_ceil(step);
        for i in 0..rows {
            for j in 0..cols {
                for min_size in min_sizes {
                    anchors.push([
                        (j as f32 + 0.5) * step as f32 / width as f32,
                        (i as f32 + 0.5) * step as f32 / height as f32,
                        min_size / width as f32,
                        min_size / height as f32,
                    ]);
                }
            }
        }
    }
    anchors
}

/// Turn raw regressions into faces above `threshold`, in original image
/// coordinates.
pub fn decode(
    loc: ArrayView2<f32>,
    conf: ArrayView2<f32>,
    landms: ArrayView2<f32>,
    priors: &[[f32; 4]],
    input_size: [f32; 2],
    scale: [f32; 2],
    threshold: f32,
) -> Result<Vec<DetectedFace>> {
    let n = priors.len();
    if loc.dim() != (n, 4) || conf.dim() != (n, 2) || landms.dim() != (n, 10) {
        return Err(RestoreError::model(
            "face detection decoding",
            format!(
                "output shapes {:?} {:?} {:?} do not match {n} priors",
                loc.dim(),
                conf.dim(),
                landms.dim()
            ),
        ));
    }

    let [in_w, in_h] = input_size;
    let to_image = |x: f32, y: f32| [x * in_w * scale[0], y * in_h * scale[1]];

    let mut faces = Vec::new();
    for (i, [pcx, pcy, pw, ph]) in priors.iter().copied().enumerate() {
        let score = conf[[i, 1]];
        if score <= threshold {
            continue;
        }
        let cx = pcx + loc[[i, 0]] * VARIANCE[0] * pw;
        let cy = pcy + loc[[i, 1]] * VARIANCE[0] * ph;
        let w = pw * (loc[[i, 2]] * VARIANCE[1]).exp();
        let h = ph * (loc[[i, 3]] * VARIANCE[1]).exp();
        let [x1, y1] = to_image(cx - w / 2.0, cy - h / 2.0);
        let [x2, y2] = to_image(cx + w / 2.0, cy + h / 2.0);

        let mut landmarks = [[0.0f32; 2]; 5];
        for (k, point) in landmarks.iter_mut().enumerate() {
            let lx = pcx + landms[[i, 2 * k]] * VARIANCE[0] * pw;
            let ly = pcy + landms[[i, 2 * k + 1]] * VARIANCE[0] * ph;
            *point = to_image(lx, ly);
        }

        faces.push(DetectedFace {
            bbox: [x1, y1, x2, y2],
            score,
            landmarks,
        });
    }
    Ok(faces)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    // pixel-inclusive areas, as in the reference NMS
    let area = |r: &[f32; 4]| (r[2] - r[0] + 1.0).max(0.0) * (r[3] - r[1] + 1.0).max(0.0);
    let w = (a[2].min(b[2]) - a[0].max(b[0]) + 1.0).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1]) + 1.0).max(0.0);
    let inter = w * h;
    inter / (area(a) + area(b) - inter)
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(mut faces: Vec<DetectedFace>, threshold: f32) -> Vec<DetectedFace> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<DetectedFace> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept.iter().all(|k| iou(&k.bbox, &face.bbox) <= threshold) {
            kept.push(face);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(bbox: [f32; 4], score: f32) -> DetectedFace {
        DetectedFace {
            bbox,
            score,
            landmarks: [[0.0; 2]; 5],
        }
    }

    #[test]
    fn test_prior_count() {
        // 64x64: 8x8 + 4x4 + 2x2 cells, two anchors each
        let priors = prior_boxes(64, 64);
        assert_eq!(priors.len(), (64 + 16 + 4) * 2);
        assert_eq!(priors[0], [4.0 / 64.0, 4.0 / 64.0, 16.0 / 64.0, 16.0 / 64.0]);

        // non-multiples round up
        assert_eq!(prior_boxes(20, 20).len(), (9 + 4 + 1) * 2);
    }

    #[test]
    fn test_decode_zero_regression_returns_prior() {
        let priors = vec![[0.5, 0.5, 0.25, 0.25], [0.1, 0.1, 0.1, 0.1]];
        let loc = Array2::<f32>::zeros((2, 4));
        let conf = array![[0.05, 0.95], [0.9, 0.1]];
        let landms = Array2::<f32>::zeros((2, 10));

        let faces = decode(
            loc.view(),
            conf.view(),
            landms.view(),
            &priors,
            [100.0, 200.0],
            [2.0, 1.0],
            0.8,
        )
        .unwrap();

        assert_eq!(faces.len(), 1);
        let f = &faces[0];
        assert_eq!(f.score, 0.95);
        assert_eq!(f.bbox, [75.0, 75.0, 125.0, 125.0]);
        assert_eq!(f.landmarks[2], [100.0, 100.0]);
    }

    #[test]
    fn test_decode_rejects_shape_mismatch() {
        let priors = vec![[0.5, 0.5, 0.25, 0.25]];
        let loc = Array2::<f32>::zeros((2, 4));
        let conf = Array2::<f32>::zeros((2, 2));
        let landms = Array2::<f32>::zeros((2, 10));
        let result = decode(
            loc.view(),
            conf.view(),
            landms.view(),
            &priors,
            [10.0, 10.0],
            [1.0, 1.0],
            0.5,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let faces = vec![
            face([0.0, 0.0, 10.0, 10.0], 0.85),
            face([1.0, 1.0, 11.0, 11.0], 0.99),
            face([50.0, 50.0, 60.0, 60.0], 0.9),
        ];
        let kept = nms(faces, 0.4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.99);
        assert_eq!(kept[1].score, 0.9);
    }

    #[test]
    fn test_detector_needs_three_outputs() {
        assert!(check_output_count(3).is_ok());
        assert!(matches!(
            check_output_count(2),
            Err(RestoreError::Model { .. })
        ));
    }
}
