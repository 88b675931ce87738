//! Face selection, alignment and paste-back around the restorer.

use image::{Rgb, RgbImage};

use crate::errors::{RestoreError, Result};
use crate::imageops_ai::{
    affine::warp_affine,
    mask::{composite, PasteMask},
    Affine,
};
use crate::traits::{DetectedFace, Landmarks5};

/// FFHQ landmark positions in a 512×512 crop.
pub const FACE_TEMPLATE_512: Landmarks5 = [
    [192.98138, 239.94708],
    [318.90277, 240.1936],
    [256.63416, 314.01935],
    [201.26117, 371.41043],
    [313.08905, 371.15118],
];

pub const EYE_DIST_THRESHOLD: f32 = 5.0;

/// Fill for crop regions outside the source image.
pub const BORDER_VALUE: Rgb<u8> = Rgb([135, 133, 132]);

/// Drop faces too small to restore and optionally keep only the one nearest
/// the image centre.
pub fn select_faces(
    mut faces: Vec<DetectedFace>,
    width: u32,
    height: u32,
    only_center_face: bool,
) -> Vec<DetectedFace> {
    faces.retain(|face| face.eye_distance() >= EYE_DIST_THRESHOLD);
    if !only_center_face || faces.len() <= 1 {
        return faces;
    }

    let center = [width as f32 / 2.0, height as f32 / 2.0];
    let distance = |face: &DetectedFace| {
        let [cx, cy] = face.center();
        (cx - center[0]).powi(2) + (cy - center[1]).powi(2)
    };
    faces
        .into_iter()
        .min_by(|a, b| distance(a).total_cmp(&distance(b)))
        .into_iter()
        .collect()
}

/// The template scaled to a `face_size` crop.
pub fn face_template(face_size: u32) -> Landmarks5 {
    let ratio = face_size as f32 / 512.0;
    FACE_TEMPLATE_512.map(|[x, y]| [x * ratio, y * ratio])
}

/// A face cropped out of the input together with the transform used.
pub struct AlignedFace {
    pub crop: RgbImage,
    pub affine: Affine,
}

pub fn align_face(image: &RgbImage, landmarks: &Landmarks5, face_size: u32) -> Result<AlignedFace> {
    let template = face_template(face_size);
    let affine = Affine::estimate_similarity(landmarks, &template).ok_or_else(|| {
        RestoreError::model("face alignment", "degenerate landmarks")
    })?;
    let crop = warp_affine(image, &affine, face_size, face_size, BORDER_VALUE)
        .ok_or_else(|| RestoreError::model("face alignment", "singular transform"))?;
    Ok(AlignedFace { crop, affine })
}

/// Map a crop-to-image transform onto the image upscaled by `upscale`.
pub fn inverse_affine(affine: &Affine, upscale: u32) -> Result<Affine> {
    let inverse = affine
        .invert()
        .ok_or_else(|| RestoreError::model("paste back", "singular alignment transform"))?;
    let scaled = inverse.scaled(upscale as f32);
    if upscale > 1 {
        let offset = 0.5 * upscale as f32;
        Ok(scaled.translated(offset, offset))
    } else {
        Ok(scaled)
    }
}

/// Paste restored faces into `background` (already `upscale`× the input) and
/// return it.
pub fn paste_faces(
    mut background: RgbImage,
    faces: &[(RgbImage, Affine)],
    upscale: u32,
) -> Result<RgbImage> {
    let (width, height) = background.dimensions();
    for (face, affine) in faces {
        let inverse = inverse_affine(affine, upscale)?;
        let warped = warp_affine(face, &inverse, width, height, Rgb([0, 0, 0]))
            .ok_or_else(|| RestoreError::model("paste back", "singular inverse transform"))?;
        let mask = PasteMask::new(face.dimensions(), &inverse, width, height, upscale)
            .ok_or_else(|| RestoreError::model("paste back", "singular inverse transform"))?;
        composite(&mut background, &warped, &mask)
            .ok_or_else(|| RestoreError::model("paste back", "mask size mismatch"))?;
    }
    Ok(background)
}

/// `(width·upscale, height·upscale)`, rejecting sizes that do not fit `u32`.
pub fn upscaled_size(width: u32, height: u32, upscale: u32) -> Result<(u32, u32)> {
    match (width.checked_mul(upscale), height.checked_mul(upscale)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(RestoreError::Validation {
            field: "upscale".to_string(),
            reason: format!("{upscale} is too large for a {width}x{height} image"),
        }),
    }
}
