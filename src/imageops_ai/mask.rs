use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_erode, Mask};

use crate::imageops_ai::affine::{warp_affine, Affine};

/// Masks used to paste one restored face back into the full image.
pub struct PasteMask {
    /// Eroded footprint of the face; pixels outside it never come from the face.
    pub hard: GrayImage,
    /// Feathered blend weights inside the footprint.
    pub soft: GrayImage,
}

impl PasteMask {
    /// Build the masks for a `face_size` crop mapped into a `width`×`height`
    /// canvas by `inverse`. Returns `None` for a singular transform.
    pub fn new(
        face_size: (u32, u32),
        inverse: &Affine,
        width: u32,
        height: u32,
        upscale: u32,
    ) -> Option<Self> {
        let full = GrayImage::from_pixel(face_size.0, face_size.1, Luma([255]));
        let warped = warp_affine(&full, inverse, width, height, Luma([0]))?;
        let hard = erode_box(&warped, 2 * upscale);

        let area: f64 = hard.pixels().map(|p| p[0] as f64 / 255.0).sum();
        let w_edge = (area.sqrt() as u32) / 20;
        let center = erode_box(&hard, 2 * w_edge);
        let soft = if w_edge > 0 {
            // sigma OpenCV derives for a (2·w_edge + 1) kernel
            let sigma = 0.3 * (w_edge as f32 - 1.0) + 0.8;
            gaussian_blur_f32(&center, sigma.max(0.1))
        } else {
            center
        };

        Some(Self { hard, soft })
    }
}

/// Erode with a `side`×`side` box anchored at `side / 2`, the way OpenCV
/// applies `np.ones((side, side))`. Even sides reach one pixel further up
/// and left than down and right.
fn erode_box(mask: &GrayImage, side: u32) -> GrayImage {
    if side <= 1 {
        return mask.clone();
    }
    // `Mask` offsets are limited to 255 either way
    let side = side.min(510);
    let anchor = (side / 2) as u8;
    let row = Mask::from_image(&GrayImage::from_pixel(side, 1, Luma([255])), anchor, 0);
    let column = Mask::from_image(&GrayImage::from_pixel(1, side, Luma([255])), 0, anchor);
    grayscale_erode(&grayscale_erode(mask, &row), &column)
}

/// `base = soft·(hard·face) + (1 − soft)·base`, all masks scaled to `[0, 1]`.
pub fn composite(base: &mut RgbImage, face: &RgbImage, mask: &PasteMask) -> Option<()> {
    let dims = base.dimensions();
    if face.dimensions() != dims || mask.hard.dimensions() != dims || mask.soft.dimensions() != dims
    {
        return None;
    }

    for (((dst, src), hard), soft) in base
        .pixels_mut()
        .zip(face.pixels())
        .zip(mask.hard.pixels())
        .zip(mask.soft.pixels())
    {
        let soft = soft[0] as f32 / 255.0;
        if soft == 0.0 {
            continue;
        }
        let hard = hard[0] as f32 / 255.0;
        let Rgb(face_px) = *src;
        let Rgb(base_px) = *dst;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = soft * hard * face_px[c] as f32 + (1.0 - soft) * base_px[c] as f32;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        *dst = Rgb(out);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_stays_inside_face_footprint() {
        let inverse = Affine::IDENTITY.translated(20.0, 20.0);
        let mask = PasteMask::new((64, 64), &inverse, 128, 128, 2).unwrap();

        assert_eq!(mask.hard.dimensions(), (128, 128));
        assert_eq!(mask.soft.dimensions(), (128, 128));
        // far outside the face
        assert_eq!(mask.hard.get_pixel(5, 5)[0], 0);
        assert_eq!(mask.soft.get_pixel(5, 5)[0], 0);
        // centre of the face
        assert_eq!(mask.hard.get_pixel(52, 52)[0], 255);
        assert!(mask.soft.get_pixel(52, 52)[0] > 200);
        // the soft mask fades out before the hard edge
        assert!(mask.soft.get_pixel(23, 52)[0] < mask.soft.get_pixel(52, 52)[0]);
    }

    #[test]
    fn test_even_box_erosion() {
        let mut square = GrayImage::new(20, 20);
        for y in 5..15 {
            for x in 5..15 {
                square.put_pixel(x, y, Luma([255]));
            }
        }

        let eroded = erode_box(&square, 4);
        let kept = eroded.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(kept, 7 * 7);
        assert_eq!(eroded.get_pixel(10, 10)[0], 255);
        assert_eq!(eroded.get_pixel(5, 5)[0], 0);

        assert_eq!(erode_box(&square, 0), square);
    }

    #[test]
    fn test_composite_blends_inside_mask_only() {
        let mut base = RgbImage::from_pixel(4, 1, Rgb([0, 0, 0]));
        let face = RgbImage::from_pixel(4, 1, Rgb([200, 200, 200]));
        let hard = GrayImage::from_raw(4, 1, vec![0, 255, 255, 255]).unwrap();
        let soft = GrayImage::from_raw(4, 1, vec![0, 0, 255, 128]).unwrap();
        composite(&mut base, &face, &PasteMask { hard, soft }).unwrap();

        assert_eq!(base.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(base.get_pixel(1, 0), &Rgb([0, 0, 0]));
        assert_eq!(base.get_pixel(2, 0), &Rgb([200, 200, 200]));
        assert_eq!(base.get_pixel(3, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn test_composite_rejects_mismatched_sizes() {
        let mut base = RgbImage::new(4, 4);
        let face = RgbImage::new(3, 4);
        let mask = PasteMask {
            hard: GrayImage::new(4, 4),
            soft: GrayImage::new(4, 4),
        };
        assert!(composite(&mut base, &face, &mask).is_none());
    }
}
