pub mod affine;
pub mod mask;
pub mod padding;

pub use affine::Affine;

use image::{imageops, imageops::FilterType, RgbImage};

/// Resize with the filter used everywhere in the pipeline.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Place two images side by side, top aligned.
pub fn hconcat(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width() as i64, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_hconcat() {
        let left = RgbImage::from_pixel(4, 3, Rgb([255, 0, 0]));
        let right = RgbImage::from_pixel(2, 5, Rgb([0, 0, 255]));
        let joined = hconcat(&left, &right);

        assert_eq!(joined.dimensions(), (6, 5));
        assert_eq!(joined.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(joined.get_pixel(5, 4), &Rgb([0, 0, 255]));
        assert_eq!(joined.get_pixel(0, 4), &Rgb([0, 0, 0]));
    }
}
