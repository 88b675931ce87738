use image::{Rgb, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::errors::{RestoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Normalisation applied per channel value when building a tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalize {
    /// `v / 255`
    Unit,
    /// `(v / 255 − 0.5) / 0.5`
    Symmetric,
    /// `v − mean[c]`, mean given in tensor channel order
    MeanSubtract([f32; 3]),
}

impl Normalize {
    fn apply(self, value: u8, channel: usize) -> f32 {
        let v = value as f32;
        match self {
            Normalize::Unit => v / 255.0,
            Normalize::Symmetric => (v / 255.0 - 0.5) / 0.5,
            Normalize::MeanSubtract(mean) => v - mean[channel],
        }
    }

    fn invert(self, value: f32, channel: usize) -> f32 {
        match self {
            Normalize::Unit => value * 255.0,
            Normalize::Symmetric => (value.clamp(-1.0, 1.0) + 1.0) / 2.0 * 255.0,
            Normalize::MeanSubtract(mean) => value + mean[channel],
        }
    }
}

/// `1×3×H×W` tensor from an 8-bit RGB image.
pub fn image_to_tensor(image: &RgbImage, order: ChannelOrder, norm: Normalize) -> Array4<f32> {
    let chw = image.as_ndarray3();
    let (_, h, w) = chw.dim();
    Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        let source = match order {
            ChannelOrder::Rgb => c,
            ChannelOrder::Bgr => 2 - c,
        };
        norm.apply(chw[[source, y, x]], c)
    })
}

/// Inverse of [`image_to_tensor`] for one `3×H×W` slice.
pub fn tensor_to_image(
    tensor: ArrayView3<f32>,
    order: ChannelOrder,
    norm: Normalize,
) -> Result<RgbImage> {
    let (c, h, w) = tensor.dim();
    if c != 3 {
        return Err(RestoreError::model(
            "output tensor conversion",
            format!("expected 3 channels, got {c}"),
        ));
    }
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let mut px = [0u8; 3];
        for (channel, value) in px.iter_mut().enumerate() {
            let source = match order {
                ChannelOrder::Rgb => channel,
                ChannelOrder::Bgr => 2 - channel,
            };
            *value = to_u8(norm.invert(tensor[[source, y, x]], source));
        }
        Rgb(px)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_mean_subtract() {
        let image = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        let tensor = image_to_tensor(
            &image,
            ChannelOrder::Bgr,
            Normalize::MeanSubtract([104.0, 117.0, 123.0]),
        );
        assert_eq!(tensor.dim(), (1, 3, 1, 2));
        assert_eq!(tensor[[0, 0, 0, 1]], 30.0 - 104.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 10.0 - 123.0);
    }

    #[test]
    fn test_symmetric_output_is_clamped() {
        let mut tensor = Array3::<f32>::zeros((3, 1, 2));
        tensor[[0, 0, 0]] = 1.0;
        tensor[[1, 0, 0]] = -1.0;
        tensor[[2, 0, 0]] = 3.0;
        let image = tensor_to_image(tensor.view(), ChannelOrder::Rgb, Normalize::Symmetric).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_wrong_channel_count() {
        let tensor = Array3::<f32>::zeros((1, 4, 4));
        assert!(tensor_to_image(tensor.view(), ChannelOrder::Rgb, Normalize::Unit).is_err());
    }
}
