use std::path::Path;

use image::{imageops, RgbImage};
use ndarray::prelude::*;
use ort::{session::Session, value::TensorRef};

use crate::errors::{RestoreError, Result};
use crate::face_helper::upscaled_size;
use crate::imageops_ai::{self, padding::pad_to_multiple, padding::pad_reflect};
use crate::models::{build_session, SessionOptions};
use crate::tensor::{image_to_tensor, tensor_to_image, ChannelOrder, Normalize};
use crate::traits::BackgroundUpsampler;

/// Tiling bounds memory on large inputs. `tile == 0` runs the whole image
/// at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingConfig {
    pub tile: u32,
    pub tile_pad: u32,
    pub pre_pad: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile: 400,
            tile_pad: 10,
            pre_pad: 0,
        }
    }
}

/// RealESRGAN generator; RGB in `[0, 1]` in and out.
pub struct RealEsrgan {
    session: Session,
    scale: u32,
    tiling: TilingConfig,
}

impl RealEsrgan {
    pub fn new(
        model_path: &Path,
        scale: u32,
        tiling: TilingConfig,
        options: &SessionOptions,
    ) -> Result<Self> {
        Ok(Self {
            session: build_session(model_path, options)?,
            scale,
            tiling,
        })
    }

    fn infer_raw(&mut self, image: &RgbImage) -> Result<RgbImage> {
        let tensor = image_to_tensor(image, ChannelOrder::Rgb, Normalize::Unit);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(&tensor)?])?;
        let out = outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?;
        tensor_to_image(out.index_axis(Axis(0), 0), ChannelOrder::Rgb, Normalize::Unit)
    }
}

impl BackgroundUpsampler for RealEsrgan {
    fn upsample(&mut self, image: &RgbImage, outscale: f32) -> Result<RgbImage> {
        let (scale, tiling) = (self.scale, self.tiling);
        upsample_with(image, scale, tiling, outscale, |input| self.infer_raw(input))
    }
}

/// Pre-pad, pad to the generator's multiple, run `infer` (tiled when
/// `tiling.tile > 0`), crop back to `scale`× the input and resize to
/// `outscale` when it differs from `scale`.
pub fn upsample_with<F>(
    image: &RgbImage,
    scale: u32,
    tiling: TilingConfig,
    outscale: f32,
    mut infer: F,
) -> Result<RgbImage>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    let (width, height) = image.dimensions();
    let (out_w, out_h) = upscaled_size(width, height, scale)?;

    let padded = if tiling.pre_pad > 0 {
        pad_reflect(image, tiling.pre_pad, tiling.pre_pad)
    } else {
        image.clone()
    };
    // x2 and x1 generators pixel-unshuffle their input
    let (padded, _, _) = match scale {
        2 => pad_to_multiple(&padded, 2),
        1 => pad_to_multiple(&padded, 4),
        _ => (padded, 0, 0),
    };

    let output = if tiling.tile == 0 {
        infer(&padded)?
    } else {
        process_tiles(&padded, tiling.tile, tiling.tile_pad, scale, &mut infer)?
    };

    if output.width() < out_w || output.height() < out_h {
        return Err(RestoreError::model(
            "background upsampling",
            format!(
                "output {}x{} is smaller than {out_w}x{out_h}",
                output.width(),
                output.height()
            ),
        ));
    }
    let output = imageops::crop_imm(&output, 0, 0, out_w, out_h).to_image();

    if (outscale - scale as f32).abs() > f32::EPSILON {
        let target_w = ((width as f32 * outscale) as u32).max(1);
        let target_h = ((height as f32 * outscale) as u32).max(1);
        Ok(imageops_ai::resize(&output, target_w, target_h))
    } else {
        Ok(output)
    }
}

/// Run `infer` over `tile`-sized blocks with `tile_pad` context on each side
/// and stitch the upscaled centres back together.
pub fn process_tiles<F>(
    image: &RgbImage,
    tile: u32,
    tile_pad: u32,
    scale: u32,
    mut infer: F,
) -> Result<RgbImage>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    let (width, height) = image.dimensions();
    let (canvas_w, canvas_h) = upscaled_size(width, height, scale)?;
    let mut canvas = RgbImage::new(canvas_w, canvas_h);

    for y0 in (0..height).step_by(tile as usize) {
        let y1 = (y0 + tile).min(height);
        let y0p = y0.saturating_sub(tile_pad);
        let y1p = (y1 + tile_pad).min(height);

        for x0 in (0..width).step_by(tile as usize) {
            let x1 = (x0 + tile).min(width);
            let x0p = x0.saturating_sub(tile_pad);
            let x1p = (x1 + tile_pad).min(width);

            let input = imageops::crop_imm(image, x0p, y0p, x1p - x0p, y1p - y0p).to_image();
            let output = infer(&input)?;
            let expected = ((x1p - x0p) * scale, (y1p - y0p) * scale);
            if output.dimensions() != expected {
                return Err(RestoreError::model(
                    "tiled upsampling",
                    format!(
                        "tile output {:?} does not match expected {:?}",
                        output.dimensions(),
                        expected
                    ),
                ));
            }

            let centre = imageops::crop_imm(
                &output,
                (x0 - x0p) * scale,
                (y0 - y0p) * scale,
                (x1 - x0) * scale,
                (y1 - y0) * scale,
            )
            .to_image();
            imageops::replace(&mut canvas, &centre, (x0 * scale) as i64, (y0 * scale) as i64);
        }
    }

    Ok(canvas)
}
