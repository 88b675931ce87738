use std::path::Path;

use image::RgbImage;
use ndarray::prelude::*;
use ort::{session::Session, value::TensorRef};
use tracing::debug;

use crate::errors::Result;
use crate::imageops_ai;
use crate::models::{build_session, fixed_input_size, input_names, SessionOptions};
use crate::tensor::{image_to_tensor, tensor_to_image, ChannelOrder, Normalize};
use crate::traits::FaceRestorer;

pub const DEFAULT_FACE_SIZE: u32 = 512;

/// GFPGAN / RestoreFormer generator exported to ONNX.
///
/// The image input takes RGB in `[-1, 1]`. Exports that declare a second
/// input receive the restoration weight there; the GFPGAN generators
/// themselves do not use it.
pub struct Gfpgan {
    session: Session,
    image_input: String,
    weight_input: Option<String>,
    face_size: u32,
}

impl Gfpgan {
    pub fn new(model_path: &Path, options: &SessionOptions) -> Result<Self> {
        let session = build_session(model_path, options)?;
        let face_size = fixed_input_size(&session)
            .map(|(h, _)| h)
            .unwrap_or(DEFAULT_FACE_SIZE);
        let mut names = input_names(&session).into_iter();
        let image_input = names.next().unwrap_or_else(|| "input".to_string());
        let weight_input = names.next();
        debug!(face_size, ?weight_input, "loaded face restorer");

        Ok(Self {
            session,
            image_input,
            weight_input,
            face_size,
        })
    }
}

impl FaceRestorer for Gfpgan {
    fn face_size(&self) -> u32 {
        self.face_size
    }

    fn restore(&mut self, face: &RgbImage, weight: f32) -> Result<RgbImage> {
        let face = imageops_ai::resize(face, self.face_size, self.face_size);
        let tensor = image_to_tensor(&face, ChannelOrder::Rgb, Normalize::Symmetric);
        let weight = Array1::from_elem(1, weight);

        let outputs = match &self.weight_input {
            Some(weight_name) => self.session.run(ort::inputs![
                self.image_input.as_str() => TensorRef::from_array_view(&tensor)?,
                weight_name.as_str() => TensorRef::from_array_view(&weight)?,
            ])?,
            None => self.session.run(ort::inputs![
                self.image_input.as_str() => TensorRef::from_array_view(&tensor)?,
            ])?,
        };
        let restored = outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?;

        tensor_to_image(
            restored.index_axis(Axis(0), 0),
            ChannelOrder::Rgb,
            Normalize::Symmetric,
        )
    }
}
