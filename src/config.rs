use clap::{Parser, ValueEnum};
use image::ImageFormat;
use std::path::{Path, PathBuf};

use crate::weights::ModelVersion;

#[derive(Parser, Clone, Debug)]
#[command(about, long_about = None, disable_version_flag = true)]
pub struct Config {
    /// Input image or folder
    #[arg(short, long, default_value = "inputs/whole_imgs")]
    pub input: PathBuf,

    /// Output folder
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// Restorer model version. Option: 1 | 1.2 | 1.3 | 1.4 | RestoreFormer
    #[arg(short, long, default_value = "1.3")]
    pub version: ModelVersion,

    /// The final upsampling scale of the image
    #[arg(short = 's', long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub upscale: u32,

    /// Background upsampler
    #[arg(long = "bg_upsampler", value_enum, default_value_t = BgUpsampler::Realesrgan)]
    pub bg_upsampler: BgUpsampler,

    /// Tile size for the background upsampler, 0 for no tile
    #[arg(long = "bg_tile", default_value_t = 400)]
    pub bg_tile: u32,

    /// Suffix of the restored faces
    #[arg(long)]
    pub suffix: Option<String>,

    /// Only restore the center face
    #[arg(long = "only_center_face")]
    pub only_center_face: bool,

    /// Input are aligned faces
    #[arg(long)]
    pub aligned: bool,

    /// Image extension. auto | jpg | png | ..., auto keeps the input extension
    #[arg(long, default_value = "auto", value_parser = check_ext)]
    pub ext: String,

    /// Adjustable weights
    #[arg(short, long, default_value_t = 0.5)]
    pub weight: f32,

    /// Number of images restored in parallel
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: u32,

    #[arg(long = "device_id", default_value_t = 0)]
    pub device_id: i32,

    /// Explicit restorer model, bypasses the version lookup
    #[arg(long = "model_path")]
    pub model_path: Option<PathBuf>,

    /// Extra directories searched for model files
    #[arg(long = "weights_dir")]
    pub weights_dir: Vec<PathBuf>,

    /// Also save cropped faces, restored faces and comparisons
    #[arg(long = "save_faces")]
    pub save_faces: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BgUpsampler {
    Realesrgan,
    None,
}

impl Config {
    /// Output extension for an input file; `None` when `auto` meets an
    /// extensionless input.
    pub fn output_extension<'a>(&'a self, input: &'a Path) -> Option<&'a str> {
        if self.ext == "auto" {
            input.extension().and_then(|ext| ext.to_str())
        } else {
            Some(self.ext.as_str())
        }
    }

    /// ONNX Runtime intra-op threads per session so that all workers together
    /// roughly fill the machine.
    pub fn intra_threads(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores / self.workers as usize).max(1)
    }
}

fn check_ext(s: &str) -> Result<String, String> {
    if s == "auto" {
        return Ok(s.to_string());
    }

    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: `auto`, {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}
