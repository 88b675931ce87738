pub mod config;
pub mod enhancer;
pub mod errors;
pub mod face_helper;
pub mod image_processor;
pub mod imageops_ai;
pub mod models;
pub mod pool;
mod progress_tracker;
pub mod tensor;
pub mod traits;
pub mod weights;

pub mod mocks;

use tracing::{info, warn};

pub use config::{BgUpsampler, Config};
pub use enhancer::{EnhanceOptions, Enhanced, FaceEnhancer};
pub use errors::{RestoreError, Result};
pub use image_processor::{BatchSummary, ImageOutcome, ImageProcessor};
pub use traits::*;
pub use weights::{ModelVersion, WeightResolver};

use models::{Gfpgan, RealEsrgan, RetinaFace, SessionOptions, TilingConfig};

/// Native scale of the RealESRGAN_x2plus generator.
const BG_UPSAMPLER_SCALE: u32 = 2;

/// Model files one worker needs.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: std::path::PathBuf,
    pub restorer: std::path::PathBuf,
    pub bg_upsampler: Option<std::path::PathBuf>,
}

impl ModelPaths {
    /// Resolve every model the configuration asks for. The background
    /// upsampler is dropped when no GPU can run it.
    pub fn resolve(config: &Config) -> Result<Self> {
        let resolver = WeightResolver::new(&config.weights_dir);
        let restorer =
            resolver.resolve_or(config.model_path.as_deref(), &config.version.weights())?;
        let detector = resolver.resolve(&weights::RETINAFACE)?;

        let bg_upsampler = match config.bg_upsampler {
            BgUpsampler::Realesrgan if !config.aligned => {
                if models::gpu_available() {
                    Some(resolver.resolve(&weights::REALESRGAN_X2)?)
                } else {
                    warn!(
                        "The unoptimized RealESRGAN is slow on CPU. We do not use it. \
                         If you really want to use it, please run with a CUDA device available."
                    );
                    None
                }
            }
            _ => None,
        };

        Ok(Self {
            detector,
            restorer,
            bg_upsampler,
        })
    }
}

/// Build one complete ONNX-backed enhancer; every worker gets its own.
pub fn build_enhancer(
    config: &Config,
    paths: &ModelPaths,
    options: &SessionOptions,
) -> Result<FaceEnhancer<RetinaFace, Gfpgan>> {
    let detector = RetinaFace::new(&paths.detector, options)?;
    let restorer = Gfpgan::new(&paths.restorer, options)?;
    let bg_upsampler = match &paths.bg_upsampler {
        Some(path) => {
            let tiling = TilingConfig {
                tile: config.bg_tile,
                ..TilingConfig::default()
            };
            let upsampler = RealEsrgan::new(path, BG_UPSAMPLER_SCALE, tiling, options)?;
            Some(Box::new(upsampler) as Box<dyn BackgroundUpsampler>)
        }
        None => None,
    };
    Ok(FaceEnhancer::new(detector, restorer, bg_upsampler, config.upscale))
}

impl ImageProcessor<RetinaFace, Gfpgan> {
    pub fn with_onnx_models(config: Config) -> Result<Self> {
        let version = config.version;
        info!(
            "Restorer {} (version {version}, arch: {}, channel multiplier: {})",
            version.model_name(),
            version.arch(),
            version.channel_multiplier()
        );

        let paths = ModelPaths::resolve(&config)?;
        info!(
            "Models: restorer {}, detector {}, background upsampler {}",
            paths.restorer.display(),
            paths.detector.display(),
            paths
                .bg_upsampler
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let options = SessionOptions {
            device_id: config.device_id,
            intra_threads: config.intra_threads(),
        };
        let enhancers = (0..config.workers)
            .map(|_| build_enhancer(&config, &paths, &options))
            .collect::<Result<Vec<_>>>()?;

        Self::new(enhancers, config)
    }
}
