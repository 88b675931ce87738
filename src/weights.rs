use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{RestoreError, Result};

/// Directories searched for model files when no explicit path is given.
pub const DEFAULT_WEIGHT_DIRS: [&str; 2] = ["experiments/pretrained_models", "gfpgan/weights"];

pub const MODEL_EXTENSION: &str = "onnx";

/// Generator architecture behind a restorer checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Original,
    Clean,
    RestoreFormer,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Arch::Original => "original",
            Arch::Clean => "clean",
            Arch::RestoreFormer => "RestoreFormer",
        };
        f.write_str(name)
    }
}

/// Restorer release selected with `--version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVersion {
    V1,
    V1_2,
    V1_3,
    V1_4,
    RestoreFormer,
}

impl ModelVersion {
    pub const fn arch(self) -> Arch {
        match self {
            ModelVersion::V1 => Arch::Original,
            ModelVersion::RestoreFormer => Arch::RestoreFormer,
            _ => Arch::Clean,
        }
    }

    pub const fn channel_multiplier(self) -> u32 {
        match self {
            ModelVersion::V1 => 1,
            _ => 2,
        }
    }

    pub const fn model_name(self) -> &'static str {
        match self {
            ModelVersion::V1 => "GFPGANv1",
            ModelVersion::V1_2 => "GFPGANCleanv1-NoCE-C2",
            ModelVersion::V1_3 => "GFPGANv1.3",
            ModelVersion::V1_4 => "GFPGANv1.4",
            ModelVersion::RestoreFormer => "RestoreFormer",
        }
    }

    pub const fn url(self) -> &'static str {
        match self {
            ModelVersion::V1 => {
                "https://github.com/TencentARC/GFPGAN/releases/download/v0.1.0/GFPGANv1.pth"
            }
            ModelVersion::V1_2 => {
                "https://github.com/TencentARC/GFPGAN/releases/download/v0.2.0/GFPGANCleanv1-NoCE-C2.pth"
            }
            ModelVersion::V1_3 => {
                "https://github.com/TencentARC/GFPGAN/releases/download/v1.3.0/GFPGANv1.3.pth"
            }
            ModelVersion::V1_4 => {
                "https://github.com/TencentARC/GFPGAN/releases/download/v1.3.0/GFPGANv1.4.pth"
            }
            ModelVersion::RestoreFormer => {
                "https://github.com/TencentARC/GFPGAN/releases/download/v1.3.4/RestoreFormer.pth"
            }
        }
    }

    pub const fn weights(self) -> Weights {
        Weights {
            name: self.model_name(),
            url: self.url(),
        }
    }
}

impl FromStr for ModelVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" => Ok(ModelVersion::V1),
            "1.2" => Ok(ModelVersion::V1_2),
            "1.3" => Ok(ModelVersion::V1_3),
            "1.4" => Ok(ModelVersion::V1_4),
            "RestoreFormer" => Ok(ModelVersion::RestoreFormer),
            _ => Err(format!(
                "Wrong model version {s}. Option: 1 | 1.2 | 1.3 | 1.4 | RestoreFormer"
            )),
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = match self {
            ModelVersion::V1 => "1",
            ModelVersion::V1_2 => "1.2",
            ModelVersion::V1_3 => "1.3",
            ModelVersion::V1_4 => "1.4",
            ModelVersion::RestoreFormer => "RestoreFormer",
        };
        f.write_str(version)
    }
}

/// A named set of weights and where upstream publishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub name: &'static str,
    pub url: &'static str,
}

pub const RETINAFACE: Weights = Weights {
    name: "detection_Resnet50_Final",
    url: "https://github.com/xinntao/facexlib/releases/download/v0.1.0/detection_Resnet50_Final.pth",
};

pub const REALESRGAN_X2: Weights = Weights {
    name: "RealESRGAN_x2plus",
    url: "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.2.1/RealESRGAN_x2plus.pth",
};

/// Looks up model files in an ordered list of directories.
#[derive(Debug, Clone)]
pub struct WeightResolver {
    search_dirs: Vec<PathBuf>,
}

impl Default for WeightResolver {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl WeightResolver {
    /// User directories are searched before the defaults.
    pub fn new(extra_dirs: &[PathBuf]) -> Self {
        let search_dirs = extra_dirs
            .iter()
            .cloned()
            .chain(DEFAULT_WEIGHT_DIRS.iter().map(PathBuf::from))
            .collect();
        Self { search_dirs }
    }

    pub fn candidates(&self, weights: &Weights) -> Vec<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(format!("{}.{}", weights.name, MODEL_EXTENSION)))
            .collect()
    }

    pub fn resolve(&self, weights: &Weights) -> Result<PathBuf> {
        let candidates = self.candidates(weights);
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(RestoreError::ModelNotFound {
                name: weights.name.to_string(),
                url: weights.url.to_string(),
                searched: candidates,
            }),
        }
    }

    /// An explicit path wins over the search, but must exist.
    pub fn resolve_or(&self, explicit: Option<&Path>, weights: &Weights) -> Result<PathBuf> {
        match explicit {
            Some(path) if path.is_file() => Ok(path.to_path_buf()),
            Some(path) => Err(RestoreError::ModelNotFound {
                name: weights.name.to_string(),
                url: weights.url.to_string(),
                searched: vec![path.to_path_buf()],
            }),
            None => self.resolve(weights),
        }
    }
}
