use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader, RgbImage};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;
use walkdir::WalkDir;

use crate::config::Config;
use crate::enhancer::{EnhanceOptions, Enhanced, FaceEnhancer};
use crate::errors::{RestoreError, Result};
use crate::imageops_ai::hconcat;
use crate::pool::ResourcePool;
use crate::progress_tracker::ProgressTracker;
use crate::traits::{FaceDetector, FaceRestorer};

pub const RESTORED_IMGS_DIR: &str = "restored_imgs";
pub const CROPPED_FACES_DIR: &str = "cropped_faces";
pub const RESTORED_FACES_DIR: &str = "restored_faces";
pub const CMP_DIR: &str = "cmp";

/// What happened to one input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Written(PathBuf),
    /// The enhancer produced no full image (aligned inputs).
    NoOutput,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub no_output: usize,
    pub failed: usize,
}

/// Restores a folder (or a single image) on a fixed-size worker pool. Each
/// worker thread borrows one enhancer per image.
pub struct ImageProcessor<D, R> {
    enhancers: ResourcePool<FaceEnhancer<D, R>>,
    thread_pool: ThreadPool,
    config: Config,
}

impl<D: FaceDetector, R: FaceRestorer> ImageProcessor<D, R> {
    /// One worker thread per enhancer.
    pub fn new(enhancers: Vec<FaceEnhancer<D, R>>, config: Config) -> Result<Self> {
        if enhancers.is_empty() {
            return Err(RestoreError::Validation {
                field: "workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(enhancers.len())
            .thread_name(|i| format!("restore-worker-{i}"))
            .build()
            .map_err(|e| RestoreError::Configuration {
                message: format!("failed to build worker pool: {e}"),
            })?;

        Ok(Self {
            enhancers: ResourcePool::new(enhancers),
            thread_pool,
            config,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.enhancers.capacity()
    }

    /// Restore everything under `config.input` into `config.output`.
    pub fn process_input(&self) -> Result<BatchSummary> {
        let image_paths = collect_inputs(&self.config.input)?;

        fs::create_dir_all(&self.config.output).map_err(|e| RestoreError::FileSystem {
            path: self.config.output.clone(),
            operation: "create output directory".to_string(),
            source: e,
        })?;

        if image_paths.is_empty() {
            info!("No images found in {}", self.config.input.display());
            return Ok(BatchSummary::default());
        }

        self.process_paths(&image_paths)
    }

    /// Every path is attempted; the first failure is returned after the
    /// whole batch has run.
    pub fn process_paths(&self, image_paths: &[PathBuf]) -> Result<BatchSummary> {
        let tracker = ProgressTracker::new(image_paths.len());
        let results = self.thread_pool.install(|| {
            tracker.process_images(image_paths, |path| self.process_single_image(path))
        });
        tracker.finish();

        let mut summary = BatchSummary::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(ImageOutcome::Written(_)) => summary.written += 1,
                Ok(ImageOutcome::NoOutput) => summary.no_output += 1,
                Err(e) => {
                    summary.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            "Processed {} images: {} written, {} without output, {} failed",
            image_paths.len(),
            summary.written,
            summary.no_output,
            summary.failed
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    pub fn process_single_image(&self, input_file: &Path) -> Result<ImageOutcome> {
        let name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Processing {name} ...");

        let image = read_image(input_file)?;
        let options = EnhanceOptions {
            has_aligned: self.config.aligned,
            only_center_face: self.config.only_center_face,
            paste_back: true,
            weight: self.config.weight,
        };

        let enhanced = {
            let mut enhancer = self.enhancers.acquire();
            enhancer
                .enhance(&image, options)
                .map_err(|e| RestoreError::image(input_file.display().to_string(), "restore", e))?
        };

        if self.config.save_faces {
            self.save_faces(input_file, &enhanced)?;
        }

        match enhanced.restored_img {
            Some(restored) => {
                let output_file = self.restored_path(input_file)?;
                save_image(&restored, &output_file)?;
                Ok(ImageOutcome::Written(output_file))
            }
            None => Ok(ImageOutcome::NoOutput),
        }
    }

    /// `<output>/restored_imgs/<stem>[_<suffix>].<ext>`
    pub fn restored_path(&self, input_file: &Path) -> Result<PathBuf> {
        let extension =
            self.config
                .output_extension(input_file)
                .ok_or_else(|| RestoreError::Validation {
                    field: "ext".to_string(),
                    reason: format!(
                        "cannot be `auto` for {} which has no extension",
                        input_file.display()
                    ),
                })?;
        let stem = file_stem(input_file);
        let file_name = match &self.config.suffix {
            Some(suffix) => format!("{stem}_{suffix}.{extension}"),
            None => format!("{stem}.{extension}"),
        };
        Ok(self
            .config
            .output
            .join(RESTORED_IMGS_DIR)
            .join(file_name))
    }

    fn save_faces(&self, input_file: &Path, enhanced: &Enhanced) -> Result<()> {
        let stem = file_stem(input_file);
        let output = &self.config.output;
        for (idx, (cropped, restored)) in enhanced
            .cropped_faces
            .iter()
            .zip(&enhanced.restored_faces)
            .enumerate()
        {
            let base = format!("{stem}_{idx:02}");
            let restored_name = match &self.config.suffix {
                Some(suffix) => format!("{base}_{suffix}.png"),
                None => format!("{base}.png"),
            };
            save_image(cropped, &output.join(CROPPED_FACES_DIR).join(format!("{base}.png")))?;
            save_image(restored, &output.join(RESTORED_FACES_DIR).join(restored_name))?;
            save_image(
                &hconcat(cropped, restored),
                &output.join(CMP_DIR).join(format!("{base}.png")),
            )?;
        }
        Ok(())
    }
}

/// A file is taken as is; a folder is listed (non-recursively, sorted) and
/// filtered to visible, recognised image files. Trailing separators on
/// `input` are ignored.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    let input: PathBuf = input.components().collect();
    let input = input.as_path();
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(RestoreError::FileSystem {
            path: input.to_path_buf(),
            operation: "read input".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "input is neither a file nor a directory",
            ),
        });
    }

    Ok(WalkDir::new(input)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_hidden(e))
        .filter(|e| is_supported_image_format(e.path()))
        .map(|e| e.into_path())
        .collect())
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

pub fn is_supported_image_format(path: &Path) -> bool {
    ImageFormat::from_path(path)
        .map(|format| format.reading_enabled())
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decode to 8-bit RGB; alpha is dropped and grayscale expanded.
fn read_image(path: &Path) -> Result<RgbImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| RestoreError::FileSystem {
            path: path.to_path_buf(),
            operation: "open image".to_string(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| RestoreError::FileSystem {
            path: path.to_path_buf(),
            operation: "detect image format".to_string(),
            source: e,
        })?;
    let image = reader
        .decode()
        .map_err(|e| RestoreError::image(path.display().to_string(), "decode image", e))?;
    Ok(image.into_rgb8())
}

fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RestoreError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create output directory".to_string(),
            source: e,
        })?;
    }
    image
        .save(path)
        .map_err(|e| RestoreError::image(path.display().to_string(), "save image", e))
}
