use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::error;

use crate::errors::Result;

pub(crate) struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize) -> Self {
        let progress_bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        Self { progress_bar }
    }

    /// Run `process` over every path on the current rayon pool. Every path
    /// is attempted; results come back in input order.
    pub(crate) fn process_images<T, F>(&self, paths: &[PathBuf], process: F) -> Vec<Result<T>>
    where
        T: Send,
        F: Fn(&Path) -> Result<T> + Sync,
    {
        paths
            .par_iter()
            .map(|path| {
                let result = process(path.as_path());
                if let Err(e) = &result {
                    error!("Failed to process {}: {}", path.display(), e);
                }
                self.progress_bar.inc(1);
                result
            })
            .collect()
    }

    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }
}
