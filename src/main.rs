use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use gfpgan_rs::{Config, ImageProcessor};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,gfpgan_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();
    let processor =
        ImageProcessor::with_onnx_models(config).context("Failed to set up the restorer")?;

    let start = Instant::now();
    let summary = processor
        .process_input()
        .context("Face restoration failed")?;

    info!(
        "Inference time in multiprocessing: {:.3}s ({} images written)",
        start.elapsed().as_secs_f64(),
        summary.written
    );

    Ok(())
}
