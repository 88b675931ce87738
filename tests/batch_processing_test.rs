use std::fs;

use clap::Parser;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use gfpgan_rs::face_helper::face_template;
use gfpgan_rs::mocks::{MockFaceDetector, MockFaceRestorer};
use gfpgan_rs::{Config, DetectedFace, FaceEnhancer, ImageProcessor, RestoreError};

fn centred_face() -> DetectedFace {
    let template = face_template(64);
    DetectedFace {
        bbox: [18.0, 18.0, 82.0, 82.0],
        score: 0.99,
        landmarks: template.map(|[x, y]| [x + 18.0, y + 18.0]),
    }
}

#[test]
fn test_failures_do_not_stop_the_batch() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("inputs");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(&input)?;

    for i in 0..6 {
        RgbImage::from_pixel(100, 100, Rgb([40, 40, 40])).save(input.join(format!("img_{i}.png")))?;
    }
    // decodes as an image format by extension but not by content
    fs::write(input.join("broken.png"), b"definitely not a png")?;

    let config = Config::try_parse_from([
        "gfpgan-rs",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--workers",
        "3",
    ])?;
    let enhancers = (0..3)
        .map(|_| {
            FaceEnhancer::new(
                MockFaceDetector::new(vec![centred_face()]),
                MockFaceRestorer::new(64),
                None,
                2,
            )
        })
        .collect();
    let processor = ImageProcessor::new(enhancers, config)?;

    let result = processor.process_input();
    assert!(matches!(result, Err(RestoreError::ImageProcessing { .. })));

    // the healthy images were still written
    for i in 0..6 {
        assert!(output.join(format!("restored_imgs/img_{i}.png")).exists());
    }
    assert!(!output.join("restored_imgs/broken.png").exists());
    Ok(())
}

#[test]
fn test_restorer_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("face.png");
    RgbImage::from_pixel(100, 100, Rgb([40, 40, 40])).save(&input)?;

    let config = Config::try_parse_from([
        "gfpgan-rs",
        "-i",
        input.to_str().unwrap(),
        "-o",
        temp_dir.path().join("out").to_str().unwrap(),
        "--workers",
        "1",
    ])?;
    let enhancers = vec![FaceEnhancer::new(
        MockFaceDetector::new(vec![centred_face()]),
        MockFaceRestorer::failing(64),
        None,
        2,
    )];
    let processor = ImageProcessor::new(enhancers, config)?;

    let err = processor.process_input().unwrap_err();
    assert!(err.to_string().contains("restore"));
    Ok(())
}
