//! One-shot frame translation from the command line
//! Run with: cargo run --release --features ocr --bin translate_image -- <image_path> [target_language] [--detect-only]

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use overlay_translate::{
    Config, DetectionService, GeminiTranslator, ImageSource, Metrics, PaddleDetector, Pipeline,
    TranslationDispatcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("overlay_translate=info")
        .with_target(false)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let detect_only = args.iter().any(|a| a == "--detect-only");
    args.retain(|a| a != "--detect-only");

    let Some(image_path) = args.first().map(PathBuf::from) else {
        eprintln!("Usage: translate_image <image_path> [target_language] [--detect-only]");
        std::process::exit(2);
    };

    if !image_path.exists() {
        eprintln!("Image not found: {}", image_path.display());
        std::process::exit(1);
    }

    let config = Config::new().context("Failed to load configuration")?;
    let target_language = args.get(1).cloned().unwrap_or_else(|| config.target_language().to_string());

    info!("Initializing detector from: {}", config.detection.models_dir.display());
    let detector = PaddleDetector::new(&config.detection.models_dir, &config.detector_params().languages)?;
    let detection = DetectionService::new(detector, config.detector_params().clone());

    if detect_only {
        let image = overlay_translate::load_image(&ImageSource::from(image_path))?;
        let fragments = detection.detect(&image)?;

        println!("\n=== Fragments ===");
        if fragments.is_empty() {
            println!("  (none)");
        }
        for (i, fragment) in fragments.iter().enumerate() {
            let b = fragment.bbox;
            println!("  {}. [{}, {}, {}x{}] {}", i, b.x, b.y, b.width, b.height, fragment.text);
        }
        return Ok(());
    }

    let metrics = Metrics::new();
    let translator = GeminiTranslator::new(&config.api, Some(metrics.clone()))?;
    let pipeline = Pipeline::new(
        detection,
        TranslationDispatcher::new(translator).with_pairing(config.translation.pairing),
        target_language,
        metrics,
    );

    let output = pipeline.process(ImageSource::from(image_path), None).await?;

    println!("\n=== Translations ({}) ===", pipeline.target_language());
    println!(
        "Detections: {}, fragments: {}, detect {:.0}ms, translate {:.0}ms",
        output.detections, output.fragments, output.detection_time_ms, output.translation_time_ms
    );
    if output.translations.is_empty() {
        println!("  (none)");
    }
    for (i, translated) in output.translations.iter().enumerate() {
        let b = translated.bbox;
        println!("  {}. [{}, {}, {}x{}] {}", i, b.x, b.y, b.width, b.height, translated.text);
    }

    Ok(())
}
