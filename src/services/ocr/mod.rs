// PaddleOCR text detector backend
//
// Model files (shared detection model plus a per-script recognition model and
// charset) are resolved from a models directory. The engine itself is only
// compiled with the `ocr` feature since it links the native MNN runtime.

use std::path::{Path, PathBuf};

use crate::core::errors::{DetectionError, DetectionResult};

/// Detection model shared by every script
pub const DETECTION_MODEL: &str = "PP-OCRv5_mobile_det.mnn";

/// (script, language codes, recognition model, charset)
const SCRIPT_MODELS: &[(&str, &[&str], &str, &str)] = &[
    (
        "chinese",
        &["zh", "ch", "ch_sim", "ch_tra", "ja", "chinese"],
        "PP-OCRv5_mobile_rec.mnn",
        "ppocr_keys_v5.txt",
    ),
    (
        "english",
        &["en", "english"],
        "en_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_en.txt",
    ),
    (
        "korean",
        &["ko", "korean"],
        "korean_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_korean.txt",
    ),
    (
        "arabic",
        &["ar", "fa", "ur", "arabic"],
        "arabic_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_arabic.txt",
    ),
    (
        "cyrillic",
        &["ru", "uk", "be", "bg", "sr", "mn", "cyrillic"],
        "cyrillic_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_cyrillic.txt",
    ),
    (
        "devanagari",
        &["hi", "mr", "ne", "devanagari"],
        "devanagari_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_devanagari.txt",
    ),
    (
        "latin",
        &["fr", "de", "es", "it", "pt", "nl", "pl", "sv", "tr", "vi", "latin"],
        "latin_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_latin.txt",
    ),
    (
        "greek",
        &["el", "greek"],
        "el_PP-OCRv5_mobile_rec_infer.mnn",
        "ppocr_keys_el.txt",
    ),
    ("thai", &["th", "thai"], "th_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_th.txt"),
    ("tamil", &["ta", "tamil"], "ta_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_ta.txt"),
    ("telugu", &["te", "telugu"], "te_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_te.txt"),
];

/// Script family whose recognition model covers `language`
pub fn script_for_language(language: &str) -> Option<&'static str> {
    let language = language.trim().to_lowercase();
    SCRIPT_MODELS
        .iter()
        .find(|(_, codes, _, _)| codes.contains(&language.as_str()))
        .map(|(script, _, _, _)| *script)
}

/// Paths to the three files the engine needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub script: &'static str,
    pub detection: PathBuf,
    pub recognition: PathBuf,
    pub charset: PathBuf,
}

impl ModelFiles {
    /// Resolve model files for the first supported entry of `languages`.
    ///
    /// Unknown language codes are skipped; if none is known the English model is
    /// used. Every resolved file must exist.
    pub fn resolve(models_dir: &Path, languages: &[String]) -> DetectionResult<Self> {
        let script = languages
            .iter()
            .find_map(|language| script_for_language(language))
            .unwrap_or("english");

        let (_, _, rec_model, charset) = SCRIPT_MODELS
            .iter()
            .find(|(name, _, _, _)| *name == script)
            .copied()
            .ok_or_else(|| DetectionError::Backend(format!("no model table entry for {}", script)))?;

        let files = Self {
            script,
            detection: models_dir.join(DETECTION_MODEL),
            recognition: models_dir.join(rec_model),
            charset: models_dir.join(charset),
        };

        for path in [&files.detection, &files.recognition, &files.charset] {
            if !path.exists() {
                return Err(DetectionError::ModelNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        Ok(files)
    }
}

#[cfg(feature = "ocr")]
pub use engine::PaddleDetector;

#[cfg(feature = "ocr")]
mod engine {
    use image::DynamicImage;
    use ocr_rs::OcrEngine;
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::{debug, info};

    use super::ModelFiles;
    use crate::core::config::DetectorParams;
    use crate::core::errors::{DetectionError, DetectionResult};
    use crate::core::types::{Detection, Quad};
    use crate::services::detection::TextDetector;

    /// `TextDetector` backed by the `ocr-rs` PaddleOCR engine.
    ///
    /// Paragraph grouping, decoding strategy, link threshold and size tolerances
    /// have no counterpart in the engine and are ignored.
    pub struct PaddleDetector {
        engine: Mutex<OcrEngine>,
        files: ModelFiles,
    }

    impl PaddleDetector {
        pub fn new(models_dir: &Path, languages: &[String]) -> DetectionResult<Self> {
            let files = ModelFiles::resolve(models_dir, languages)?;
            info!(
                "Loading PaddleOCR {} models from {}",
                files.script,
                models_dir.display()
            );

            let engine = OcrEngine::new(&files.detection, &files.recognition, &files.charset, None)
                .map_err(|e| DetectionError::Backend(format!("failed to create OCR engine: {}", e)))?;

            Ok(Self {
                engine: Mutex::new(engine),
                files,
            })
        }

        pub fn model_files(&self) -> &ModelFiles {
            &self.files
        }
    }

    impl TextDetector for PaddleDetector {
        fn detect(&self, image: &DynamicImage, params: &DetectorParams) -> DetectionResult<Vec<Detection>> {
            let raw = self
                .engine
                .lock()
                .recognize(image)
                .map_err(|e| DetectionError::Backend(e.to_string()))?;

            let total = raw.len();
            let detections: Vec<Detection> = raw
                .into_iter()
                .filter(|r| r.confidence >= params.confidence_threshold)
                .map(|r| {
                    let rect = r.bbox.rect;
                    Detection {
                        text: r.text,
                        quad: Quad::from_rect(
                            rect.left() as f32,
                            rect.top() as f32,
                            rect.width() as f32,
                            rect.height() as f32,
                        ),
                        confidence: r.confidence,
                    }
                })
                .collect();

            debug!(
                "Engine returned {} regions, {} above confidence {}",
                total,
                detections.len(),
                params.confidence_threshold
            );

            Ok(detections)
        }

        fn name(&self) -> &str {
            "paddleocr"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_models_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("overlay_translate_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, file: &str) {
        fs::write(dir.join(file), b"").unwrap();
    }

    #[test]
    fn test_script_for_language() {
        assert_eq!(script_for_language("en"), Some("english"));
        assert_eq!(script_for_language(" DE "), Some("latin"));
        assert_eq!(script_for_language("ja"), Some("chinese"));
        assert_eq!(script_for_language("klingon"), None);
    }

    #[test]
    fn test_resolve_uses_first_known_language() {
        let dir = temp_models_dir("resolve");
        touch(&dir, DETECTION_MODEL);
        touch(&dir, "cyrillic_PP-OCRv5_mobile_rec_infer.mnn");
        touch(&dir, "ppocr_keys_cyrillic.txt");

        let languages = vec!["xx".to_string(), "ru".to_string(), "en".to_string()];
        let files = ModelFiles::resolve(&dir, &languages).unwrap();

        assert_eq!(files.script, "cyrillic");
        assert_eq!(files.charset, dir.join("ppocr_keys_cyrillic.txt"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resolve_reports_missing_file() {
        let dir = temp_models_dir("missing");
        touch(&dir, DETECTION_MODEL);
        touch(&dir, "en_PP-OCRv5_mobile_rec_infer.mnn");

        let err = ModelFiles::resolve(&dir, &["en".to_string()]).unwrap_err();
        match err {
            DetectionError::ModelNotFound { path } => assert!(path.ends_with("ppocr_keys_en.txt")),
            other => panic!("unexpected error: {}", other),
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
