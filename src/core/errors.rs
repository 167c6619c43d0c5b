// Error types for the detection and translation stages
//
// Each stage has its own error kind so callers can tell a detector fault from a
// translator fault, and an unreachable service from one that answered badly.

use thiserror::Error;

/// Errors raised by the external text detector
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Text detector failed: {0}")]
    Backend(String),

    #[error("Detector model not found: {path}")]
    ModelNotFound { path: String },
}

/// Errors raised by the external translation service
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Network failure. Built with the URL stripped so credentials never leak.
    #[error("Translation request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Translation service returned {status}: {body}")]
    ServiceFailure { status: u16, body: String },

    #[error("Malformed translation response: {reason}")]
    MalformedResponse { reason: String },

    #[error("No API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,
}

impl TranslationError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// True when the service answered but the answer could not be used
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }
}

/// Errors surfaced by the end-to-end pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Image loading failed: {0}")]
    ImageLoad(String),

    #[error("Task join failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("Link threshold must be in [0.0, 1.0], got {0}")]
    InvalidLinkThreshold(f32),

    #[error("Size tolerance must be >= 0.0, got {0}")]
    InvalidSizeTolerance(f32),

    #[error("Unknown decoding strategy: {0} (expected greedy, beamsearch or wordbeamsearch)")]
    UnknownDecodingStrategy(String),

    #[error("Unknown response pairing mode: {0} (expected positional or indexed)")]
    UnknownPairingMode(String),

    #[error("At least one OCR language is required")]
    NoLanguages,

    #[error("Target language must not be empty")]
    EmptyTargetLanguage,

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

pub type DetectionResult<T> = Result<T, DetectionError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_distinguishable() {
        let err = TranslationError::malformed("not a JSON array");
        assert!(err.is_malformed());
        assert_eq!(
            err.to_string(),
            "Malformed translation response: not a JSON array"
        );

        let err = TranslationError::ServiceFailure {
            status: 429,
            body: "quota".to_string(),
        };
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_detection_errors_are_detector_faults_only() {
        // Image decoding is reported by the pipeline, not the detector
        for err in [
            DetectionError::Backend("engine crashed".to_string()),
            DetectionError::ModelNotFound { path: "models/det.mnn".to_string() },
        ] {
            match err {
                DetectionError::Backend(msg) => assert_eq!(msg, "engine crashed"),
                DetectionError::ModelNotFound { path } => assert!(path.ends_with(".mnn")),
            }
        }
    }

    #[test]
    fn test_pipeline_error_wraps_stage_errors() {
        let err: PipelineError = DetectionError::Backend("engine crashed".to_string()).into();
        assert!(matches!(err, PipelineError::Detection(_)));

        let err: PipelineError = TranslationError::MissingApiKey.into();
        assert!(matches!(err, PipelineError::Translation(_)));
    }
}
