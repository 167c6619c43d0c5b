// Library exports for the overlay text translation pipeline
//
// Detects text in a screen capture, drops fragments that look like noise and
// translates the rest, skipping the remote call when the screen is unchanged.

pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::{Config, DecodingStrategy, DetectorParams, PairingMode},
    errors::{ConfigError, DetectionError, PipelineError, TranslationError},
    types::{
        BoundingBox, Detection, Fragment, ImageSource, PipelineOutput, Point, Quad,
        TranslatedFragment, TranslatedItem, TranslationRequest,
    },
};

pub use orchestration::Pipeline;

pub use services::{
    DetectionService, GeminiTranslator, NoiseFilter, NoiseRule, SessionState, TextDetector,
    TranslationDispatcher, Translator,
};

#[cfg(feature = "ocr")]
pub use services::PaddleDetector;

pub use utils::{load_image, load_image_async, Metrics, MetricsSnapshot};
