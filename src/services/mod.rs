pub mod detection;
pub mod ocr;
pub mod translation;

// Re-export commonly used services
pub use detection::{DetectionService, NoiseFilter, NoiseRule, TextDetector};
#[cfg(feature = "ocr")]
pub use ocr::PaddleDetector;
pub use translation::{GeminiTranslator, SessionState, TranslationDispatcher, Translator};
