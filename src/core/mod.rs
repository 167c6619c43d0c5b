pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, DecodingStrategy, DetectorParams, PairingMode};
pub use errors::{ConfigError, DetectionError, PipelineError, TranslationError};
pub use types::{
    BoundingBox, Detection, Fragment, ImageSource, PipelineOutput, Point, Quad,
    TranslatedFragment, TranslatedItem, TranslationRequest,
};
