use crate::core::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Character decoding strategy requested from the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodingStrategy {
    #[default]
    Greedy,
    BeamSearch,
    WordBeamSearch,
}

impl FromStr for DecodingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "beamsearch" | "beam_search" => Ok(Self::BeamSearch),
            "wordbeamsearch" | "word_beam_search" => Ok(Self::WordBeamSearch),
            other => Err(ConfigError::UnknownDecodingStrategy(other.to_string())),
        }
    }
}

/// Parameters handed to the text detector as-is.
///
/// The filtering stage never reads these; backends honour the subset they support.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    pub confidence_threshold: f32,
    pub group_into_paragraphs: bool,
    pub decoding_strategy: DecodingStrategy,
    pub link_threshold: f32,
    pub size_tolerance_x: f32,
    pub size_tolerance_y: f32,
    pub languages: Vec<String>,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            group_into_paragraphs: false,
            decoding_strategy: DecodingStrategy::Greedy,
            link_threshold: 0.4,
            size_tolerance_x: 1.0,
            size_tolerance_y: 0.5,
            languages: vec!["en".to_string()],
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub params: DetectorParams,
    pub models_dir: PathBuf,
}

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub translation_model: String,
    pub timeout: Duration,
    pub enable_thinking: bool,
}

/// How translated items are matched back to fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    /// Response order is trusted; items are zipped with the request
    #[default]
    Positional,
    /// Every item must echo its request index; items are reordered before pairing
    Indexed,
}

impl FromStr for PairingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "indexed" => Ok(Self::Indexed),
            other => Err(ConfigError::UnknownPairingMode(other.to_string())),
        }
    }
}

/// Translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub target_language: String,
    pub pairing: PairingMode,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub api: ApiConfig,
    pub translation: TranslationConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let defaults = DetectorParams::default();

        // A single key wins; otherwise take the first of a comma-separated pool
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| {
                env::var("GEMINI_API_KEYS")
                    .ok()
                    .and_then(|keys| keys.split(',').next().map(str::to_string))
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let decoding_strategy = match env::var("DECODER") {
            Ok(s) => s.parse()?,
            Err(_) => defaults.decoding_strategy,
        };

        let pairing = match env::var("RESPONSE_PAIRING") {
            Ok(s) => s.parse()?,
            Err(_) => PairingMode::default(),
        };

        let languages = env::var("OCR_LANGUAGES")
            .map(|s| parse_languages(&s))
            .unwrap_or(defaults.languages);

        Ok(Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT")?.unwrap_or(1420),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            detection: DetectionConfig {
                params: DetectorParams {
                    confidence_threshold: env_parse("TEXT_THRESHOLD")?
                        .unwrap_or(defaults.confidence_threshold),
                    group_into_paragraphs: env_parse("PARAGRAPH")?
                        .unwrap_or(defaults.group_into_paragraphs),
                    decoding_strategy,
                    link_threshold: env_parse("LINK_THRESHOLD")?
                        .unwrap_or(defaults.link_threshold),
                    size_tolerance_x: env_parse("X_TOLERANCE")?
                        .unwrap_or(defaults.size_tolerance_x),
                    size_tolerance_y: env_parse("Y_TOLERANCE")?
                        .unwrap_or(defaults.size_tolerance_y),
                    languages,
                },
                models_dir: env::var("OCR_MODELS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("models")),
            },
            api: ApiConfig {
                api_key,
                translation_model: env::var("TRANSLATION_MODEL")
                    .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
                timeout: Duration::from_secs(env_parse("API_TIMEOUT_SECONDS")?.unwrap_or(60)),
                enable_thinking: env_parse("GEMINI_ENABLE_THINKING")?.unwrap_or(false),
            },
            translation: TranslationConfig {
                target_language: env::var("TARGET_LANGUAGE")
                    .unwrap_or_else(|_| "English".to_string()),
                pairing,
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // API key is checked lazily by the translator so detection-only runs still work
        validate_detector_params(&self.detection.params)?;

        if self.translation.target_language.trim().is_empty() {
            return Err(ConfigError::EmptyTargetLanguage);
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn detector_params(&self) -> &DetectorParams {
        &self.detection.params
    }

    pub fn target_language(&self) -> &str {
        &self.translation.target_language
    }
}

/// Check detector parameter ranges
pub fn validate_detector_params(params: &DetectorParams) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&params.confidence_threshold) {
        return Err(ConfigError::InvalidConfidenceThreshold(
            params.confidence_threshold,
        ));
    }

    if !(0.0..=1.0).contains(&params.link_threshold) {
        return Err(ConfigError::InvalidLinkThreshold(params.link_threshold));
    }

    for tolerance in [params.size_tolerance_x, params.size_tolerance_y] {
        if tolerance < 0.0 {
            return Err(ConfigError::InvalidSizeTolerance(tolerance));
        }
    }

    if params.languages.is_empty() {
        return Err(ConfigError::NoLanguages);
    }

    Ok(())
}

/// Split a `+`-separated language list such as `en+ja`
pub fn parse_languages(raw: &str) -> Vec<String> {
    raw.split('+')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse an optional env var, failing on values that are present but malformed
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError(format!("{}={:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
