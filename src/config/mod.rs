//! Configuration management for pagesift
//!
//! Every selector and tunable of a pipeline run lives here. Configuration is
//! loaded from TOML, patched by `PAGESIFT_SECTION__KEY` environment variables
//! and validated before any file is opened.

use crate::clustering::{ClusterStrategy, TieBreak};
use crate::embedding::VectorizerBackend;
use crate::error::{Result, SiftError, ValidationError};
use crate::extraction::ExtractorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub extraction: ExtractionConfig,
    pub intelligibility: IntelligibilityConfig,
    pub vectorizer: VectorizerConfig,
    pub similarity: SimilarityConfig,
    pub clustering: ClusteringConfig,
    pub budget: BudgetConfig,
    pub hosted: HostedConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Page extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub backend: ExtractorKind,
    /// Lower-case stored page text after whitespace normalization
    #[serde(default)]
    pub lowercase: bool,
}

/// Garbage / foreign-language page detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligibilityConfig {
    /// Regex matching one unrecognized-glyph placeholder
    pub placeholder_pattern: String,
    /// Placeholder share of the page above which the page is discarded outright
    pub placeholder_threshold: f32,
    /// ISO 639-3 codes of accepted languages
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    pub backend: VectorizerBackend,
    /// Model used by the local embedding backend
    pub local_model: String,
}

/// Similarity thresholds, scoped per vectorizer backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Explicit threshold; wins over the backend default when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    pub thresholds: BackendThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendThresholds {
    pub lexical: f32,
    pub local: f32,
    pub hosted: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub strategy: ClusterStrategy,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Token budget of the final excerpt; zero or negative yields an empty excerpt
    pub max_tokens: i64,
    /// Model or encoding name used for token counting
    pub tokenizer_model: String,
}

/// Hosted embedding API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    /// Environment variable holding the API credential
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    /// Upper bound on the tokens of a single embedding request
    pub batch_token_cap: usize,
    pub timeout_secs: u64,
    pub price_per_1k_tokens: f64,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectorizer_backend: Option<VectorizerBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ClusterStrategy>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SiftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SiftError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        Self::parse(&content, std::env::vars())
    }

    /// Parse TOML `content`, apply `vars` as overrides and validate
    fn parse<I>(content: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config: Config = toml::from_str(content)?;
        config.apply_overrides(vars)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SiftError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| SiftError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(backend) = overrides.vectorizer_backend {
            self.vectorizer.backend = backend;
        }
        if let Some(threshold) = overrides.similarity_threshold {
            self.similarity.threshold = Some(threshold);
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.budget.max_tokens = max_tokens;
        }
        if let Some(strategy) = overrides.strategy {
            self.clustering.strategy = strategy;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PAGESIFT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `PAGESIFT_`-prefixed `(key, value)` overrides
    ///
    /// Every value that does not parse is collected; none of them is skipped.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut errors = Vec::new();
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("PAGESIFT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    errors.push(ValidationError::new(key.as_str(), e.to_string()));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SiftError::ConfigValidation { errors })
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "BUDGET__MAX_TOKENS" => {
                self.budget.max_tokens = parse_value(path, value)?;
            }
            "BUDGET__TOKENIZER_MODEL" => {
                self.budget.tokenizer_model = value.to_string();
            }
            "SIMILARITY__THRESHOLD" => {
                self.similarity.threshold = Some(parse_value(path, value)?);
            }
            "VECTORIZER__BACKEND" => {
                self.vectorizer.backend = parse_value(path, value)?;
            }
            "EXTRACTION__BACKEND" => {
                self.extraction.backend = parse_value(path, value)?;
            }
            "CLUSTERING__STRATEGY" => {
                self.clustering.strategy = parse_value(path, value)?;
            }
            "HOSTED__MODEL" => {
                self.hosted.model = value.to_string();
            }
            "HOSTED__BASE_URL" => {
                self.hosted.base_url = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Similarity threshold in effect for the configured vectorizer backend
    pub fn similarity_threshold(&self) -> f32 {
        self.threshold_for(self.vectorizer.backend)
    }

    /// Similarity threshold for `backend`, honoring an explicit override
    pub fn threshold_for(&self, backend: VectorizerBackend) -> f32 {
        if let Some(threshold) = self.similarity.threshold {
            return threshold;
        }
        let thresholds = &self.similarity.thresholds;
        match backend {
            VectorizerBackend::Lexical => thresholds.lexical,
            VectorizerBackend::Local => thresholds.local,
            VectorizerBackend::Hosted => thresholds.hosted,
        }
    }

    /// Read the hosted API credential from the configured environment variable
    pub fn hosted_api_key(&self) -> Result<String> {
        let var = &self.hosted.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            Ok(_) => Err(SiftError::InvalidConfigValue {
                path: "hosted.api_key_env".to_string(),
                message: format!("Environment variable {} is empty", var),
            }),
            Err(_) => Err(SiftError::InvalidConfigValue {
                path: "hosted.api_key_env".to_string(),
                message: format!("Environment variable {} is not set", var),
            }),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SiftError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("pagesift").join("config.toml"))
    }
}

/// Parse an override value, routing through serde for enum selectors
fn parse_value<T: serde::de::DeserializeOwned>(path: &str, value: &str) -> Result<T> {
    let as_json = serde_json::Value::String(value.to_string());
    serde_json::from_value(as_json)
        .or_else(|_| {
            let parsed: serde_json::Value = serde_json::from_str(value)?;
            serde_json::from_value(parsed)
        })
        .map_err(|_| SiftError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            extraction: ExtractionConfig {
                backend: ExtractorKind::PdfExtract,
                lowercase: false,
            },
            intelligibility: IntelligibilityConfig {
                placeholder_pattern: r"\(cid:\d+\)|\x{FFFD}".to_string(),
                placeholder_threshold: 0.7,
                languages: vec!["eng".to_string()],
            },
            vectorizer: VectorizerConfig {
                backend: VectorizerBackend::Lexical,
                local_model: "all-MiniLM-L6-v2".to_string(),
            },
            similarity: SimilarityConfig {
                threshold: None,
                thresholds: BackendThresholds {
                    lexical: 0.5,
                    local: 0.87,
                    hosted: 0.87,
                },
            },
            clustering: ClusteringConfig {
                strategy: ClusterStrategy::ConnectedComponents,
                tie_break: TieBreak::LargestContent,
            },
            budget: BudgetConfig {
                max_tokens: 8000,
                tokenizer_model: "cl100k_base".to_string(),
            },
            hosted: HostedConfig {
                api_key_env: "OPENAI_API_KEY".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "text-embedding-3-small".to_string(),
                batch_token_cap: 8000,
                timeout_secs: 60,
                price_per_1k_tokens: 0.00002,
            },
            profiles: HashMap::new(),
        }
    }
}
