use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::VectorizerBackend;
use crate::error::{Result, SiftError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    ///
    /// Collects every problem instead of stopping at the first one, so a
    /// misconfigured run is rejected with the full list before extraction.
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_intelligibility(config, &mut errors);
        Self::validate_similarity(config, &mut errors);
        Self::validate_budget(config, &mut errors);
        Self::validate_vectorizer(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SiftError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_intelligibility(config: &Config, errors: &mut Vec<ValidationError>) {
        let section = &config.intelligibility;

        if let Err(e) = regex::Regex::new(&section.placeholder_pattern) {
            errors.push(ValidationError::new(
                "intelligibility.placeholder_pattern",
                format!("Invalid regex: {}", e),
            ));
        }

        if !(0.0..=1.0).contains(&section.placeholder_threshold) {
            errors.push(ValidationError::new(
                "intelligibility.placeholder_threshold",
                format!(
                    "Threshold must be between 0.0 and 1.0, got {}",
                    section.placeholder_threshold
                ),
            ));
        }

        if section.languages.is_empty() {
            errors.push(ValidationError::new(
                "intelligibility.languages",
                "At least one accepted language is required",
            ));
        }

        for code in &section.languages {
            if whatlang::Lang::from_code(code).is_none() {
                errors.push(ValidationError::new(
                    "intelligibility.languages",
                    format!("Unknown ISO 639-3 language code: {}", code),
                ));
            }
        }
    }

    fn validate_similarity(config: &Config, errors: &mut Vec<ValidationError>) {
        let thresholds = &config.similarity.thresholds;
        let mut candidates = vec![
            ("similarity.thresholds.lexical", thresholds.lexical),
            ("similarity.thresholds.local", thresholds.local),
            ("similarity.thresholds.hosted", thresholds.hosted),
        ];
        if let Some(threshold) = config.similarity.threshold {
            candidates.push(("similarity.threshold", threshold));
        }

        for (path, value) in candidates {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ValidationError::new(
                    path,
                    format!("Threshold must be in (0.0, 1.0], got {}", value),
                ));
            }
        }
    }

    fn validate_budget(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.budget.tokenizer_model.trim().is_empty() {
            errors.push(ValidationError::new(
                "budget.tokenizer_model",
                "Tokenizer model cannot be empty",
            ));
        }
    }

    fn validate_vectorizer(config: &Config, errors: &mut Vec<ValidationError>) {
        match config.vectorizer.backend {
            VectorizerBackend::Lexical => {}
            VectorizerBackend::Local => {
                if config.vectorizer.local_model.is_empty() {
                    errors.push(ValidationError::new(
                        "vectorizer.local_model",
                        "Model name cannot be empty",
                    ));
                }
            }
            VectorizerBackend::Hosted => {
                let hosted = &config.hosted;
                if let Err(SiftError::InvalidConfigValue { path, message }) =
                    config.hosted_api_key()
                {
                    errors.push(ValidationError::new(path, message));
                }
                if hosted.model.trim().is_empty() {
                    errors.push(ValidationError::new(
                        "hosted.model",
                        "Model name cannot be empty",
                    ));
                }
                if hosted.batch_token_cap == 0 {
                    errors.push(ValidationError::new(
                        "hosted.batch_token_cap",
                        "Batch token cap must be greater than 0",
                    ));
                }
                if hosted.timeout_secs == 0 {
                    errors.push(ValidationError::new(
                        "hosted.timeout_secs",
                        "Timeout must be greater than 0",
                    ));
                }
            }
        }
    }
}
