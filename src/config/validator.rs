use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Result, RfpError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every failure at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RfpError::ConfigValidation { errors })
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

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.database_file.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_file",
                "Database file name cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        let valid_providers = ["openai", "azure", "local", "disabled"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if provider == "azure" && config.embedding.endpoint.is_none() {
            errors.push(ValidationError::new(
                "embedding.endpoint",
                "Azure provider requires an endpoint",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // Credentials are resolved at startup; a missing key disables the backend instead
        let provider = &config.llm.provider;
        let valid_providers = ["openai", "azure"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if config.llm.enabled && provider == "azure" && config.llm.endpoint.is_none() {
            errors.push(ValidationError::new(
                "llm.endpoint",
                "Azure provider requires an endpoint",
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new(
                "llm.model",
                "Model name cannot be empty",
            ));
        }

        if !(0.0..=1.0).contains(&config.llm.top_p) {
            errors.push(ValidationError::new(
                "llm.top_p",
                format!("top_p must be between 0.0 and 1.0, got {}", config.llm.top_p),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_n == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_n",
                "top_n must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.temperature) {
            errors.push(ValidationError::new(
                "retrieval.temperature",
                format!(
                    "Temperature must be between 0.0 and 1.0, got {}",
                    retrieval.temperature
                ),
            ));
        }

        if retrieval.max_tokens == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_tokens",
                "max_tokens must be greater than 0",
            ));
        }

        if retrieval.max_context_chars == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_context_chars",
                "max_context_chars must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let mut config = Config::default();
        config.llm.provider = "azure".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        config.llm.endpoint = Some("https://example.openai.azure.com".to_string());
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.top_n = 0;
        config.retrieval.temperature = 1.5;
        config.embedding.dimension = 0;

        match ConfigValidator::validate(&config) {
            Err(RfpError::ConfigValidation { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
