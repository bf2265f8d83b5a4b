use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::registry::number::is_valid_prefix;
use crate::secrets::has_secret_source;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.organization.name.trim().is_empty() {
        return Err(invalid("organization.name must not be empty"));
    }

    if !is_valid_prefix(&config.registry.prefix) {
        return Err(invalid(format!(
            "registry.prefix '{}' must be 1-10 uppercase letters or digits",
            config.registry.prefix
        )));
    }

    if config.registry.counter_max_attempts == 0 {
        return Err(invalid("registry.counterMaxAttempts must be at least 1"));
    }

    if config.registry.external_timeout_secs == 0 {
        return Err(invalid("registry.externalTimeoutSecs must be at least 1"));
    }

    if config.registry.claim_lease_secs <= config.registry.external_timeout_secs {
        return Err(invalid(
            "registry.claimLeaseSecs must be longer than registry.externalTimeoutSecs",
        ));
    }

    if let Some(base) = &config.registry.tracking_base_url {
        if !is_http_url(base) {
            return Err(invalid(format!(
                "registry.trackingBaseUrl '{}' must be an http(s) URL",
                base
            )));
        }
    }

    if !is_http_url(&config.storage.public_base_url) {
        return Err(invalid(format!(
            "storage.publicBaseUrl '{}' must be an http(s) URL",
            config.storage.public_base_url
        )));
    }

    if let Some(mailbox) = &config.mailbox {
        if mailbox.poll_interval == 0 {
            return Err(invalid("mailbox.pollInterval must be greater than zero"));
        }
        if mailbox.batch_size == 0 {
            return Err(invalid("mailbox.batchSize must be greater than zero"));
        }
        let auth = &mailbox.auth;
        if !has_secret_source(
            auth.password.as_deref(),
            auth.password_file.as_deref(),
            auth.password_env_var.as_deref(),
        ) {
            return Err(invalid(
                "mailbox.auth needs one of password, passwordFile or passwordEnvVar",
            ));
        }
    }

    if let Some(push) = &config.push {
        if !is_http_url(&push.relay_url) {
            return Err(invalid(format!(
                "push.relayUrl '{}' must be an http(s) URL",
                push.relay_url
            )));
        }
        if push.subscribe_max_attempts == 0 {
            return Err(invalid("push.subscribeMaxAttempts must be at least 1"));
        }
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("https://") || value.starts_with("http://")
}
