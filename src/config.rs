use serde::Deserialize;

use crate::services::DEFAULT_MODEL_VERSION;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Mount point of the prediction routes, e.g. "/api/v1/prediction".
    pub api_prefix: String,
    pub app_name: String,
    pub app_description: String,
    pub app_version: String,
    pub model_version: String,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
    /// Requests per second per client IP on the analyze route; 0 disables limiting.
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1/prediction".to_string(),
            app_name: "Diabetic AI System".to_string(),
            app_description: "Explainable Multimodal AI".to_string(),
            app_version: "1.0.0".to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 30,
            rate_limit_per_second: 0,
            rate_limit_burst: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Bind address: {}:{}", config.host, config.port);
        tracing::debug!("Prediction routes mounted at {}", config.api_prefix);
        tracing::debug!("Model version tag: {}", config.model_version);
        if config.rate_limit_per_second > 0 {
            tracing::debug!(
                "Analyze rate limit: {}/s per client, burst {}",
                config.rate_limit_per_second,
                config.rate_limit_burst
            );
        }

        Ok(config)
    }

    /// Builds a config from an arbitrary variable source, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: match var("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
                None => defaults.port,
            },
            api_prefix: var("API_PREFIX")
                .map(|prefix| {
                    let prefix = prefix.trim().to_string();
                    if !prefix.starts_with('/') {
                        anyhow::bail!("API_PREFIX must start with /");
                    }
                    if prefix.len() < 2 || prefix.ends_with('/') {
                        anyhow::bail!("API_PREFIX must be a non-root path without trailing /");
                    }
                    Ok(prefix)
                })
                .transpose()?
                .unwrap_or(defaults.api_prefix),
            app_name: var("APP_NAME").unwrap_or(defaults.app_name),
            app_description: lookup("APP_DESCRIPTION").unwrap_or(defaults.app_description),
            app_version: var("APP_VERSION").unwrap_or(defaults.app_version),
            model_version: var("MODEL_VERSION").unwrap_or(defaults.model_version),
            max_body_bytes: match var("MAX_BODY_BYTES") {
                Some(bytes) => match bytes.trim().parse::<usize>() {
                    Ok(0) | Err(_) => {
                        anyhow::bail!("MAX_BODY_BYTES must be a positive number of bytes")
                    }
                    Ok(n) => n,
                },
                None => defaults.max_body_bytes,
            },
            request_timeout_secs: match var("REQUEST_TIMEOUT_SECS") {
                Some(secs) => match secs.trim().parse::<u64>() {
                    Ok(0) | Err(_) => {
                        anyhow::bail!("REQUEST_TIMEOUT_SECS must be a positive number of seconds")
                    }
                    Ok(n) => n,
                },
                None => defaults.request_timeout_secs,
            },
            rate_limit_per_second: match var("RATE_LIMIT_PER_SECOND") {
                Some(rate) => rate.trim().parse().map_err(|_| {
                    anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a non-negative number")
                })?,
                None => defaults.rate_limit_per_second,
            },
            rate_limit_burst: match var("RATE_LIMIT_BURST") {
                Some(burst) => burst
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("RATE_LIMIT_BURST must be a number"))?,
                None => defaults.rate_limit_burst,
            },
        };

        if config.rate_limit_per_second > 0 && config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_BURST must be positive when rate limiting is enabled");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.api_prefix, "/api/v1/prediction");
        assert_eq!(config.app_name, "Diabetic AI System");
        assert_eq!(config.model_version, "v1.0.0-demo");
        assert_eq!(config.rate_limit_per_second, 0);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = load(&[
            ("PORT", "9090"),
            ("API_PREFIX", "/v2/dr"),
            ("APP_NAME", "Retina Service"),
            ("RATE_LIMIT_PER_SECOND", "0"),
            ("RATE_LIMIT_BURST", "0"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.api_prefix, "/v2/dr");
        assert_eq!(config.app_name, "Retina Service");
        assert_eq!(config.rate_limit_per_second, 0);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", "  "), ("APP_NAME", "")]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.app_name, "Diabetic AI System");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("PORT", "not-a-port")]).is_err());
        assert!(load(&[("PORT", "70000")]).is_err());
        assert!(load(&[("API_PREFIX", "api/v1")]).is_err());
        assert!(load(&[("API_PREFIX", "/")]).is_err());
        assert!(load(&[("API_PREFIX", "/api/")]).is_err());
        assert!(load(&[("MAX_BODY_BYTES", "0")]).is_err());
        assert!(load(&[("REQUEST_TIMEOUT_SECS", "-5")]).is_err());
        assert!(load(&[("RATE_LIMIT_PER_SECOND", "10"), ("RATE_LIMIT_BURST", "0")]).is_err());
    }
}
