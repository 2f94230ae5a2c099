use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "https://sketch-semantics.onrender.com",
];

// ── Startup configuration ────────────────────────────────────────────────────

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<HeaderValue>,
    pub upstream_timeout: Option<Duration>,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = non_blank("SKETCH_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::InvalidAddr {
            var: "SKETCH_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let allowed_origins = match lookup("SKETCH_ALLOWED_ORIGINS") {
            Some(list) => parse_origins(&list)?,
            None => DEFAULT_ORIGINS
                .iter()
                .map(|o| HeaderValue::from_static(*o))
                .collect(),
        };

        let upstream_timeout = non_blank("SKETCH_UPSTREAM_TIMEOUT_SECS")
            .map(|v| positive_integer("SKETCH_UPSTREAM_TIMEOUT_SECS", &v))
            .transpose()?
            .map(|secs| Duration::from_secs(secs as u64));

        let max_body_bytes = non_blank("SKETCH_MAX_BODY_BYTES")
            .map(|v| positive_integer("SKETCH_MAX_BODY_BYTES", &v))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Config {
            api_key: non_blank("GEMINI_API_KEY"),
            model: non_blank("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: non_blank("GEMINI_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            bind_addr,
            allowed_origins,
            upstream_timeout,
            max_body_bytes,
        })
    }
}

fn parse_origins(list: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            let invalid = || ConfigError::InvalidOrigin {
                var: "SKETCH_ALLOWED_ORIGINS",
                value: o.to_string(),
            };
            if o == "*" {
                return Err(invalid());
            }
            HeaderValue::from_str(o).map_err(|_| invalid())
        })
        .collect()
}

fn positive_integer(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::NotPositiveInteger {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.allowed_origins[0], "http://localhost:5173");
        assert!(config.upstream_timeout.is_none());
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("GEMINI_API_KEY", " secret "),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1beta/"),
            ("SKETCH_BIND_ADDR", "127.0.0.1:8080"),
            ("SKETCH_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("SKETCH_UPSTREAM_TIMEOUT_SECS", "30"),
            ("SKETCH_MAX_BODY_BYTES", "1024"),
        ])
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = config_from(&[("GEMINI_API_KEY", "   ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn empty_origin_list_allows_nothing() {
        let config = config_from(&[("SKETCH_ALLOWED_ORIGINS", "")]).unwrap();
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = config_from(&[("SKETCH_UPSTREAM_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("SKETCH_UPSTREAM_TIMEOUT_SECS"));
    }

    #[test]
    fn rejects_wildcard_origin() {
        let err = config_from(&[("SKETCH_ALLOWED_ORIGINS", "https://a.example,*")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin { .. }));
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = config_from(&[("SKETCH_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { .. }));
    }
}
