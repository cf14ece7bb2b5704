//! Server configuration from environment variables.

use std::path::PathBuf;

use crate::room::call::DEFAULT_STUN_URL;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory of static client assets served at `/`. Disabled when unset.
    pub static_dir: Option<PathBuf>,
    /// STUN server handed to call participants.
    pub stun_url: String,
}

impl ServerConfig {
    /// Read `PORT` (3000), `STATIC_DIR` and `CALL_STUN_URL`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` when `PORT` is not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            port,
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
            stun_url: non_empty("CALL_STUN_URL").unwrap_or_else(|| DEFAULT_STUN_URL.to_string()),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, static_dir: None, stun_url: DEFAULT_STUN_URL.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.stun_url, "stun:stun.l.google.com:19302");
    }

    #[test]
    fn overrides() {
        let cfg = ServerConfig::from_lookup(|key| match key {
            "PORT" => Some("8080".into()),
            "STATIC_DIR" => Some("./public".into()),
            "CALL_STUN_URL" => Some("stun:stun.example.org:3478".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.static_dir, Some(PathBuf::from("./public")));
        assert_eq!(cfg.stun_url, "stun:stun.example.org:3478");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_lookup(|key| (key == "PORT").then(|| "http".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "invalid PORT: http");
    }
}
