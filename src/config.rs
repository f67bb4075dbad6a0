// src/config.rs
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{BridgeError, Result};
use crate::types::{DEFAULT_JPEG_QUALITY, HANDOVER_TOKEN_PARAM};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Public domain serving the web app. Also matched as a host suffix for auth redirects.
    pub app_domain: String,
    pub redirect_scheme: String,
    pub redirect_host: String,
    /// Query parameter carrying the auth handover token.
    pub handover_param: String,
    pub listen_addr: SocketAddr,
    pub jpeg_quality: u8,
    /// Image file served by the desktop camera stand-in.
    pub camera_image: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_domain: "lokaltu.pl".into(),
            redirect_scheme: "lokaltu".into(),
            redirect_host: "auth".into(),
            handover_param: HANDOVER_TOKEN_PARAM.into(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3500)),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            camera_image: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with `LOKALTU_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `LOKALTU_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(domain) = lookup("LOKALTU_APP_DOMAIN") {
            if domain.trim().is_empty() {
                return Err(BridgeError::Config("LOKALTU_APP_DOMAIN is empty".into()));
            }
            config.app_domain = domain.trim().to_string();
        }
        if let Some(addr) = lookup("LOKALTU_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|e| BridgeError::Config(format!("LOKALTU_LISTEN_ADDR={addr}: {e}")))?;
        }
        if let Some(quality) = lookup("LOKALTU_JPEG_QUALITY") {
            config.jpeg_quality = parse_quality(&quality)?;
        }
        if let Some(path) = lookup("LOKALTU_CAMERA_IMAGE") {
            config.camera_image = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn app_url(&self) -> String {
        format!("https://{}/", self.app_domain)
    }
}

fn parse_quality(raw: &str) -> Result<u8> {
    match raw.trim().parse::<u8>() {
        Ok(q) if (1..=100).contains(&q) => Ok(q),
        _ => Err(BridgeError::Config(format!(
            "LOKALTU_JPEG_QUALITY must be 1-100, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&str, &str)]) -> Result<BridgeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_point_at_public_app() {
        let config = BridgeConfig::default();
        assert_eq!(config.app_url(), "https://lokaltu.pl/");
        assert_eq!(config.jpeg_quality, 85);
        assert_eq!(config.listen_addr.port(), 3500);
    }

    #[test]
    fn quality_must_be_in_range() {
        assert_eq!(parse_quality("70").unwrap(), 70);
        assert!(parse_quality("0").is_err());
        assert!(parse_quality("101").is_err());
        assert!(parse_quality("high").is_err());
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{ "app_domain": "staging.lokaltu.pl" }"#).unwrap();
        assert_eq!(config.app_domain, "staging.lokaltu.pl");
        assert_eq!(config.redirect_scheme, "lokaltu");
    }

    #[test]
    fn no_variables_means_defaults() {
        let config = overlay(&[]).unwrap();
        assert_eq!(config.app_domain, "lokaltu.pl");
        assert_eq!(config.listen_addr, SocketAddr::from(([127, 0, 0, 1], 3500)));
        assert_eq!(config.camera_image, None);
    }

    #[test]
    fn variables_override_defaults() {
        let config = overlay(&[
            ("LOKALTU_APP_DOMAIN", " staging.lokaltu.pl "),
            ("LOKALTU_LISTEN_ADDR", "0.0.0.0:9000"),
            ("LOKALTU_JPEG_QUALITY", "60"),
            ("LOKALTU_CAMERA_IMAGE", "/tmp/shot.jpg"),
        ])
        .unwrap();
        assert_eq!(config.app_domain, "staging.lokaltu.pl");
        assert_eq!(config.app_url(), "https://staging.lokaltu.pl/");
        assert_eq!(config.listen_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.jpeg_quality, 60);
        assert_eq!(config.camera_image, Some(PathBuf::from("/tmp/shot.jpg")));
    }

    #[test]
    fn empty_domain_is_rejected() {
        assert!(matches!(
            overlay(&[("LOKALTU_APP_DOMAIN", "  ")]),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn bad_listen_addr_is_rejected() {
        assert!(matches!(
            overlay(&[("LOKALTU_LISTEN_ADDR", "localhost")]),
            Err(BridgeError::Config(_))
        ));
    }
}
