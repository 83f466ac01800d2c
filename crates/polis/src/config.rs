//! Config and .env loading for a site.

use std::fs;

use polis_protocol::defaults::DEFAULT_DISCOVERY_URL;
use polis_protocol::{EnvConfig, PolisError, Result, SiteConfig, SitePaths};
use polis_store::fsutil;

/// Load .polis/config.json, defaulting when absent.
pub fn load_config(paths: &SitePaths) -> Result<SiteConfig> {
    let path = paths.config_file();
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config(paths: &SitePaths, config: &SiteConfig) -> Result<()> {
    let raw = serde_json::to_string_pretty(config)?;
    fsutil::write_atomic_str(&paths.config_file(), &raw)?;
    Ok(())
}

/// Parse shell-style KEY=VALUE lines. Comments and blanks are skipped;
/// single or double quotes around values are stripped.
pub fn parse_env(content: &str) -> EnvConfig {
    let mut env = EnvConfig::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());
        match key {
            "POLIS_BASE_URL" => env.base_url = Some(value),
            "DISCOVERY_SERVICE_URL" => env.discovery_url = Some(value),
            "DISCOVERY_SERVICE_KEY" => env.discovery_key = Some(value),
            _ => {}
        }
    }
    env
}

/// Load the site's .env file, empty when absent.
pub fn load_env(paths: &SitePaths) -> Result<EnvConfig> {
    let path = paths.env_file();
    if !path.exists() {
        return Ok(EnvConfig::default());
    }
    Ok(parse_env(&fs::read_to_string(&path)?))
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Effective discovery endpoint: .env overrides config.json, both fall back
/// to the public default URL. The API key has no default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub url: String,
    pub api_key: String,
}

pub fn discovery_settings(config: &SiteConfig, env: &EnvConfig) -> Result<DiscoverySettings> {
    let url = env
        .discovery_url
        .clone()
        .or_else(|| config.discovery_url.clone())
        .unwrap_or_else(|| DEFAULT_DISCOVERY_URL.to_string());
    let api_key = env
        .discovery_key
        .clone()
        .or_else(|| config.discovery_key.clone())
        .ok_or_else(|| {
            PolisError::not_configured(
                "discovery key missing; set DISCOVERY_SERVICE_KEY in .env or discovery_key in config.json",
            )
        })?;
    Ok(DiscoverySettings { url, api_key })
}
