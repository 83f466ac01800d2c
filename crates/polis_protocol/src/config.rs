//! Site configuration (.polis/config.json) and .env overrides.

use serde::{Deserialize, Serialize};

/// Hook script overrides. When unset, scripts are auto-discovered at
/// .polis/hooks/<event>.sh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_publish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_republish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_comment: Option<String>,
}

/// .polis/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_view_mode")]
    pub view_mode: String,
    #[serde(default)]
    pub show_frontmatter: bool,
    #[serde(default)]
    pub hide_read: bool,
    #[serde(default)]
    pub setup_wizard_dismissed: bool,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_key: Option<String>,
}

fn default_view_mode() -> String {
    "list".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            view_mode: default_view_mode(),
            show_frontmatter: false,
            hide_read: false,
            setup_wizard_dismissed: false,
            hooks: HookConfig::default(),
            discovery_url: None,
            discovery_key: None,
        }
    }
}

/// Values loadable from the site's .env file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub discovery_url: Option<String>,
    pub discovery_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: SiteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.view_mode, "list");
        assert!(!config.hide_read);
        assert!(config.hooks.post_publish.is_none());
        assert!(config.discovery_url.is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = SiteConfig::default();
        config.hooks.post_publish = Some(".polis/hooks/deploy.sh".into());
        config.discovery_url = Some("https://discovery.example".into());
        let json = serde_json::to_string(&config).unwrap();
        let back: SiteConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hooks.post_publish.as_deref(), Some(".polis/hooks/deploy.sh"));
        assert_eq!(back.discovery_url.as_deref(), Some("https://discovery.example"));
    }
}
