use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::types::{ChatIdentity, MediaRef};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub funnel: FunnelConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub admin_chat_ids: Vec<i64>,
    /// Checked against the `X-Telegram-Bot-Api-Secret-Token` webhook header.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FunnelConfig {
    #[serde(default = "default_registration_link")]
    pub registration_link: String,
    #[serde(default)]
    pub support_link: Option<String>,
    #[serde(default = "default_support_name")]
    pub support_name: String,
    #[serde(default)]
    pub media: FunnelMedia,
}

/// Illustration images for each funnel step. Steps without one are sent as text.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FunnelMedia {
    pub intro: Option<String>,
    pub registration: Option<String>,
    pub username_prompt: Option<String>,
    pub receipt_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeepAliveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_ping_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// SQLite file. Without one the directory lives in memory only.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Public base URL. When set the bot runs in webhook mode, otherwise it polls.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_registration_link() -> String {
    "https://example.com/register".to_string()
}

fn default_support_name() -> String {
    "Customer support".to_string()
}

fn default_send_delay_ms() -> u64 {
    50
}

fn default_ping_interval() -> u64 {
    300
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            registration_link: default_registration_link(),
            support_link: None,
            support_name: default_support_name(),
            media: FunnelMedia::default(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            interval_secs: default_ping_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            public_url: None,
        }
    }
}

impl FunnelMedia {
    pub fn intro(&self) -> Option<MediaRef> {
        self.intro.clone().map(MediaRef)
    }

    pub fn registration(&self) -> Option<MediaRef> {
        self.registration.clone().map(MediaRef)
    }

    pub fn username_prompt(&self) -> Option<MediaRef> {
        self.username_prompt.clone().map(MediaRef)
    }

    pub fn receipt_prompt(&self) -> Option<MediaRef> {
        self.receipt_prompt.clone().map(MediaRef)
    }
}

impl Config {
    pub fn admin_ids(&self) -> Vec<ChatIdentity> {
        self.telegram
            .admin_chat_ids
            .iter()
            .copied()
            .map(ChatIdentity)
            .collect()
    }

    /// Full URL the platform should deliver updates to, in webhook mode.
    pub fn webhook_url(&self) -> Option<String> {
        self.server.public_url.as_ref().map(|base| {
            format!(
                "{}{}",
                base.trim_end_matches('/'),
                self.server.webhook_path
            )
        })
    }

    /// Load from a TOML file (missing file means all defaults), then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            warn!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay deployment-style environment variables.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = var("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(ids) = var("ADMIN_CHAT_ID") {
            self.telegram.admin_chat_ids = parse_id_list(&ids)?;
        }
        if let Some(secret) = var("WEBHOOK_SECRET") {
            self.telegram.webhook_secret = Some(secret);
        }
        if let Some(link) = var("REG_LINK") {
            self.funnel.registration_link = link;
        }
        if let Some(enabled) = var("ENABLE_KEEP_ALIVE") {
            self.keep_alive.enabled = enabled.trim().eq_ignore_ascii_case("true");
        }
        if let Some(url) = var("PING_URL") {
            self.keep_alive.url = Some(url);
        }
        if let Some(interval) = var("PING_INTERVAL") {
            self.keep_alive.interval_secs = interval
                .trim()
                .parse()
                .with_context(|| format!("PING_INTERVAL is not a number: {interval}"))?;
        }
        if let Some(db) = var("DATABASE_URL") {
            self.storage.database_path = Some(PathBuf::from(db));
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        if let Some(url) = var("PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Bot token is missing: set [telegram] bot_token or BOT_TOKEN");
        }
        if self.telegram.admin_chat_ids.is_empty() {
            warn!("No admin chat ids configured; admin operations will be denied");
        }
        if self.keep_alive.interval_secs == 0 {
            anyhow::bail!("keep_alive.interval_secs must be greater than zero");
        }
        if !self.server.webhook_path.starts_with('/') {
            anyhow::bail!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            );
        }
        Ok(())
    }
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid chat id in ADMIN_CHAT_ID: {s}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_toml_sections_parse() {
        let config: Config = toml::from_str(
            r#"
[telegram]
bot_token = "123:abc"
admin_chat_ids = [42, 43]

[funnel]
registration_link = "https://reg.example"

[funnel.media]
intro = "AgAC-intro"

[broadcast]
send_delay_ms = 10

[keep_alive]
enabled = true
url = "https://app.example/"

[server]
port = 8080
public_url = "https://bot.example/"
"#,
        )
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.admin_ids(), vec![ChatIdentity(42), ChatIdentity(43)]);
        assert_eq!(config.funnel.registration_link, "https://reg.example");
        assert_eq!(config.funnel.media.intro(), Some(MediaRef::new("AgAC-intro")));
        assert!(config.funnel.media.receipt_prompt().is_none());
        assert_eq!(config.broadcast.send_delay_ms, 10);
        assert!(config.keep_alive.enabled);
        assert_eq!(config.keep_alive.interval_secs, 300);
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example/webhook")
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.webhook_path, "/webhook");
        assert_eq!(config.broadcast.send_delay_ms, 50);
        assert!(!config.keep_alive.enabled);
        assert!(config.storage.database_path.is_none());
        assert!(config.webhook_url().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("BOT_TOKEN", "999:xyz"),
                ("ADMIN_CHAT_ID", "7, 8"),
                ("REG_LINK", "https://join.example"),
                ("ENABLE_KEEP_ALIVE", "TRUE"),
                ("PING_URL", "https://ping.example"),
                ("PING_INTERVAL", "60"),
                ("DATABASE_URL", "users.db"),
                ("PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.telegram.bot_token, "999:xyz");
        assert_eq!(config.telegram.admin_chat_ids, vec![7, 8]);
        assert_eq!(config.funnel.registration_link, "https://join.example");
        assert!(config.keep_alive.enabled);
        assert_eq!(config.keep_alive.url.as_deref(), Some("https://ping.example"));
        assert_eq!(config.keep_alive.interval_secs, 60);
        assert_eq!(config.storage.database_path, Some(PathBuf::from("users.db")));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_bad_env_values_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("PING_INTERVAL", "soon")])).is_err());
        assert!(config.apply_env(env(&[("ADMIN_CHAT_ID", "abc")])).is_err());
    }

    #[test]
    fn test_validate_requires_token() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telegram.bot_token = "1:a".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_webhook_url_joins_without_double_slash() {
        let mut config = Config::default();
        config.server.public_url = Some("https://bot.example".to_string());
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example/webhook")
        );
    }
}
