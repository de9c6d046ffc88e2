use anyhow::Context;
use serde::{Deserialize, Serialize};
use smsr_core::notification::parse_recipients;
use std::{
    net::{Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_PORT: u16 = 9374;
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,

    // Shared secret devices send in X-Auth-Key
    pub auth_key: String,

    // Telegram
    pub bot_token: String,
    pub telegram_api_base: String,
    pub send_timeout_secs: u64,

    // Legacy encrypted ingestion; disabled without a passphrase
    pub legacy_passphrase: Option<String>,
    pub legacy_recipients: Vec<String>,

    pub max_body_size: usize,

    // ID responder
    pub id_responder: bool,
    pub poll_timeout_secs: u64,

    // Graceful shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            auth_key: String::new(),
            bot_token: String::new(),
            telegram_api_base: DEFAULT_API_BASE.to_string(),
            send_timeout_secs: 15,
            legacy_passphrase: None,
            legacy_recipients: Vec::new(),
            max_body_size: 256 * 1024, // 256KB
            id_responder: true,
            poll_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("send_timeout_secs", &self.send_timeout_secs)
            .field("legacy_enabled", &self.legacy_passphrase.is_some())
            .field("legacy_recipients", &self.legacy_recipients)
            .field("max_body_size", &self.max_body_size)
            .field("id_responder", &self.id_responder)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .finish_non_exhaustive()
    }
}

fn parse_var<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}", name))
}

fn parse_flag(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid value for {}: {:?}", name, other),
    }
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from `SMSR_*` variables resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("SMSR_BIND_ADDR") {
            config.bind_addr = parse_var("SMSR_BIND_ADDR", &addr)?;
        }

        if let Some(key) = lookup("SMSR_AUTH_KEY") {
            config.auth_key = key;
        }

        if let Some(token) = lookup("SMSR_BOT_TOKEN") {
            config.bot_token = token.trim().to_string();
        }

        if let Some(base) = lookup("SMSR_TELEGRAM_API_BASE") {
            config.telegram_api_base = base.trim().to_string();
        }

        if let Some(secs) = lookup("SMSR_SEND_TIMEOUT_SECS") {
            config.send_timeout_secs = parse_var("SMSR_SEND_TIMEOUT_SECS", &secs)?;
        }

        if let Some(passphrase) = lookup("SMSR_LEGACY_PASSPHRASE") {
            config.legacy_passphrase = Some(passphrase).filter(|p| !p.is_empty());
        }

        if let Some(ids) = lookup("SMSR_LEGACY_RECIPIENTS") {
            config.legacy_recipients = parse_recipients(&ids);
        }

        if let Some(size) = lookup("SMSR_MAX_BODY_SIZE") {
            config.max_body_size = parse_var("SMSR_MAX_BODY_SIZE", &size)?;
        }

        if let Some(flag) = lookup("SMSR_ID_RESPONDER") {
            config.id_responder = parse_flag("SMSR_ID_RESPONDER", &flag)?;
        }

        if let Some(secs) = lookup("SMSR_POLL_TIMEOUT_SECS") {
            config.poll_timeout_secs = parse_var("SMSR_POLL_TIMEOUT_SECS", &secs)?;
        }

        if let Some(secs) = lookup("SMSR_SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown_timeout_secs = parse_var("SMSR_SHUTDOWN_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }

    pub fn from_toml(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth_key.is_empty() {
            anyhow::bail!("auth_key must be set");
        }

        if self.bot_token.is_empty() {
            anyhow::bail!("bot_token must be set");
        }

        if self.max_body_size == 0 {
            anyhow::bail!("max_body_size must be > 0");
        }

        if self.legacy_passphrase.is_some() && self.legacy_recipients.is_empty() {
            anyhow::bail!("legacy_passphrase requires at least one legacy recipient");
        }

        Ok(())
    }

    /// `None` when per-send timeouts are disabled.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_secs > 0).then(|| Duration::from_secs(self.send_timeout_secs))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
