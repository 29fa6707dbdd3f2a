use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_SEND_TIME: &str = "09:00";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_COUNTRY_CODE: &str = "506";
pub const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 15_000;

/// Top-level config (duebell.toml + DUEBELL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuebellConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// When reminders go out, in civil time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Local time of day, `HH:MM` 24-hour.
    #[serde(default = "default_send_time")]
    pub send_time: String,
    /// IANA zone name the send time is interpreted in (e.g. "America/Costa_Rica").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            send_time: default_send_time(),
            timezone: default_timezone(),
        }
    }
}

/// WhatsApp channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Prepended to local numbers that carry fewer than 11 digits.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    /// Base URL of the HTTP bridge in front of the WhatsApp client.
    /// When unset, reminders stay pending because nothing can send them.
    pub bridge_url: Option<String>,
    /// HMAC-SHA256 secret the bridge signs inbound events with.
    /// When unset, inbound events are accepted unauthenticated.
    pub webhook_secret: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            bridge_url: None,
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between due-reminder scans.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on a single send; exceeding it records the reminder as failed.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_DISPATCH_INTERVAL_SECS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_send_time() -> String {
    DEFAULT_SEND_TIME.to_string()
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_string()
}
fn default_interval_secs() -> u64 {
    DEFAULT_DISPATCH_INTERVAL_SECS
}
fn default_send_timeout_ms() -> u64 {
    DEFAULT_SEND_TIMEOUT_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.duebell/duebell.db", home)
}

impl DuebellConfig {
    /// Load config from a TOML file with DUEBELL_* env var overrides.
    ///
    /// Uses the explicit path when given, otherwise ~/.duebell/duebell.toml.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: DuebellConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DUEBELL_").split("__"))
            .extract()
            .map_err(|e| crate::error::DuebellError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.duebell/duebell.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_when_file_missing() {
        Jail::expect_with(|_jail| {
            let cfg = DuebellConfig::load(Some("does-not-exist.toml")).unwrap();
            assert_eq!(cfg.reminders.send_time, "09:00");
            assert_eq!(cfg.reminders.timezone, "UTC");
            assert_eq!(cfg.dispatch.interval_secs, DEFAULT_DISPATCH_INTERVAL_SECS);
            assert!(cfg.whatsapp.bridge_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_file_is_read() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "duebell.toml",
                r#"
                [reminders]
                send_time = "08:30"
                timezone = "America/Costa_Rica"

                [whatsapp]
                default_country_code = "52"
                bridge_url = "http://127.0.0.1:3000"
                "#,
            )?;
            let cfg = DuebellConfig::load(Some("duebell.toml")).unwrap();
            assert_eq!(cfg.reminders.send_time, "08:30");
            assert_eq!(cfg.reminders.timezone, "America/Costa_Rica");
            assert_eq!(cfg.whatsapp.default_country_code, "52");
            assert_eq!(
                cfg.whatsapp.bridge_url.as_deref(),
                Some("http://127.0.0.1:3000")
            );
            // untouched sections keep their defaults
            assert_eq!(cfg.gateway.port, DEFAULT_PORT);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("duebell.toml", "[reminders]\ntimezone = \"UTC\"\n")?;
            jail.set_env("DUEBELL_REMINDERS__TIMEZONE", "Europe/Madrid");
            jail.set_env("DUEBELL_DISPATCH__INTERVAL_SECS", "5");
            let cfg = DuebellConfig::load(Some("duebell.toml")).unwrap();
            assert_eq!(cfg.reminders.timezone, "Europe/Madrid");
            assert_eq!(cfg.dispatch.interval_secs, 5);
            Ok(())
        });
    }
}
