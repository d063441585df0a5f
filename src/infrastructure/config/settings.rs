use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Audit log store selection
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" (default) or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Messaging gateway account settings.
///
/// Loaded once at startup and turned into a `GatewayConfig` that is injected
/// into the gateway client.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender identity (WhatsApp-enabled number)
    pub from: String,
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Upper bound on a single gateway call
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
    /// Approved content template SIDs keyed by message type name, any case (e.g. "REMINDER")
    #[serde(default)]
    pub content_sids: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    /// Duplicate suppression window in seconds
    #[serde(default = "default_suppression_window")]
    pub suppression_window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Enable the Redis pub/sub dispatch trigger
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

fn default_gateway_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_channel_prefix() -> String {
    "whatsapp:".to_string()
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_country_code() -> String {
    "91".to_string()
}

fn default_suppression_window() -> u64 {
    300 // 5 minutes
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "edugrow-notify".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();
        Self::load(None)
    }

    /// Build settings from files and the environment.
    ///
    /// `env_override` replaces the process environment when given.
    pub(crate) fn load(env_override: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("store.backend", "memory")?
            .set_default("dispatch.default_country_code", "91")?
            .set_default("dispatch.suppression_window_seconds", 300)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // GATEWAY__ACCOUNT_SID, GATEWAY__AUTH_TOKEN, DATABASE__URL, REDIS__URL, etc.
            .add_source(environment().source(env_override));

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Environment source. Values stay strings so phone numbers such as
/// `GATEWAY__FROM=+14155238886` keep their `+`; numeric and boolean fields are
/// converted when deserialized.
fn environment() -> Environment {
    Environment::default()
        .separator("__")
        .try_parsing(false)
        .list_separator(",")
        .with_list_parse_key("redis.channels")
}

impl GatewaySettings {
    /// Reject blank credentials or a sender without a country code before any
    /// client is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_sid.trim().is_empty() {
            return Err(ConfigError::Message(
                "gateway.account_sid is not configured".to_string(),
            ));
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "gateway.auth_token is not configured".to_string(),
            ));
        }
        if self.from.trim().is_empty() {
            return Err(ConfigError::Message(
                "gateway.from is not configured".to_string(),
            ));
        }
        let sender = self
            .from
            .trim()
            .strip_prefix(self.channel_prefix.as_str())
            .unwrap_or(self.from.trim());
        if !sender.starts_with('+') {
            return Err(ConfigError::Message(format!(
                "gateway.from must be an international number starting with '+', got {:?}",
                self.from
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            suppression_window_seconds: default_suppression_window(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channels: vec![],
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(sid: &str, token: &str, from: &str) -> GatewaySettings {
        GatewaySettings {
            account_sid: sid.to_string(),
            auth_token: token.to_string(),
            from: from.to_string(),
            base_url: default_gateway_base_url(),
            channel_prefix: default_channel_prefix(),
            timeout_seconds: default_gateway_timeout(),
            content_sids: HashMap::new(),
        }
    }

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.default_country_code, "91");
        assert_eq!(dispatch.suppression_window_seconds, 300);

        assert_eq!(StoreConfig::default().backend, "memory");
        assert!(!RedisConfig::default().enabled);
    }

    #[test]
    fn test_gateway_validation() {
        assert!(gateway("AC123", "secret", "+14155238886").validate().is_ok());
        assert!(gateway("", "secret", "+14155238886").validate().is_err());
        assert!(gateway("AC123", "  ", "+14155238886").validate().is_err());
        assert!(gateway("AC123", "secret", "").validate().is_err());
        assert!(gateway("AC123", "secret", "14155238886").validate().is_err());
        assert!(gateway("AC123", "secret", "whatsapp:+14155238886").validate().is_ok());
    }

    fn load_env(vars: &[(&str, &str)]) -> Settings {
        let vars: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::load(Some(vars)).unwrap()
    }

    #[test]
    fn test_env_sender_keeps_plus_sign() {
        let settings = load_env(&[
            ("GATEWAY__ACCOUNT_SID", "AC123"),
            ("GATEWAY__AUTH_TOKEN", "secret"),
            ("GATEWAY__FROM", "+14155238886"),
        ]);

        assert_eq!(settings.gateway.from, "+14155238886");
        assert!(settings.gateway.validate().is_ok());
    }

    #[test]
    fn test_env_numeric_and_list_values() {
        let settings = load_env(&[
            ("GATEWAY__ACCOUNT_SID", "AC123"),
            ("GATEWAY__AUTH_TOKEN", "secret"),
            ("GATEWAY__FROM", "+14155238886"),
            ("GATEWAY__TIMEOUT_SECONDS", "3"),
            ("SERVER__PORT", "9090"),
            ("DISPATCH__DEFAULT_COUNTRY_CODE", "44"),
            ("REDIS__ENABLED", "true"),
            ("REDIS__CHANNELS", "notifications:dispatch,notifications:urgent"),
            ("OTEL__SAMPLING_RATIO", "0.5"),
        ]);

        assert_eq!(settings.gateway.timeout_seconds, 3);
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.dispatch.default_country_code, "44");
        assert!(settings.redis.enabled);
        assert_eq!(
            settings.redis.channels,
            vec!["notifications:dispatch", "notifications:urgent"]
        );
        assert_eq!(settings.otel.sampling_ratio, 0.5);
    }
}
