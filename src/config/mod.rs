use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing configuration: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub signature: SignatureConfig,
    pub security: SecurityConfig,
    /// YAML policy table; the built-in table is used when unset
    pub policy_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub database_url: Option<String>,
    #[serde(skip_serializing)]
    pub session_jwt_secret: String,
    pub session_cookie: String,
    pub timeout_ms: u64,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub credential_ttl_secs: u64,
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    /// Secrets keyed by the `X-Device-Class` header value
    #[serde(skip_serializing)]
    pub device_secrets: HashMap<String, String>,
    pub freshness_window_ms: u64,
    pub require_timestamp: bool,
    pub replay_protection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed
    pub trusted_proxies: Vec<IpAddr>,
    pub security_headers: bool,
    /// Send `Strict-Transport-Security`; only meaningful behind TLS
    pub hsts: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("CAMPUS_GATEWAY_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_MAX_BODY_BYTES") {
            self.server.max_body_bytes = v.parse().unwrap_or(self.server.max_body_bytes);
        }

        // Identity overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.identity.database_url = Some(v);
        }
        if let Ok(v) = env::var("SESSION_JWT_SECRET") {
            self.identity.session_jwt_secret = v;
        }
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.identity.session_cookie = v;
        }
        if let Ok(v) = env::var("IDENTITY_TIMEOUT_MS") {
            self.identity.timeout_ms = v.parse().unwrap_or(self.identity.timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.identity.max_connections = v.parse().unwrap_or(self.identity.max_connections);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_CREDENTIAL_TTL_SECS") {
            self.cache.credential_ttl_secs = v.parse().unwrap_or(self.cache.credential_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = v.parse().unwrap_or(self.cache.max_entries);
        }
        if let Ok(v) = env::var("CACHE_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs = v.parse().unwrap_or(self.cache.sweep_interval_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }

        // Signature overrides
        if let Ok(v) = env::var("SIGNATURE_SECRET") {
            self.signature.secret = v;
        }
        if let Ok(v) = env::var("SIGNATURE_DEVICE_SECRETS") {
            self.signature.device_secrets = parse_device_secrets(&v);
        }
        if let Ok(v) = env::var("SIGNATURE_FRESHNESS_WINDOW_MS") {
            self.signature.freshness_window_ms = v.parse().unwrap_or(self.signature.freshness_window_ms);
        }
        if let Ok(v) = env::var("SIGNATURE_REQUIRE_TIMESTAMP") {
            self.signature.require_timestamp = v.parse().unwrap_or(self.signature.require_timestamp);
        }
        if let Ok(v) = env::var("SIGNATURE_REPLAY_PROTECTION") {
            self.signature.replay_protection = v.parse().unwrap_or(self.signature.replay_protection);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("SECURITY_TRUSTED_PROXIES") {
            self.security.trusted_proxies = parse_trusted_proxies(&v);
        }
        if let Ok(v) = env::var("SECURITY_HEADERS") {
            self.security.security_headers = v.parse().unwrap_or(self.security.security_headers);
        }
        if let Ok(v) = env::var("SECURITY_HSTS") {
            self.security.hsts = v.parse().unwrap_or(self.security.hsts);
        }

        if let Ok(v) = env::var("GATEWAY_POLICY_FILE") {
            self.policy_file = Some(v);
        }

        self
    }

    /// Reject configurations the gateway cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.credential_ttl_secs == 0 {
            return Err(ConfigError::Invalid("credential cache TTL must be positive".into()));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep interval must be positive".into()));
        }
        if self.identity.timeout_ms == 0 {
            return Err(ConfigError::Invalid("identity timeout must be positive".into()));
        }
        if self.signature.freshness_window_ms == 0 {
            return Err(ConfigError::Invalid("freshness window must be positive".into()));
        }
        if self.api.enable_rate_limiting
            && (self.api.rate_limit_requests == 0 || self.api.rate_limit_window_secs == 0)
        {
            return Err(ConfigError::Invalid("default rate limit must be positive".into()));
        }
        if self.environment == Environment::Production {
            if self.identity.session_jwt_secret.is_empty() {
                return Err(ConfigError::Missing("SESSION_JWT_SECRET"));
            }
            if self.signature.secret.is_empty() && self.signature.device_secrets.is_empty() {
                return Err(ConfigError::Missing("SIGNATURE_SECRET"));
            }
            if self.identity.database_url.is_none() {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                max_body_bytes: 1024 * 1024, // 1MB
            },
            identity: IdentityConfig {
                database_url: None,
                session_jwt_secret: String::new(),
                session_cookie: "sb-access-token".to_string(),
                timeout_ms: 5_000,
                max_connections: 10,
            },
            cache: CacheConfig {
                credential_ttl_secs: 30,
                max_entries: 10_000,
                sweep_interval_secs: 60,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
            },
            signature: SignatureConfig {
                secret: String::new(),
                device_secrets: HashMap::new(),
                freshness_window_ms: 5 * 60 * 1000,
                require_timestamp: true,
                replay_protection: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
                enable_audit_logging: false,
                trusted_proxies: Vec::new(),
                security_headers: true,
                hsts: false,
            },
            policy_file: None,
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.identity.timeout_ms = 3_000;
        config.identity.max_connections = 20;
        config.api = ApiConfig {
            enable_rate_limiting: true,
            rate_limit_requests: 300,
            rate_limit_window_secs: 60,
        };
        config.security = SecurityConfig {
            enable_cors: true,
            cors_origins: vec!["https://staging.example.com".to_string()],
            enable_audit_logging: true,
            trusted_proxies: Vec::new(),
            security_headers: true,
            hsts: false,
        };
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.max_body_bytes = 256 * 1024;
        config.identity.timeout_ms = 2_000;
        config.identity.max_connections = 50;
        config.cache.credential_ttl_secs = 20;
        config.api = ApiConfig {
            enable_rate_limiting: true,
            rate_limit_requests: 300,
            rate_limit_window_secs: 60,
        };
        config.security = SecurityConfig {
            enable_cors: true,
            cors_origins: vec!["https://app.example.com".to_string()],
            enable_audit_logging: true,
            trusted_proxies: Vec::new(),
            security_headers: true,
            hsts: true,
        };
        config
    }
}

/// Parse `class=secret,class=secret` pairs.
fn parse_device_secrets(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(class, secret)| (class.trim().to_string(), secret.trim().to_string()))
        .filter(|(class, secret)| !class.is_empty() && !secret.is_empty())
        .collect()
}

/// Comma separated proxy addresses; entries that do not parse are skipped.
fn parse_trusted_proxies(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!("Ignoring unparseable trusted proxy '{}'", s);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.api.enable_rate_limiting);
        assert_eq!(config.signature.freshness_window_ms, 300_000);
        assert_eq!(config.identity.session_cookie, "sb-access-token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let mut config = AppConfig::production();
        assert!(config.api.enable_rate_limiting);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SESSION_JWT_SECRET"))));

        config.identity.session_jwt_secret = "jwt".into();
        config.signature.secret = "hmac".into();
        config.identity.database_url = Some("postgres://localhost/campus".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_ttl() {
        let mut config = AppConfig::development();
        config.cache.credential_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_device_secret_pairs() {
        let secrets = parse_device_secrets("luminex=abc, kiosk = def,broken,=x");
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets["luminex"], "abc");
        assert_eq!(secrets["kiosk"], "def");
    }

    #[test]
    fn forwarded_headers_untrusted_by_default() {
        assert!(AppConfig::development().security.trusted_proxies.is_empty());
        assert!(AppConfig::production().security.trusted_proxies.is_empty());
        assert!(AppConfig::production().security.hsts);
    }

    #[test]
    fn parses_trusted_proxy_list() {
        let proxies = parse_trusted_proxies("10.0.0.1, ::1,not-an-ip,");
        assert_eq!(proxies, vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]);
    }
}
