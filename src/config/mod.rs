use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable process configuration, loaded once from the environment.
///
/// Mutable runtime state (sessions, rate-limit counters) deliberately lives
/// outside of this struct, in stores owned by `AppState`, so tests can
/// inject isolated instances.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Loopback only: this service assumes a single local operator.
    pub bind_host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Optional shared secret for headless callers. Never logged.
    pub api_key: Option<String>,
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub global_requests: u32,
    pub global_window_secs: u64,
    pub write_requests: u32,
    pub write_window_secs: u64,
    pub session_requests: u32,
    pub session_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::defaults().with_env_overrides()
    }

    fn defaults() -> Self {
        Self {
            server: ServerConfig {
                bind_host: "127.0.0.1".to_string(),
                port: 3000,
                request_timeout_secs: 30,
                max_body_bytes: 2 * 1024 * 1024, // 2MB
            },
            data: DataConfig {
                root: PathBuf::from("./data"),
            },
            security: SecurityConfig {
                api_key: None,
                session_ttl_secs: 8 * 60 * 60, // 8 hours
            },
            limits: LimitsConfig {
                global_requests: 1000,
                global_window_secs: 15 * 60,
                write_requests: 30,
                write_window_secs: 60,
                session_requests: 10,
                session_window_secs: 15 * 60,
            },
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("DYE_ADMIN_PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DYE_ADMIN_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                v.parse().unwrap_or(self.server.request_timeout_secs);
        }
        if let Ok(v) = env::var("DYE_ADMIN_MAX_BODY_BYTES") {
            self.server.max_body_bytes = v.parse().unwrap_or(self.server.max_body_bytes);
        }

        // Data overrides
        if let Ok(v) = env::var("DYE_ADMIN_DATA_DIR") {
            self.data.root = PathBuf::from(v);
        }

        // Security overrides
        if let Ok(v) = env::var("DYE_ADMIN_API_KEY") {
            if !v.is_empty() {
                self.security.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("DYE_ADMIN_SESSION_TTL_SECS") {
            self.security.session_ttl_secs = v.parse().unwrap_or(self.security.session_ttl_secs);
        }

        // Rate-limit overrides
        if let Ok(v) = env::var("DYE_ADMIN_GLOBAL_LIMIT") {
            self.limits.global_requests = v.parse().unwrap_or(self.limits.global_requests);
        }
        if let Ok(v) = env::var("DYE_ADMIN_GLOBAL_WINDOW_SECS") {
            self.limits.global_window_secs = v.parse().unwrap_or(self.limits.global_window_secs);
        }
        if let Ok(v) = env::var("DYE_ADMIN_WRITE_LIMIT") {
            self.limits.write_requests = v.parse().unwrap_or(self.limits.write_requests);
        }
        if let Ok(v) = env::var("DYE_ADMIN_WRITE_WINDOW_SECS") {
            self.limits.write_window_secs = v.parse().unwrap_or(self.limits.write_window_secs);
        }
        if let Ok(v) = env::var("DYE_ADMIN_SESSION_LIMIT") {
            self.limits.session_requests = v.parse().unwrap_or(self.limits.session_requests);
        }
        if let Ok(v) = env::var("DYE_ADMIN_SESSION_WINDOW_SECS") {
            self.limits.session_window_secs = v.parse().unwrap_or(self.limits.session_window_secs);
        }

        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.security.session_ttl_secs)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_recommended_rate_tiers() {
        let config = AppConfig::defaults();
        assert_eq!(config.limits.global_requests, 1000);
        assert_eq!(config.limits.global_window_secs, 900);
        assert_eq!(config.limits.write_requests, 30);
        assert_eq!(config.limits.write_window_secs, 60);
        assert_eq!(config.limits.session_requests, 10);
        assert_eq!(config.limits.session_window_secs, 900);
    }

    #[test]
    fn defaults_bind_loopback_with_thirty_second_timeout() {
        let config = AppConfig::defaults();
        assert_eq!(config.server.bind_host, "127.0.0.1");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.security.api_key.is_none());
    }
}
