use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub validity: ValidityConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; wins over the individual parts below when set
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(skip_serializing)]
    pub queue_connection_string: Option<String>,
    pub queue_name: String,
    #[serde(skip_serializing)]
    pub table_connection_string: Option<String>,
    pub table_name: String,
    pub relay_queue_name: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityConfig {
    /// Maximum age of a rotating code's server timestamp, inclusive
    pub freshness_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
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
        // Database overrides
        self.database.url = non_empty("DATABASE_URL");
        self.database.host = non_empty("DB_HOST");
        self.database.username = non_empty("DB_USERNAME");
        self.database.password = non_empty("DB_PASSWORD");
        self.database.name = non_empty("DB_NAME");
        if let Ok(v) = env::var("DB_PORT") {
            self.database.port = v.parse().unwrap_or(self.database.port);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Storage overrides; queue and table fall back to the shared account string
        let shared = non_empty("STORAGE_CONNECTION_STRING");
        self.storage.queue_connection_string =
            non_empty("QUEUE_CONNECTION_STRING").or_else(|| shared.clone());
        self.storage.table_connection_string = non_empty("TABLE_CONNECTION_STRING").or(shared);
        if let Some(v) = non_empty("QUEUE_NAME") {
            self.storage.queue_name = v;
        }
        if let Some(v) = non_empty("TABLE_NAME") {
            self.storage.table_name = v;
        }
        self.storage.relay_queue_name =
            non_empty("RELAY_QUEUE_NAME").unwrap_or_else(|| self.storage.queue_name.clone());
        if let Ok(v) = env::var("STORAGE_REQUEST_TIMEOUT_SECS") {
            self.storage.request_timeout_secs =
                v.parse().unwrap_or(self.storage.request_timeout_secs);
        }

        // Validity overrides
        if let Ok(v) = env::var("CODE_FRESHNESS_WINDOW_SECS") {
            self.validity.freshness_window_secs =
                v.parse().unwrap_or(self.validity.freshness_window_secs);
        }

        // API overrides
        if let Some(v) = non_empty("ATTENDANCE_API_PORT").or_else(|| non_empty("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 5,
                connection_timeout: 30,
                ..DatabaseConfig::unset()
            },
            storage: StorageConfig {
                request_timeout_secs: 30,
                ..StorageConfig::unset()
            },
            validity: ValidityConfig::default(),
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig { enable_cors: true },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 10,
                ..DatabaseConfig::unset()
            },
            storage: StorageConfig {
                request_timeout_secs: 10,
                ..StorageConfig::unset()
            },
            validity: ValidityConfig::default(),
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 64 * 1024, // 64KB
            },
            security: SecurityConfig { enable_cors: true },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 5,
                ..DatabaseConfig::unset()
            },
            storage: StorageConfig {
                request_timeout_secs: 5,
                ..StorageConfig::unset()
            },
            validity: ValidityConfig::default(),
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 16 * 1024, // 16KB
            },
            security: SecurityConfig { enable_cors: false },
        }
    }
}

impl DatabaseConfig {
    fn unset() -> Self {
        Self {
            url: None,
            host: None,
            port: 5432,
            username: None,
            password: None,
            name: None,
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

impl StorageConfig {
    fn unset() -> Self {
        Self {
            queue_connection_string: None,
            queue_name: "attendance-dead-letter".to_string(),
            table_connection_string: None,
            table_name: "HttpRequestLog".to_string(),
            relay_queue_name: "attendance-dead-letter".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self { freshness_window_secs: 10 }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
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
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.validity.freshness_window_secs, 10);
        assert_eq!(config.database.port, 5432);
        assert!(config.security.enable_cors);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.enable_cors);
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.storage.table_name, "HttpRequestLog");
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.database.password = Some("hunter2".to_string());
        config.storage.queue_connection_string = Some("AccountKey=secret".to_string());
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("AccountKey"));
    }
}
