use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub addresses: AddressSourceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database: DatabaseConfig::from_env()?,
            addresses: AddressSourceConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection settings for the relational store holding the address table.
///
/// `url` wins over the discrete fields when present; a `sqlite:` URL selects
/// the SQLite backend, anything else is treated as PostgreSQL.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub database: String,
    pub max_connections: u32,
    /// How long a query waits for a pooled connection before failing.
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DB_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidDatabasePort)?;
        let username = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("DB_PASSWORD").ok();
        let database = env::var("DB_NAME").unwrap_or_else(|_| "tobacco_retail".to_string());
        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or(ConfigError::InvalidPoolSize)?;
        let acquire_timeout = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidAcquireTimeout)?;

        Ok(Self {
            url,
            host,
            port,
            username,
            password,
            database,
            max_connections,
            acquire_timeout,
        })
    }

    pub fn is_sqlite(&self) -> bool {
        self.url
            .as_deref()
            .map(|url| url.trim_start().starts_with("sqlite:"))
            .unwrap_or(false)
    }
}

// Credentials are redacted.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Where the address dataset comes from and which table it lands in.
#[derive(Debug, Clone)]
pub struct AddressSourceConfig {
    pub csv_path: PathBuf,
    pub table: String,
}

impl AddressSourceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let csv_path = env::var("ADDRESS_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/address.csv"));
        let table = env::var("ADDRESS_TABLE").unwrap_or_else(|_| "address".to_string());
        if table.trim().is_empty() {
            return Err(ConfigError::EmptyTableName);
        }

        Ok(Self { csv_path, table })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDatabasePort,
    InvalidPoolSize,
    InvalidAcquireTimeout,
    EmptyTableName,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDatabasePort => write!(f, "DB_PORT must be a valid u16"),
            ConfigError::InvalidPoolSize => {
                write!(f, "DB_MAX_CONNECTIONS must be a positive integer")
            }
            ConfigError::InvalidAcquireTimeout => {
                write!(f, "DB_ACQUIRE_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::EmptyTableName => write!(f, "ADDRESS_TABLE must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDatabasePort
            | ConfigError::InvalidPoolSize
            | ConfigError::InvalidAcquireTimeout
            | ConfigError::EmptyTableName => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "DATABASE_URL",
            "DB_HOST",
            "DB_PORT",
            "DB_USER",
            "DB_PASSWORD",
            "DB_NAME",
            "DB_MAX_CONNECTIONS",
            "DB_ACQUIRE_TIMEOUT_SECS",
            "ADDRESS_CSV_PATH",
            "ADDRESS_TABLE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.database, "tobacco_retail");
        assert!(config.database.url.is_none());
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
        assert!(!config.database.is_sqlite());
        assert_eq!(config.addresses.csv_path, PathBuf::from("data/address.csv"));
        assert_eq!(config.addresses.table, "address");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8000));
        reset_env();
    }

    #[test]
    fn database_url_selects_sqlite_backend() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DATABASE_URL", "sqlite://addresses.db");
        env::set_var("ADDRESS_CSV_PATH", "/srv/data/address.csv");
        env::set_var("DB_ACQUIRE_TIMEOUT_SECS", "2");
        let config = AppConfig::load().expect("config loads");
        assert!(config.database.is_sqlite());
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(2));
        assert_eq!(
            config.addresses.csv_path,
            PathBuf::from("/srv/data/address.csv")
        );
        reset_env();
    }

    #[test]
    fn rejects_invalid_database_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DB_PORT", "not-a-port");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDatabasePort)
        ));

        reset_env();
        env::set_var("DB_MAX_CONNECTIONS", "0");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPoolSize)));

        reset_env();
        env::set_var("DB_ACQUIRE_TIMEOUT_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidAcquireTimeout)
        ));

        reset_env();
        env::set_var("ADDRESS_TABLE", "  ");
        assert!(matches!(AppConfig::load(), Err(ConfigError::EmptyTableName)));
        reset_env();
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config = DatabaseConfig {
            url: Some("postgres://team:secret@db:5432/tobacco_retail".to_string()),
            host: "db".to_string(),
            port: 5432,
            username: "team".to_string(),
            password: Some("secret".to_string()),
            database: "tobacco_retail".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
