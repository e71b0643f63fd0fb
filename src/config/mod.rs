//! Configuration module for the conference catalog backend.
//!
//! Configuration is read from a `.env` file (if present) and environment
//! variables prefixed with `CATALOG_`, falling back to local-development defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set when OAuth is enabled")]
    MissingOauthSetting(&'static str),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    Sqlite,
    MySql,
}

impl FromStr for DbDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite3" | "sqlite" => Ok(DbDriver::Sqlite),
            "mysql" => Ok(DbDriver::MySql),
            other => Err(format!("must be one of [sqlite3, mysql], was {other}")),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub driver: DbDriver,
    /// File path for sqlite3, schema name for mysql
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    /// Connection URL understood by the sqlx `Any` driver.
    pub fn url(&self) -> String {
        match self.driver {
            DbDriver::Sqlite => format!("sqlite:{}?mode=rwc", self.name),
            DbDriver::MySql => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

/// OAuth2 / OpenID Connect settings for the write gate.
#[derive(Debug, Clone, Default)]
pub struct OauthConfig {
    pub enabled: bool,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log every SQL statement
    pub log_persistence: bool,
    pub database: DatabaseConfig,
    /// Wipe and load the demonstration dataset at startup
    pub seed_on_startup: bool,
    /// Expose `POST /initDB` (behind the access gate)
    pub admin_reseed_enabled: bool,
    pub oauth: OauthConfig,
    /// Upper bound for a single request
    pub request_timeout: Duration,
    /// Upper bound for draining in-flight requests on shutdown
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_addr = parse_var("CATALOG_BIND_ADDR", "127.0.0.1:9090")?;
        let log_level = string_var("CATALOG_LOG_LEVEL", "info");
        let log_persistence = parse_var("CATALOG_LOG_PERSISTENCE", "false")?;

        let database = DatabaseConfig {
            driver: parse_var("CATALOG_DB_DRIVER", "sqlite3")?,
            name: string_var("CATALOG_DB_NAME", "./data/catalog.sqlite"),
            host: string_var("CATALOG_DB_HOST", "localhost"),
            port: parse_var("CATALOG_DB_PORT", "3306")?,
            user: string_var("CATALOG_DB_USER", "root"),
            password: string_var("CATALOG_DB_PASSWORD", ""),
        };

        let oauth = OauthConfig {
            enabled: parse_var("CATALOG_OAUTH_ENABLE", "false")?,
            issuer: string_var("CATALOG_OAUTH_ISSUER", ""),
            client_id: string_var("CATALOG_OAUTH_CLIENT_ID", ""),
            client_secret: string_var("CATALOG_OAUTH_CLIENT_SECRET", ""),
            redirect_url: string_var(
                "CATALOG_OAUTH_REDIRECT_URL",
                "http://127.0.0.1:9090/oauth2/callback",
            ),
        };
        if oauth.enabled {
            if oauth.issuer.is_empty() {
                return Err(ConfigError::MissingOauthSetting("CATALOG_OAUTH_ISSUER"));
            }
            if oauth.client_id.is_empty() {
                return Err(ConfigError::MissingOauthSetting("CATALOG_OAUTH_CLIENT_ID"));
            }
        }

        Ok(Self {
            bind_addr,
            log_level,
            log_persistence,
            database,
            seed_on_startup: parse_var("CATALOG_SEED_ON_STARTUP", "false")?,
            admin_reseed_enabled: parse_var("CATALOG_ADMIN_RESEED_ENABLED", "false")?,
            oauth,
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
        })
    }
}

fn string_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = string_var(key, default);
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "CATALOG_BIND_ADDR",
        "CATALOG_LOG_LEVEL",
        "CATALOG_LOG_PERSISTENCE",
        "CATALOG_DB_DRIVER",
        "CATALOG_DB_NAME",
        "CATALOG_DB_PORT",
        "CATALOG_SEED_ON_STARTUP",
        "CATALOG_ADMIN_RESEED_ENABLED",
        "CATALOG_OAUTH_ENABLE",
        "CATALOG_OAUTH_ISSUER",
        "CATALOG_OAUTH_CLIENT_ID",
    ];

    // Environment variables are process-wide; keep every env-mutating
    // assertion in this single test.
    #[test]
    fn test_config_from_env() {
        for key in KEYS {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9090");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_persistence);
        assert_eq!(config.database.driver, DbDriver::Sqlite);
        assert_eq!(config.database.url(), "sqlite:./data/catalog.sqlite?mode=rwc");
        assert!(!config.seed_on_startup);
        assert!(!config.admin_reseed_enabled);
        assert!(!config.oauth.enabled);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));

        env::set_var("CATALOG_DB_DRIVER", "postgres");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { key: "CATALOG_DB_DRIVER", .. })
        ));
        env::remove_var("CATALOG_DB_DRIVER");

        env::set_var("CATALOG_OAUTH_ENABLE", "true");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingOauthSetting("CATALOG_OAUTH_ISSUER"))
        ));
        env::remove_var("CATALOG_OAUTH_ENABLE");
    }

    #[test]
    fn test_mysql_url() {
        let db = DatabaseConfig {
            driver: DbDriver::MySql,
            name: "catalog".to_string(),
            host: "db".to_string(),
            port: 3307,
            user: "app".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(db.url(), "mysql://app:secret@db:3307/catalog");
    }

    #[test]
    fn test_driver_parsing() {
        assert_eq!("sqlite3".parse::<DbDriver>(), Ok(DbDriver::Sqlite));
        assert_eq!("mysql".parse::<DbDriver>(), Ok(DbDriver::MySql));
        assert!("oracle".parse::<DbDriver>().is_err());
    }
}
