//! Exporter configuration, read from the environment or the command line.

use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Parser;

use crate::breaker::BreakerOptions;
use crate::source::MariaDbOptions;

/// Invalid combination of configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Basic authentication is enabled without credentials.
    #[error("HTTP_AUTH is enabled but {0} is empty")]
    MissingCredential(&'static str),
    /// The configured password hash is not a bcrypt hash.
    #[error("HTTP_PASSWORD_HASH is not a bcrypt hash")]
    InvalidPasswordHash,
    /// A duration or threshold is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Prometheus exporter for MariaDB `USER_STATISTICS`.
#[derive(Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Address or host name to listen on.
    #[arg(long, env = "IP", default_value = "0.0.0.0")]
    pub ip: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Protect /metrics with HTTP Basic authentication.
    #[arg(
        long,
        env = "HTTP_AUTH",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub http_auth: bool,

    /// Username expected by Basic authentication.
    #[arg(long, env = "HTTP_USER", default_value = "")]
    pub http_user: String,

    /// Bcrypt hash of the password expected by Basic authentication.
    #[arg(long, env = "HTTP_PASSWORD_HASH", default_value = "", hide_env_values = true)]
    pub http_password_hash: String,

    /// MariaDB host.
    #[arg(long, env = "SQL_HOST", default_value = "localhost")]
    pub sql_host: String,

    /// MariaDB port.
    #[arg(long, env = "SQL_PORT", default_value_t = 3306)]
    pub sql_port: u16,

    /// MariaDB account allowed to read information_schema.
    #[arg(long, env = "SQL_USER", default_value = "root")]
    pub sql_user: String,

    /// Password of the MariaDB account.
    #[arg(long, env = "SQL_PASSWORD", default_value = "", hide_env_values = true)]
    pub sql_password: String,

    /// Value of the `node` label attached to every metric.
    #[arg(long, env = "NODE", default_value = "localhost")]
    pub node: String,

    /// Upper bound in seconds for each statistics query, connection included.
    #[arg(long, env = "SQL_TIMEOUT_SECS", default_value_t = 5)]
    pub sql_timeout_secs: u64,

    /// Consecutive failed queries after which MariaDB is left alone for a while.
    #[arg(long, env = "BREAKER_THRESHOLD", default_value_t = 3)]
    pub breaker_threshold: u32,

    /// Seconds to wait before querying MariaDB again after the breaker opened.
    #[arg(long, env = "BREAKER_COOLDOWN_SECS", default_value_t = 30)]
    pub breaker_cooldown_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen", &self.listen_addr())
            .field("http_auth", &self.http_auth)
            .field("http_user", &self.http_user)
            .field("sql_host", &self.sql_host)
            .field("sql_port", &self.sql_port)
            .field("sql_user", &self.sql_user)
            .field("node", &self.node)
            .field("sql_timeout_secs", &self.sql_timeout_secs)
            .field("breaker_threshold", &self.breaker_threshold)
            .field("breaker_cooldown_secs", &self.breaker_cooldown_secs)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Checks value combinations clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_auth {
            if self.http_user.is_empty() {
                return Err(ConfigError::MissingCredential("HTTP_USER"));
            }
            if self.http_password_hash.is_empty() {
                return Err(ConfigError::MissingCredential("HTTP_PASSWORD_HASH"));
            }
            if !is_bcrypt_hash(&self.http_password_hash) {
                return Err(ConfigError::InvalidPasswordHash);
            }
        }
        if self.sql_timeout_secs == 0 {
            return Err(ConfigError::Zero("SQL_TIMEOUT_SECS"));
        }
        if self.breaker_threshold == 0 {
            return Err(ConfigError::Zero("BREAKER_THRESHOLD"));
        }

        Ok(())
    }

    /// Host and port the HTTP server binds to. The host is resolved at bind
    /// time.
    pub fn listen_addr(&self) -> (&str, u16) {
        (self.ip.as_str(), self.port)
    }

    /// Connection settings for the statistics source.
    pub fn mariadb_options(&self) -> MariaDbOptions {
        MariaDbOptions {
            host: self.sql_host.clone(),
            port: self.sql_port,
            user: self.sql_user.clone(),
            password: self.sql_password.clone(),
            connect_timeout: Duration::from_secs(self.sql_timeout_secs),
        }
    }

    /// Timeout and circuit breaker settings around the statistics source.
    pub fn breaker_options(&self) -> BreakerOptions {
        BreakerOptions {
            timeout: Duration::from_secs(self.sql_timeout_secs),
            failure_threshold: self.breaker_threshold,
            cooldown: Duration::from_secs(self.breaker_cooldown_secs),
        }
    }
}

fn is_bcrypt_hash(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}
