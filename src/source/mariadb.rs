//! [`StatsSource`] reading `information_schema` over a MySQL-protocol connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Row};

use super::{SourceError, StatsSource};
use crate::stats::StatsRow;

const USER_STATISTICS_QUERY: &str = "SELECT * FROM information_schema.USER_STATISTICS";
const MEMORY_USED_QUERY: &str = "SELECT VARIABLE_VALUE FROM information_schema.GLOBAL_STATUS \
     WHERE VARIABLE_NAME = 'MEMORY_USED'";

/// Connection parameters of a [`MariaDbSource`].
#[derive(Clone)]
pub struct MariaDbOptions {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Account used to read `information_schema`.
    pub user: String,
    /// Password of [`MariaDbOptions::user`].
    pub password: String,
    /// Upper bound for establishing a connection.
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for MariaDbOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MariaDbOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for MariaDbOptions {
    fn default() -> Self {
        MariaDbOptions {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Reads `USER_STATISTICS` and the `MEMORY_USED` status variable.
///
/// Every fetch opens its own connection and closes it before returning. A
/// fetch future that is dropped mid-way drops the connection with it.
pub struct MariaDbSource {
    options: MariaDbOptions,
    connect_options: MySqlConnectOptions,
}

impl std::fmt::Debug for MariaDbSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MariaDbSource")
            .field("options", &self.options)
            .finish()
    }
}

impl MariaDbSource {
    /// Creates a source; no connection is made until the first fetch.
    pub fn new(options: MariaDbOptions) -> Self {
        let connect_options = MySqlConnectOptions::new()
            .host(&options.host)
            .port(options.port)
            .username(&options.user)
            .password(&options.password)
            .database("information_schema");

        MariaDbSource {
            options,
            connect_options,
        }
    }

    async fn connect(&self) -> Result<MySqlConnection, SourceError> {
        let timeout = self.options.connect_timeout;
        match tokio::time::timeout(timeout, self.connect_options.connect()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(SourceError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl StatsSource for MariaDbSource {
    async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError> {
        let start = Instant::now();
        let mut conn = self.connect().await?;

        let rows = sqlx::query(USER_STATISTICS_QUERY)
            .fetch_all(&mut conn)
            .await?
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        close(conn).await;

        tracing::debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched user statistics"
        );
        Ok(rows)
    }

    async fn fetch_memory_used(&self) -> Result<f64, SourceError> {
        let mut conn = self.connect().await?;

        let row = sqlx::query(MEMORY_USED_QUERY)
            .fetch_optional(&mut conn)
            .await?;

        close(conn).await;

        let row = row.ok_or(SourceError::Missing("MEMORY_USED"))?;
        let value: String = row.try_get("VARIABLE_VALUE")?;
        parse_status_value(&value)
    }
}

// Decoding a `MySqlRow` needs a live server; the numeric fallback is
// covered through `numeric_value`.
fn decode_row(row: &MySqlRow) -> Result<StatsRow, SourceError> {
    let user = match row.try_get::<String, _>("USER") {
        Ok(user) => user,
        Err(_) => {
            let raw: Vec<u8> = row.try_get("USER").map_err(|e| SourceError::Column {
                column: "USER",
                reason: e.to_string(),
            })?;
            String::from_utf8_lossy(&raw).into_owned()
        }
    };

    StatsRow::from_columns(user, |column| numeric_column(row, column))
}

// The result is already read; a failed close only loses the connection.
async fn close(conn: MySqlConnection) {
    if let Err(error) = conn.close().await {
        tracing::debug!(%error, "failed to close database connection");
    }
}

// USER_STATISTICS mixes INT, BIGINT and DOUBLE columns.
fn numeric_column(row: &MySqlRow, column: &'static str) -> Result<f64, SourceError> {
    numeric_value(
        || row.try_get::<f64, _>(column),
        || row.try_get::<i64, _>(column),
        || row.try_get::<u64, _>(column),
    )
    .map_err(|e| SourceError::Column {
        column,
        reason: e.to_string(),
    })
}

// Tries DOUBLE, then signed, then unsigned; the last error wins.
fn numeric_value<E>(
    double: impl FnOnce() -> Result<f64, E>,
    signed: impl FnOnce() -> Result<i64, E>,
    unsigned: impl FnOnce() -> Result<u64, E>,
) -> Result<f64, E> {
    double()
        .or_else(|_| signed().map(|v| v as f64))
        .or_else(|_| unsigned().map(|v| v as f64))
}

fn parse_status_value(value: &str) -> Result<f64, SourceError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| SourceError::Parse(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_values() {
        assert_eq!(1048576.0, parse_status_value("1048576").unwrap());
        assert_eq!(42.0, parse_status_value(" 42\n").unwrap());
        assert!(matches!(
            parse_status_value("OFF"),
            Err(SourceError::Parse(v)) if v == "OFF"
        ));
    }

    #[test]
    fn numeric_fallback_order() {
        let unused_i = || -> Result<i64, &str> { panic!("signed decoded after double") };
        let unused_u = || -> Result<u64, &str> { panic!("unsigned decoded after double") };
        assert_eq!(Ok(0.5), numeric_value(|| Ok(0.5), unused_i, unused_u));

        let unused_u = || -> Result<u64, &str> { panic!("unsigned decoded after signed") };
        assert_eq!(Ok(-3.0), numeric_value(|| Err("int"), || Ok(-3), unused_u));

        assert_eq!(
            Ok(u64::MAX as f64),
            numeric_value(|| Err("int"), || Err("unsigned"), || Ok(u64::MAX))
        );
        assert_eq!(
            Err("not a number"),
            numeric_value::<&str>(|| Err("double"), || Err("signed"), || Err("not a number"))
        );
    }

    #[test]
    fn debug_redacts_password() {
        let options = MariaDbOptions {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", MariaDbSource::new(options));

        assert!(!printed.contains("hunter2"));
    }
}
