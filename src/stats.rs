//! Per-user statistics rows.
//!
//! The [`StatsRow`] type and the per-user half of the metric catalog are
//! generated from a single table, so a counter cannot be added to one without
//! the other.

/// Per-user counter: metric name, help text and the accessor reading its value
/// from a [`StatsRow`].
#[derive(Clone, Copy)]
pub(crate) struct UserCounter {
    pub(crate) name: &'static str,
    pub(crate) help: &'static str,
    pub(crate) value: fn(&StatsRow) -> f64,
}

macro_rules! user_statistics {
    ($( $field:ident: $column:literal => $name:literal, $help:literal; )*) => {
        /// One row of `information_schema.USER_STATISTICS`.
        ///
        /// All counters are cumulative since server start (or the last
        /// `FLUSH USER_STATISTICS`).
        #[derive(Clone, Debug, Default, PartialEq)]
        #[allow(missing_docs)]
        pub struct StatsRow {
            /// Account name, exported as the `user` label.
            pub user: String,
            $( pub $field: f64, )*
        }

        impl StatsRow {
            /// Names of the numeric `USER_STATISTICS` columns, in catalog order.
            pub const COLUMNS: &'static [&'static str] = &[$( $column, )*];

            /// Builds a row by asking `column` for every numeric column.
            ///
            /// The first failing column aborts the construction, a row is never
            /// partially filled.
            pub fn from_columns<E>(
                user: impl Into<String>,
                mut column: impl FnMut(&'static str) -> Result<f64, E>,
            ) -> Result<Self, E> {
                Ok(StatsRow {
                    user: user.into(),
                    $( $field: column($column)?, )*
                })
            }
        }

        mod accessors {
            use super::StatsRow;

            $( pub(super) fn $field(row: &StatsRow) -> f64 {
                row.$field
            } )*
        }

        pub(crate) const USER_COUNTERS: &[UserCounter] = &[
            $( UserCounter {
                name: $name,
                help: $help,
                value: accessors::$field,
            }, )*
        ];
    };
}

user_statistics! {
    total_connections: "TOTAL_CONNECTIONS" => "mariadb_stats_total_connections",
        "The number of connections created for this user.";
    concurrent_connections: "CONCURRENT_CONNECTIONS" => "mariadb_stats_concurrent_connections",
        "The number of concurrent connections for this user.";
    connected_time: "CONNECTED_TIME" => "mariadb_stats_connected_time",
        "The cumulative number of seconds elapsed while there were connections from this user.";
    busy_time: "BUSY_TIME" => "mariadb_stats_busy_time",
        "The cumulative number of seconds there was activity on connections from this user.";
    cpu_time: "CPU_TIME" => "mariadb_stats_cpu_time",
        "The cumulative CPU time elapsed while servicing this user's connections.";
    bytes_received: "BYTES_RECEIVED" => "mariadb_stats_bytes_received",
        "The number of bytes received from this user's connections.";
    bytes_sent: "BYTES_SENT" => "mariadb_stats_bytes_send",
        "The number of bytes sent to this user's connections.";
    binlog_bytes_written: "BINLOG_BYTES_WRITTEN" => "mariadb_stats_binlog_bytes_written",
        "The number of bytes written to the binary log from this user's connections.";
    rows_read: "ROWS_READ" => "mariadb_stats_rows_read",
        "The number of rows read by this user's connections.";
    rows_sent: "ROWS_SENT" => "mariadb_stats_rows_sent",
        "The number of rows sent by this user's connections.";
    rows_deleted: "ROWS_DELETED" => "mariadb_stats_rows_deleted",
        "The number of rows deleted by this user's connections.";
    rows_inserted: "ROWS_INSERTED" => "mariadb_stats_rows_inserted",
        "The number of rows inserted by this user's connections.";
    rows_updated: "ROWS_UPDATED" => "mariadb_stats_rows_updated",
        "The number of rows updated by this user's connections.";
    select_commands: "SELECT_COMMANDS" => "mariadb_stats_select_commands",
        "The number of SELECT commands executed from this user's connections.";
    update_commands: "UPDATE_COMMANDS" => "mariadb_stats_update_commands",
        "The number of UPDATE commands executed from this user's connections.";
    other_commands: "OTHER_COMMANDS" => "mariadb_stats_other_commands",
        "The number of other commands executed from this user's connections.";
    commit_transactions: "COMMIT_TRANSACTIONS" => "mariadb_stats_commit_transactions",
        "The number of COMMIT commands issued by this user's connections.";
    rollback_transactions: "ROLLBACK_TRANSACTIONS" => "mariadb_stats_rollback_transactions",
        "The number of ROLLBACK commands issued by this user's connections.";
    denied_connections: "DENIED_CONNECTIONS" => "mariadb_stats_denied_connections",
        "The number of connections denied to this user.";
    lost_connections: "LOST_CONNECTIONS" => "mariadb_stats_lost_connections",
        "The number of this user's connections that were terminated uncleanly.";
    access_denied: "ACCESS_DENIED" => "mariadb_stats_access_denied",
        "The number of times this user's connections issued commands that were denied.";
    empty_queries: "EMPTY_QUERIES" => "mariadb_stats_empty_queries",
        "The number of times this user's connections sent empty queries to the server.";
    total_ssl_connections: "TOTAL_SSL_CONNECTIONS" => "mariadb_stats_total_ssl_connections",
        "The number of TLS connections created for this user. (>= MariaDB 10.1.1)";
    max_statement_time_exceeded: "MAX_STATEMENT_TIME_EXCEEDED" => "mariadb_stats_max_statement_exceeded",
        "The number of times a statement was aborted, because it was executed longer than its MAX_STATEMENT_TIME threshold. (>= MariaDB 10.1.1)";
}
