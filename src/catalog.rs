//! The fixed set of metrics the exporter can emit.
//!
//! See [`build_catalog`] for details.

use std::collections::HashSet;
use std::fmt;

use crate::metrics::MetricType;
use crate::stats::{StatsRow, USER_COUNTERS};

/// Label carrying the database account of a per-user metric.
pub const USER_LABEL: &str = "user";
/// Label carrying the host identifier, attached to every metric.
pub const NODE_LABEL: &str = "node";

const PER_USER_LABELS: &[&str] = &[USER_LABEL, NODE_LABEL];
const INSTANCE_LABELS: &[&str] = &[NODE_LABEL];

/// Where the value of a [`MetricDefinition`] comes from.
#[derive(Clone, Copy)]
pub enum Scope {
    /// One sample per [`StatsRow`], read through the accessor.
    PerUser(fn(&StatsRow) -> f64),
    /// One sample per scrape, from the server-wide memory figure.
    Instance,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::PerUser(_) => f.write_str("PerUser"),
            Scope::Instance => f.write_str("Instance"),
        }
    }
}

/// Static description of one exported metric.
#[derive(Clone, Copy, Debug)]
pub struct MetricDefinition {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    kind: MetricType,
    scope: Scope,
}

impl MetricDefinition {
    /// Creates a per-user counter labeled `(user, node)`.
    pub const fn per_user(
        name: &'static str,
        help: &'static str,
        value: fn(&StatsRow) -> f64,
    ) -> Self {
        MetricDefinition {
            name,
            help,
            label_names: PER_USER_LABELS,
            kind: MetricType::Counter,
            scope: Scope::PerUser(value),
        }
    }

    /// Creates an instance-wide counter labeled `(node)`.
    pub const fn instance(name: &'static str, help: &'static str) -> Self {
        MetricDefinition {
            name,
            help,
            label_names: INSTANCE_LABELS,
            kind: MetricType::Counter,
            scope: Scope::Instance,
        }
    }

    /// Returns the metric name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Returns the ordered label schema.
    pub fn label_names(&self) -> &'static [&'static str] {
        self.label_names
    }

    /// Returns the metric type.
    pub fn kind(&self) -> MetricType {
        self.kind
    }

    /// Returns where the value comes from.
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl PartialEq for MetricDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.help == other.help
            && self.label_names == other.label_names
            && self.kind == other.kind
    }
}

/// Name of the single instance-wide metric.
pub const MEMORY_USED: &str = "mariadb_stats_memory_used";

/// Builds the complete, ordered metric catalog.
///
/// The instance-wide memory metric comes first, followed by one per-user
/// counter for every numeric `USER_STATISTICS` column.
pub fn build_catalog() -> Vec<MetricDefinition> {
    std::iter::once(MetricDefinition::instance(
        MEMORY_USED,
        "Total Memory used by MariaDB.",
    ))
    .chain(
        USER_COUNTERS
            .iter()
            .map(|c| MetricDefinition::per_user(c.name, c.help, c.value)),
    )
    .collect()
}

/// Programmer errors detected in a catalog.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Two definitions share a name.
    #[error("metric {0} is defined more than once")]
    DuplicateName(&'static str),
    /// The name is not a valid Prometheus metric name.
    #[error("invalid metric name {0:?}")]
    InvalidName(&'static str),
    /// A label name is not a valid Prometheus label name.
    #[error("metric {metric} has invalid label name {label:?}")]
    InvalidLabel {
        /// Offending metric.
        metric: &'static str,
        /// Offending label.
        label: &'static str,
    },
    /// The label schema does not match the metric's scope.
    #[error("metric {0} does not carry the label schema its scope requires")]
    LabelSchema(&'static str),
}

/// Checks a catalog for naming and labeling mistakes.
///
/// Meant to run once at startup; a failure is a bug, not a runtime condition.
pub fn validate_catalog(catalog: &[MetricDefinition]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();

    for definition in catalog {
        let name = definition.name();
        if !is_valid_metric_name(name) {
            return Err(CatalogError::InvalidName(name));
        }
        if !seen.insert(name) {
            return Err(CatalogError::DuplicateName(name));
        }

        for &label in definition.label_names() {
            if !is_valid_label_name(label) {
                return Err(CatalogError::InvalidLabel {
                    metric: name,
                    label,
                });
            }
        }

        let expected = match definition.scope() {
            Scope::PerUser(_) => PER_USER_LABELS,
            Scope::Instance => INSTANCE_LABELS,
        };
        if definition.label_names() != expected {
            return Err(CatalogError::LabelSchema(name));
        }
    }

    Ok(())
}

// [a-zA-Z_:][a-zA-Z0-9_:]*
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

// [a-zA-Z_][a-zA-Z0-9_]*, `__` prefix reserved.
fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
