//! Metric type implementations.

/// Prometheus metric type of a [`MetricDefinition`](crate::catalog::MetricDefinition).
///
/// Every value exported from `USER_STATISTICS` is cumulative, hence only
/// counters are needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MetricType {
    Counter,
}

impl MetricType {
    /// Returns the given metric type's str representation.
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Counter => "counter",
        }
    }
}
