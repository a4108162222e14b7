//! Metric collector implementation.
//!
//! See [`Collector`] and [`StatsCollector`] for details.

use async_trait::async_trait;

use crate::catalog::{build_catalog, MetricDefinition, Scope};
use crate::source::StatsSource;

/// Host identifier used when none is configured.
pub const DEFAULT_NODE: &str = "localhost";

/// One labeled value of a [`MetricDefinition`], produced during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<'a> {
    /// The metric this sample belongs to.
    pub definition: &'a MetricDefinition,
    /// Label values, in the order of [`MetricDefinition::label_names`].
    pub label_values: Vec<String>,
    /// Sample value.
    pub value: f64,
}

impl Sample<'_> {
    /// Iterates `(label name, label value)` pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.definition
            .label_names()
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }
}

/// The [`Collector`] abstraction provides a fixed set of metric descriptions
/// and, on each scrape, the current samples for them.
///
/// Register a [`Collector`] with a [`Registry`](crate::registry::Registry) via
/// [`Registry::register_collector`](crate::registry::Registry::register_collector).
#[async_trait]
pub trait Collector: std::fmt::Debug + Send + Sync + 'static {
    /// Every metric this collector may emit, independent of data availability.
    fn describe(&self) -> Box<dyn Iterator<Item = &MetricDefinition> + '_>;

    /// Called once per scrape. Must not fail because data is unavailable;
    /// missing data yields fewer samples.
    async fn collect<'a>(&'a self) -> Vec<Sample<'a>>;
}

/// Publishes `USER_STATISTICS` rows and the server memory figure.
#[derive(Debug)]
pub struct StatsCollector<S> {
    catalog: Vec<MetricDefinition>,
    node: String,
    source: S,
}

impl<S: StatsSource> StatsCollector<S> {
    /// Creates a collector over the full catalog. Every sample carries `node`
    /// as its host identifier; an empty `node` falls back to
    /// [`DEFAULT_NODE`].
    pub fn new(source: S, node: impl Into<String>) -> Self {
        let mut node = node.into();
        if node.is_empty() {
            tracing::warn!(default = DEFAULT_NODE, "empty node label, using default");
            node = DEFAULT_NODE.to_string();
        }

        StatsCollector {
            catalog: build_catalog(),
            node,
            source,
        }
    }

    /// Returns the host identifier attached to every sample.
    pub fn node(&self) -> &str {
        &self.node
    }
}

#[async_trait]
impl<S: StatsSource> Collector for StatsCollector<S> {
    fn describe(&self) -> Box<dyn Iterator<Item = &MetricDefinition> + '_> {
        Box::new(self.catalog.iter())
    }

    async fn collect<'a>(&'a self) -> Vec<Sample<'a>> {
        let (rows, memory_used) =
            tokio::join!(self.source.fetch_rows(), self.source.fetch_memory_used());

        let rows = rows.unwrap_or_else(|error| {
            tracing::warn!(%error, "failed to fetch user statistics, exporting no user metrics");
            Vec::new()
        });
        let memory_used = memory_used
            .map_err(|error| tracing::warn!(%error, "failed to fetch memory usage"))
            .ok();

        let mut samples = Vec::with_capacity(self.catalog.len() * rows.len() + 1);
        for definition in &self.catalog {
            match definition.scope() {
                Scope::Instance => {
                    if let Some(value) = memory_used {
                        samples.push(Sample {
                            definition,
                            label_values: vec![self.node.clone()],
                            value,
                        });
                    }
                }
                Scope::PerUser(value) => {
                    samples.extend(rows.iter().map(|row| Sample {
                        definition,
                        label_values: vec![row.user.clone(), self.node.clone()],
                        value: value(row),
                    }));
                }
            }
        }

        tracing::debug!(
            users = rows.len(),
            samples = samples.len(),
            "collected user statistics"
        );
        samples
    }
}
