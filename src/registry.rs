//! Metric registry implementation.
//!
//! See [`Registry`] for details.

use std::collections::{HashMap, HashSet};

use crate::catalog::{validate_catalog, CatalogError, MetricDefinition};
use crate::collector::{Collector, Sample};

/// A metric registry.
///
/// First off one registers collectors with the registry via
/// [`Registry::register_collector`]. Later on, per scrape, the [`Registry`]
/// asks every collector for its samples via [`Registry::collect`] and hands
/// the resulting [`MetricFamily`]s to an encoder.
#[derive(Debug, Default)]
pub struct Registry {
    collectors: Vec<Box<dyn Collector>>,
}

/// A [`MetricDefinition`] together with the samples collected for it during a
/// single scrape. A family without samples still gets described.
#[derive(Debug)]
pub struct MetricFamily<'a> {
    /// The described metric.
    pub definition: &'a MetricDefinition,
    /// Samples of this scrape, possibly none.
    pub samples: Vec<Sample<'a>>,
}

impl Registry {
    /// Register a [`Collector`].
    ///
    /// The collector's definitions are validated, and must not reuse a name
    /// already described by a previously registered collector.
    pub fn register_collector(
        &mut self,
        collector: Box<dyn Collector>,
    ) -> Result<(), CatalogError> {
        let definitions: Vec<MetricDefinition> = collector.describe().copied().collect();
        validate_catalog(&definitions)?;

        let known: HashSet<&str> = self.describe().map(|d| d.name()).collect();
        if let Some(duplicate) = definitions.iter().find(|d| known.contains(d.name())) {
            return Err(CatalogError::DuplicateName(duplicate.name()));
        }

        self.collectors.push(collector);
        Ok(())
    }

    /// Iterates the definitions of all registered collectors, in registration
    /// order.
    pub fn describe(&self) -> impl Iterator<Item = &MetricDefinition> + '_ {
        self.collectors.iter().flat_map(|c| c.describe())
    }

    /// Collects every registered collector once and groups the samples by
    /// definition, in [`Registry::describe`] order.
    pub async fn collect(&self) -> Vec<MetricFamily<'_>> {
        let mut families = Vec::new();

        for collector in &self.collectors {
            let mut by_name: HashMap<&str, Vec<Sample<'_>>> = HashMap::new();
            for sample in collector.collect().await {
                by_name
                    .entry(sample.definition.name())
                    .or_default()
                    .push(sample);
            }

            families.extend(collector.describe().map(|definition| MetricFamily {
                definition,
                samples: by_name.remove(definition.name()).unwrap_or_default(),
            }));
        }

        families
    }
}
