//! Metric rows keyed by release and metric name.
//!
//! Every report parser produces [`MetricRow`]s. A [`MetricTable`] collects
//! them and answers the questions the charts ask: per-release aggregates of
//! one metric, and per-release totals across all metrics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::version::sort_releases;

/// One `(release, metric, value)` observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    /// Release label (e.g., `3.17.0`).
    pub release: String,
    /// Metric name (e.g., `wmc`, `BAD_PRACTICE`, `LINE`).
    pub metric: String,
    /// Observed value.
    pub value: f64,
}

impl MetricRow {
    /// Build a row.
    pub fn new(release: impl Into<String>, metric: impl Into<String>, value: f64) -> Self {
        Self {
            release: release.into(),
            metric: metric.into(),
            value,
        }
    }
}

/// How rows sharing a `(release, metric)` key are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Sum of values.
    Sum,
    /// Arithmetic mean of values.
    Mean,
    /// Number of rows.
    Count,
}

/// Values of one metric across releases, aligned with [`MetricTable::releases`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    /// Legend name.
    pub name: String,
    /// One entry per release; `None` where the release has no rows.
    pub points: Vec<Option<f64>>,
}

/// A set of metric rows plus the releases they were collected for.
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    rows: Vec<MetricRow>,
    releases: BTreeSet<String>,
}

impl MetricTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `release` was analyzed, even if it produced no rows.
    pub fn register_release(&mut self, release: impl Into<String>) {
        self.releases.insert(release.into());
    }

    /// Add a row (its release is registered implicitly).
    pub fn push(&mut self, row: MetricRow) {
        self.releases.insert(row.release.clone());
        self.rows.push(row);
    }

    /// Whether the table has no releases at all.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// All rows, in insertion order.
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Releases in version order.
    pub fn releases(&self) -> Vec<String> {
        let mut releases: Vec<String> = self.releases.iter().cloned().collect();
        sort_releases(&mut releases);
        releases
    }

    /// Distinct metric names, sorted.
    pub fn metrics(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.metric.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Aggregate one metric per release.
    pub fn series(&self, metric: &str, aggregation: Aggregation) -> Series {
        let mut buckets: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.metric == metric) {
            buckets.entry(&row.release).or_default().push(row.value);
        }

        let points = self
            .releases()
            .iter()
            .map(|release| {
                buckets
                    .get(release.as_str())
                    .map(|values| aggregate(values, aggregation))
            })
            .collect();

        Series {
            name: metric.to_string(),
            points,
        }
    }

    /// One series per metric, in metric-name order.
    pub fn all_series(&self, aggregation: Aggregation) -> Vec<Series> {
        self.metrics()
            .iter()
            .map(|metric| self.series(metric, aggregation))
            .collect()
    }

    /// Sum of every row per release. Releases without rows total 0.
    pub fn totals(&self, name: impl Into<String>) -> Series {
        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
        for row in &self.rows {
            *sums.entry(&row.release).or_insert(0.0) += row.value;
        }

        let points = self
            .releases()
            .iter()
            .map(|release| Some(sums.get(release.as_str()).copied().unwrap_or(0.0)))
            .collect();

        Series {
            name: name.into(),
            points,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn aggregate(values: &[f64], aggregation: Aggregation) -> f64 {
    match aggregation {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::Count => values.len() as f64,
    }
}
