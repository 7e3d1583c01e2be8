use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification outcome for one recognized line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub line: String,
    pub bucket: Option<String>,
}

impl MatchResult {
    pub fn new(line: impl Into<String>, bucket: Option<String>) -> Self {
        Self {
            line: line.into(),
            bucket,
        }
    }

    pub fn is_match(&self) -> bool {
        self.bucket.is_some()
    }
}

/// Per-bucket counts and values for a whole batch
///
/// Buckets without any matched line are absent from both maps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AggregateReport {
    pub counts: BTreeMap<String, u32>,
    pub values: BTreeMap<String, BigDecimal>,
    pub total: BigDecimal,
}

impl AggregateReport {
    /// Record one matched line worth `unit_value`
    pub fn record(&mut self, bucket: &str, unit_value: &BigDecimal) {
        *self.counts.entry(bucket.to_string()).or_insert(0) += 1;
        *self
            .values
            .entry(bucket.to_string())
            .or_insert_with(BigDecimal::default) += unit_value;
        self.total += unit_value;
    }

    /// Total number of matched lines
    pub fn matched_lines(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
