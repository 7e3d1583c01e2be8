use crate::models::catalog::Catalog;
use crate::models::report::{AggregateReport, MatchResult};

/// Fold match results into per-bucket counts and values
///
/// Unmatched lines, and buckets the catalog doesn't know, add nothing. The
/// result does not depend on the order of `results`.
pub fn aggregate(results: &[MatchResult], catalog: &Catalog) -> AggregateReport {
    results
        .iter()
        .filter_map(|result| result.bucket.as_deref())
        .filter_map(|bucket| catalog.lookup(bucket))
        .fold(AggregateReport::default(), |mut report, entry| {
            report.record(&entry.bucket_name, &entry.unit_value);
            report
        })
}
