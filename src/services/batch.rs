//! Fan-out / fan-in processing of one upload batch.
//!
//! Every image becomes its own task (decode + preprocess on the blocking
//! pool, recognize, split, match). All outcomes are collected before the
//! failure policy decides what the request returns, so one bad image never
//! cancels its siblings mid-flight.

use axum::body::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::error::TallyError;
use crate::models::catalog::Catalog;
use crate::models::config::{AppConfig, FailurePolicy};
use crate::models::report::{AggregateReport, MatchResult};
use crate::services::aggregator::aggregate;
use crate::services::matcher::BucketMatcher;
use crate::services::ocr::{split_lines, OcrEngine, PreprocessingService};

/// One uploaded image
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub name: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of one image task
struct ImageOutcome {
    index: usize,
    name: String,
    result: Result<Vec<MatchResult>, TallyError>,
}

/// Shared, read-only pipeline used by every request
pub struct BatchProcessor {
    preprocessor: Arc<PreprocessingService>,
    engine: Arc<dyn OcrEngine>,
    matcher: Arc<BucketMatcher>,
    image_timeout: Duration,
    failure_policy: FailurePolicy,
}

impl BatchProcessor {
    pub fn new(
        preprocessor: PreprocessingService,
        engine: Arc<dyn OcrEngine>,
        matcher: BucketMatcher,
        image_timeout: Duration,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            preprocessor: Arc::new(preprocessor),
            engine,
            matcher: Arc::new(matcher),
            image_timeout,
            failure_policy,
        }
    }

    /// Build the pipeline from configuration around an OCR engine
    pub fn from_config(config: &AppConfig, engine: Arc<dyn OcrEngine>) -> Result<Self, TallyError> {
        let catalog = Arc::new(Catalog::from_config(&config.catalog)?);
        tracing::info!(
            "Catalog loaded: {} buckets, match threshold {}",
            catalog.len(),
            config.matching.threshold
        );

        Ok(Self::new(
            PreprocessingService::new(config.preprocessing.clone()),
            engine,
            BucketMatcher::new(catalog, config.matching.threshold),
            Duration::from_secs(config.batch.image_timeout_secs),
            config.batch.failure_policy,
        ))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.matcher.catalog()
    }

    pub fn engine(&self) -> &Arc<dyn OcrEngine> {
        &self.engine
    }

    /// Recognize, classify and aggregate a batch of images
    pub async fn process(&self, images: Vec<ImageUpload>) -> Result<AggregateReport, TallyError> {
        if images.is_empty() {
            return Err(TallyError::NoImages);
        }

        let start = Instant::now();
        let image_count = images.len();
        tracing::info!("Processing {} image(s)", image_count);

        let outcomes = self.recognize_all(images).await;
        let results = self.apply_policy(outcomes)?;
        let report = aggregate(&results, self.catalog());

        tracing::info!(
            "Batch done in {}ms: {} image(s), {} line(s), {} matched, total {}",
            start.elapsed().as_millis(),
            image_count,
            results.len(),
            report.matched_lines(),
            report.total
        );
        tracing::debug!("Bucket counts: {:?}", report.counts);

        Ok(report)
    }

    /// Spawn one task per image and wait for all of them
    async fn recognize_all(&self, images: Vec<ImageUpload>) -> Vec<ImageOutcome> {
        let mut tasks = JoinSet::new();

        for (index, upload) in images.into_iter().enumerate() {
            let preprocessor = Arc::clone(&self.preprocessor);
            let engine = Arc::clone(&self.engine);
            let matcher = Arc::clone(&self.matcher);
            let limit = self.image_timeout;

            tasks.spawn(async move {
                let name = upload.name.clone();
                let work = process_image(upload, preprocessor, engine, matcher);

                let result = match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(TallyError::Timeout {
                        image: name.clone(),
                        secs: limit.as_secs(),
                    }),
                };

                ImageOutcome { index, name, result }
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Image task aborted: {}", e);
                    outcomes.push(ImageOutcome {
                        index: usize::MAX,
                        name: "<aborted task>".to_string(),
                        result: Err(TallyError::Recognition {
                            image: "<aborted task>".to_string(),
                            reason: e.to_string(),
                        }),
                    });
                }
            }
        }

        // Upload order, so "first failure" is stable across runs
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }

    /// Merge per-image results according to the failure policy
    fn apply_policy(&self, outcomes: Vec<ImageOutcome>) -> Result<Vec<MatchResult>, TallyError> {
        let image_count = outcomes.len();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(matches) => {
                    tracing::debug!("{}: {} line(s)", outcome.name, matches.len());
                    results.extend(matches);
                }
                Err(e) => {
                    tracing::warn!("{}: {}", outcome.name, e);
                    failures.push(e);
                }
            }
        }

        let failed = failures.len();
        let Some(first_failure) = failures.into_iter().next() else {
            return Ok(results);
        };

        match self.failure_policy {
            FailurePolicy::SkipFailed if failed < image_count => {
                tracing::warn!("Skipping {} of {} image(s) that failed", failed, image_count);
                Ok(results)
            }
            _ => Err(first_failure),
        }
    }
}

/// Preprocess, recognize and classify one image
async fn process_image(
    upload: ImageUpload,
    preprocessor: Arc<PreprocessingService>,
    engine: Arc<dyn OcrEngine>,
    matcher: Arc<BucketMatcher>,
) -> Result<Vec<MatchResult>, TallyError> {
    let name = upload.name;
    let bytes = upload.bytes;

    let image = tokio::task::spawn_blocking(move || preprocessor.preprocess_bytes(&bytes))
        .await
        .map_err(|e| TallyError::Recognition {
            image: name.clone(),
            reason: format!("Preprocessing task failed: {}", e),
        })?
        .map_err(|reason| TallyError::ImageDecode {
            image: name.clone(),
            reason,
        })?;

    let text = engine.recognize(&image, &name).await?;
    let lines = split_lines(&text);
    tracing::debug!("{}: OCR result {:?}", name, lines);

    let results = tokio::task::spawn_blocking(move || matcher.match_lines(&lines))
        .await
        .map_err(|e| TallyError::Recognition {
            image: name.clone(),
            reason: format!("Matching task failed: {}", e),
        })?;

    for unmatched in results.iter().filter(|r| !r.is_match()) {
        tracing::debug!("{}: no bucket for {:?}", name, unmatched.line);
    }

    Ok(results)
}
