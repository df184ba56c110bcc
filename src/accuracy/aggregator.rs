//! Per-identifier evaluation and batch aggregation.
//!
//! A batch never stops on a bad identifier: missing artifacts, degenerate
//! fits and non-finite means all become sentinel records. Only table
//! persistence problems abort.

use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use super::record::{AccuracyRecord, Outcome, Summary};
use super::source::CorrespondenceSource;
use super::table::AccuracyTable;
use crate::error::AccuracyError;
use crate::fit::{reproject_and_score, HomographyFitter, RansacHomographyFitter};

/// Reprojection threshold in pixels used to classify inliers.
pub const DEFAULT_THRESHOLD: f64 = 3.0;

pub struct AccuracyAggregator<S, F = RansacHomographyFitter> {
    source: S,
    fitter: F,
    threshold: f64,
}

impl<S: CorrespondenceSource> AccuracyAggregator<S, RansacHomographyFitter> {
    pub fn new(source: S) -> Self {
        Self::with_fitter(source, RansacHomographyFitter::default())
    }
}

impl<S, F> AccuracyAggregator<S, F>
where
    S: CorrespondenceSource,
    F: HomographyFitter,
{
    pub fn with_fitter(source: S, fitter: F) -> Self {
        Self {
            source,
            fitter,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Evaluate one identifier. Never fails: problems are folded into the
    /// record's [`Outcome`].
    pub fn evaluate_one(&self, identifier: &str) -> AccuracyRecord {
        let set = match self.source.load(identifier) {
            Ok(Some(set)) => set,
            Ok(None) => {
                error!("{identifier} failed");
                return AccuracyRecord::new(identifier, Outcome::MissingData);
            }
            Err(err) => {
                error!(error = %err, "{identifier} failed");
                return AccuracyRecord::new(identifier, Outcome::MissingData);
            }
        };

        let fit = self.fitter.fit(&set, self.threshold);
        let (Some(homography), Some(mask)) = (fit.homography.as_ref(), fit.mask.as_deref())
        else {
            error!(pairs = set.len(), "{identifier} failed: degenerate fit");
            return AccuracyRecord::new(identifier, Outcome::DegenerateFit);
        };

        let inliers = set.select(mask);
        match reproject_and_score(inliers.src(), inliers.dst(), homography) {
            Some(mean) => {
                info!(
                    inliers = inliers.len(),
                    pairs = set.len(),
                    "{identifier}: mean distance {mean}"
                );
                AccuracyRecord::new(identifier, Outcome::Success(mean))
            }
            None => {
                error!("{identifier} failed: non-finite reprojection distance");
                AccuracyRecord::new(identifier, Outcome::NonFiniteResult)
            }
        }
    }

    /// Evaluate `identifiers` in order, appending each record to the table at
    /// `output_path` before moving on. Returns the summary over computable
    /// records of the whole table, or `None` if there are none.
    pub fn evaluate_batch<I, T>(
        &self,
        identifiers: I,
        output_path: impl AsRef<Path>,
    ) -> Result<Option<Summary>, AccuracyError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut table = AccuracyTable::open(output_path)?;
        for identifier in identifiers {
            let identifier = identifier.as_ref();
            info!("Starting {identifier}");
            let record = self.evaluate_one(identifier);
            table.append(record)?;
        }

        let summary = table.summary();
        report(&summary, table.len());
        Ok(summary)
    }
}

/// Load the table at `path` and summarise it.
pub fn summarize(path: impl AsRef<Path>) -> Result<Option<Summary>, AccuracyError> {
    let records = AccuracyTable::load(path)?;
    let summary = Summary::from_records(&records);
    report(&summary, records.len());
    Ok(summary)
}

fn report(summary: &Option<Summary>, total: usize) {
    match summary {
        Some(s) => info!("{s}"),
        None => warn!(records = total, "no computable records to summarise"),
    }
}

/// Identifiers from a newline-delimited file; blank lines are skipped.
pub fn read_identifier_list(path: impl AsRef<Path>) -> Result<Vec<String>, AccuracyError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| AccuracyError::IdentifierList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
