//! Accuracy records and summary statistics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mean distance written for every record that could not be computed.
pub const SENTINEL: f64 = -1.0;

/// Why a record holds the value it does.
///
/// The numeric column collapses every failure to [`SENTINEL`]; the outcome
/// keeps the cause.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success(f64),
    /// The correspondence artifact was absent or unreadable.
    MissingData,
    /// Fewer than four pairs, or no hypothesis with enough support.
    DegenerateFit,
    /// The mean reprojection distance was NaN or infinite.
    NonFiniteResult,
}

impl Outcome {
    pub fn mean_distance(&self) -> f64 {
        match self {
            Outcome::Success(d) => *d,
            _ => SENTINEL,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Outcome::Success(_) => Status::Ok,
            Outcome::MissingData => Status::Missing,
            Outcome::DegenerateFit => Status::Degenerate,
            Outcome::NonFiniteResult => Status::NonFinite,
        }
    }

    /// Rebuild from the persisted columns. Tables without a status column
    /// only know whether the value is the sentinel.
    pub fn from_columns(value: f64, status: Option<Status>) -> Self {
        match status {
            Some(Status::Ok) => Outcome::Success(value),
            Some(Status::Missing) => Outcome::MissingData,
            Some(Status::Degenerate) => Outcome::DegenerateFit,
            Some(Status::NonFinite) => Outcome::NonFiniteResult,
            None if value.is_finite() && value > 0.0 => Outcome::Success(value),
            None => Outcome::MissingData,
        }
    }
}

/// The persisted `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Missing,
    Degenerate,
    NonFinite,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Missing => "missing",
            Status::Degenerate => "degenerate",
            Status::NonFinite => "non_finite",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ok" => Ok(Status::Ok),
            "missing" => Ok(Status::Missing),
            "degenerate" => Ok(Status::Degenerate),
            "non_finite" => Ok(Status::NonFinite),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// One row of the accuracy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub identifier: String,
    pub outcome: Outcome,
}

impl AccuracyRecord {
    pub fn new(identifier: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            identifier: identifier.into(),
            outcome,
        }
    }

    /// Value of the numeric column: the mean distance or [`SENTINEL`].
    pub fn mean_distance(&self) -> f64 {
        self.outcome.mean_distance()
    }
}

/// Min / max / mean over the computable records of a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Summary {
    /// Statistics over records whose value is strictly positive; `None` when
    /// no record qualifies.
    pub fn from_records(records: &[AccuracyRecord]) -> Option<Self> {
        let values: Vec<f64> = records
            .iter()
            .map(AccuracyRecord::mean_distance)
            .filter(|&d| d > 0.0 && d.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self {
            count: values.len(),
            min,
            max,
            mean,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Min: {}, Max: {}, Mean: {} ({} records)",
            self.min, self.max, self.mean, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summary_excludes_sentinel_records() {
        let records = vec![
            AccuracyRecord::new("a", Outcome::MissingData),
            AccuracyRecord::new("b", Outcome::Success(2.0)),
            AccuracyRecord::new("c", Outcome::Success(4.0)),
        ];
        let s = Summary::from_records(&records).unwrap();
        assert_eq!(s.count, 2);
        assert_relative_eq!(s.min, 2.0);
        assert_relative_eq!(s.max, 4.0);
        assert_relative_eq!(s.mean, 3.0);
    }

    #[test]
    fn summary_of_only_failures_is_none() {
        let records = vec![
            AccuracyRecord::new("a", Outcome::DegenerateFit),
            AccuracyRecord::new("b", Outcome::NonFiniteResult),
        ];
        assert!(Summary::from_records(&records).is_none());
        assert!(Summary::from_records(&[]).is_none());
    }

    #[test]
    fn every_failure_collapses_to_sentinel() {
        for outcome in [
            Outcome::MissingData,
            Outcome::DegenerateFit,
            Outcome::NonFiniteResult,
        ] {
            assert_eq!(outcome.mean_distance(), SENTINEL);
        }
        assert_eq!(Outcome::Success(1.25).mean_distance(), 1.25);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [Status::Ok, Status::Missing, Status::Degenerate, Status::NonFinite] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn legacy_rows_infer_outcome_from_value() {
        assert_eq!(Outcome::from_columns(-1.0, None), Outcome::MissingData);
        assert_eq!(Outcome::from_columns(0.7, None), Outcome::Success(0.7));
        assert_eq!(Outcome::from_columns(0.0, None), Outcome::MissingData);
        assert_eq!(Outcome::from_columns(f64::NAN, None), Outcome::MissingData);
        assert_eq!(
            Outcome::from_columns(-1.0, Some(Status::Degenerate)),
            Outcome::DegenerateFit
        );
    }
}
