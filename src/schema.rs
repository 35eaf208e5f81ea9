use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::datastructures::{Category, Series};
use crate::series::packing::{SeriesPlan, ValidationIssue};

/// The payload submitted verbatim to the race-generation endpoint, and loaded
/// verbatim from the saved-schema endpoint of a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSchema {
    pub lane_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<FixedOffset>>,
    pub interval_minutes: u32,
    pub series: Vec<SeriesSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSchema {
    pub id: String,
    pub categories: BTreeMap<String, u32>,
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("saved schema fails validation ({} issue(s)): {}", .0.len(), format_issues(.0))]
    Invalid(Vec<ValidationIssue>),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SeriesPlan {
    pub fn to_schema(
        &self,
        start_time: Option<DateTime<FixedOffset>>,
        interval_minutes: u32,
    ) -> GenerationSchema {
        GenerationSchema {
            lane_count: self.lane_count,
            start_time,
            interval_minutes,
            series: self
                .series
                .iter()
                .map(|s| SeriesSchema {
                    id: s.id.clone(),
                    categories: s.categories.clone(),
                })
                .collect(),
        }
    }

    /// Re-hydrate an interactive plan from a saved schema. The category
    /// roster supplies crew counts and distances; the payload is validated
    /// against it rather than trusted, and every issue is reported at once.
    pub fn from_schema(
        schema: &GenerationSchema,
        categories: impl IntoIterator<Item = Category>,
    ) -> Result<SeriesPlan, SchemaError> {
        let series = schema
            .series
            .iter()
            .map(|s| Series {
                id: s.id.clone(),
                categories: s.categories.clone(),
            })
            .collect::<Vec<_>>();

        // Continue numbering after the highest saved ordinal, so ids stay
        // unique when more series are added to a re-hydrated plan.
        let next_series_ord = series
            .iter()
            .filter_map(|s| s.id.strip_prefix("series-"))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
            .map(|ord| ord + 1)
            .unwrap_or(series.len() as u32 + 1);

        let plan = SeriesPlan {
            lane_count: schema.lane_count,
            categories: categories
                .into_iter()
                .map(|c| (c.code.clone(), c))
                .collect(),
            series,
            next_series_ord,
        };

        let issues = plan.validate();
        if !issues.is_empty() {
            return Err(SchemaError::Invalid(issues));
        }
        Ok(plan)
    }
}

/// Typed envelope for collaborator responses. The REST API wraps payloads in
/// a `data` field that is sometimes absent (e.g. a 404 on "no schema saved
/// yet" still returns a JSON body with only a message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("response carried no data: {0}")]
    NoData(String),
}

impl<T> ResponseEnvelope<T> {
    pub fn into_data(self) -> Result<T, EnvelopeError> {
        self.data.ok_or_else(|| {
            EnvelopeError::NoData(self.message.unwrap_or_else(|| "no message".to_string()))
        })
    }
}
