use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::definition::Grouping;
use crate::models::Signal;
use crate::query_result::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    /// Every matching signal counts.
    Count,
    /// Distinct client users among matching signals.
    UniqueUsers,
}

impl Aggregation {
    /// Result key under which the executor reports the aggregated value.
    pub fn output_name(self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::UniqueUsers => "users",
        }
    }
}

/// Closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryInterval {
    #[serde(serialize_with = "timestamp::serialize")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub end: DateTime<Utc>,
}

impl QueryInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// The aggregation an insight asks the signal store to run. Executing it is
/// up to the store; this type only describes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightQuery {
    pub aggregation: Aggregation,
    pub output_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    pub filters: BTreeMap<String, String>,
    pub interval: QueryInterval,
    pub grouping: Grouping,
}

impl InsightQuery {
    /// Whether `signal` falls inside this query: right type, every filter
    /// matched exactly in the payload, received within the interval.
    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(signal_type) = &self.signal_type {
            if &signal.signal_type != signal_type {
                return false;
            }
        }

        let filters_match = self.filters.iter().all(|(key, expected)| {
            signal
                .payload
                .as_ref()
                .and_then(|payload| payload.get(key))
                .map_or(false, |actual| actual == expected)
        });

        filters_match && self.interval.contains(signal.received_at)
    }
}
