use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};
use uuid::Uuid;

use super::query::{Aggregation, InsightQuery, QueryInterval};
use crate::error::ConfigError;
use crate::metrics;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightDisplayMode {
    /// `number` is the deprecated name of this mode.
    #[serde(alias = "number")]
    Raw,
    BarChart,
    LineChart,
    PieChart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightGroupByInterval {
    Hour,
    Day,
    Week,
    Month,
}

impl InsightGroupByInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightGroupByInterval::Hour => "hour",
            InsightGroupByInterval::Day => "day",
            InsightGroupByInterval::Week => "week",
            InsightGroupByInterval::Month => "month",
        }
    }
}

/// Signed aggregation window in seconds. Negative values look back from
/// the moment the insight is calculated.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RollingWindow(f64);

impl RollingWindow {
    pub const THIRTY_DAYS_BACK: RollingWindow = RollingWindow(-2_592_000.0);
    /// Longest window in either direction, 100 years of 365.25 days.
    pub const MAX_SECONDS: f64 = 3_155_760_000.0;

    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn is_lookback(self) -> bool {
        self.0 < 0.0
    }

    /// `None` for windows outside `validate`'s range.
    pub fn duration(self) -> Option<Duration> {
        self.validate().ok()?;
        Duration::try_milliseconds((self.0 * 1000.0).round() as i64)
    }

    pub fn validate(self) -> std::result::Result<Self, ConfigError> {
        if self.0.is_finite() && self.0.abs() <= Self::MAX_SECONDS {
            Ok(self)
        } else {
            Err(ConfigError::WindowOutOfRange)
        }
    }
}

// Whole seconds go out as JSON integers; clients compare preset bodies
// textually.
impl Serialize for RollingWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
        if self.0.fract() == 0.0 && self.0.abs() < MAX_EXACT {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for RollingWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        f64::deserialize(deserializer).map(RollingWindow)
    }
}

/// How matching signals are bucketed. A breakdown key and a group-by
/// interval exclude each other, so they share one enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Grouping {
    /// Everything collapses into a single count.
    Scalar,
    Breakdown(String),
    Interval(InsightGroupByInterval),
}

impl Grouping {
    pub fn from_parts(
        breakdown_key: Option<String>,
        group_by: Option<InsightGroupByInterval>,
    ) -> std::result::Result<Self, ConfigError> {
        match (breakdown_key, group_by) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingGrouping),
            (Some(key), None) => Ok(Grouping::Breakdown(key)),
            (None, Some(interval)) => Ok(Grouping::Interval(interval)),
            (None, None) => Ok(Grouping::Scalar),
        }
    }

    pub fn breakdown_key(&self) -> Option<&str> {
        match self {
            Grouping::Breakdown(key) => Some(key),
            _ => None,
        }
    }

    pub fn group_by(&self) -> Option<InsightGroupByInterval> {
        match self {
            Grouping::Interval(interval) => Some(*interval),
            _ => None,
        }
    }
}

/// Body of create and update requests. `id` is absent on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDefinitionRequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Only signals of this type are counted. `None` counts every type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    /// Count distinct client users instead of raw signals.
    pub unique_user: bool,
    /// Payload key/value pairs a signal must all match exactly.
    pub filters: BTreeMap<String, String>,
    pub rolling_window_size: RollingWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<InsightGroupByInterval>,
    pub display_mode: InsightDisplayMode,
    #[serde(rename = "groupID", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub is_expanded: bool,
    pub should_use_druid: bool,
}

/// A validated insight. Construct it from a request body; change it by
/// replacing it with another body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InsightRecord", into = "InsightRecord")]
pub struct InsightDefinition {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    pub order: Option<f64>,
    pub title: String,
    pub subtitle: Option<String>,
    pub signal_type: Option<String>,
    pub unique_user: bool,
    pub filters: BTreeMap<String, String>,
    pub rolling_window_size: RollingWindow,
    pub grouping: Grouping,
    pub display_mode: InsightDisplayMode,
    pub is_expanded: bool,
    pub should_use_druid: bool,
    /// Seconds the last calculation took.
    pub last_run_time: Option<f64>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// The query used by the last calculation, as compact JSON.
    pub last_query: Option<String>,
}

impl InsightDefinition {
    /// Validates `body` and builds a definition. A body without an id gets
    /// a fresh one.
    pub fn from_request_body(body: InsightDefinitionRequestBody) -> std::result::Result<Self, ConfigError> {
        let checked = body
            .rolling_window_size
            .validate()
            .and_then(|_| Grouping::from_parts(body.breakdown_key, body.group_by));
        let grouping = match checked {
            Ok(grouping) => grouping,
            Err(err) => {
                metrics::INSIGHT_DEFINITIONS_REJECTED.inc();
                warn!(title = %body.title, error = %err, "rejected insight definition");
                return Err(err);
            }
        };

        let definition = Self {
            id: body.id.unwrap_or_else(Uuid::new_v4),
            group_id: body.group_id,
            order: body.order,
            title: body.title,
            subtitle: body.subtitle,
            signal_type: body.signal_type,
            unique_user: body.unique_user,
            filters: body.filters,
            rolling_window_size: body.rolling_window_size,
            grouping,
            display_mode: body.display_mode,
            is_expanded: body.is_expanded,
            should_use_druid: body.should_use_druid,
            last_run_time: None,
            last_run_at: None,
            last_query: None,
        };
        debug!(id = %definition.id, grouping = ?definition.grouping, "built insight definition");
        Ok(definition)
    }

    pub fn to_request_body(&self) -> InsightDefinitionRequestBody {
        InsightDefinitionRequestBody {
            order: self.order,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            signal_type: self.signal_type.clone(),
            unique_user: self.unique_user,
            filters: self.filters.clone(),
            rolling_window_size: self.rolling_window_size,
            breakdown_key: self.breakdown_key().map(str::to_string),
            group_by: self.group_by(),
            display_mode: self.display_mode,
            group_id: self.group_id,
            id: Some(self.id),
            is_expanded: self.is_expanded,
            should_use_druid: self.should_use_druid,
        }
    }

    /// Replaces the whole definition, keeping its identity. Diagnostics of
    /// earlier runs are dropped since they describe a different query.
    pub fn replace_with(&self, mut body: InsightDefinitionRequestBody) -> std::result::Result<Self, ConfigError> {
        body.id = Some(self.id);
        Self::from_request_body(body)
    }

    pub fn with_run_diagnostics(
        mut self,
        run_time: StdDuration,
        run_at: DateTime<Utc>,
        query: &InsightQuery,
    ) -> Result<Self> {
        self.last_query = Some(serde_json::to_string(query)?);
        self.last_run_time = Some(run_time.as_secs_f64());
        self.last_run_at = Some(run_at);
        Ok(self)
    }

    pub fn breakdown_key(&self) -> Option<&str> {
        self.grouping.breakdown_key()
    }

    pub fn group_by(&self) -> Option<InsightGroupByInterval> {
        self.grouping.group_by()
    }

    /// The aggregation this insight asks the signal store for, evaluated
    /// at `now`. An interval bound past the representable range is clamped.
    pub fn query(&self, now: DateTime<Utc>) -> InsightQuery {
        let lookback = self.rolling_window_size.is_lookback();
        let bound = self
            .rolling_window_size
            .duration()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(if lookback {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        let interval = if lookback {
            QueryInterval::new(bound, now)
        } else {
            QueryInterval::new(now, bound)
        };

        let aggregation = if self.unique_user {
            Aggregation::UniqueUsers
        } else {
            Aggregation::Count
        };

        InsightQuery {
            aggregation,
            output_name: aggregation.output_name().to_string(),
            signal_type: self.signal_type.clone(),
            filters: self.filters.clone(),
            interval,
            grouping: self.grouping.clone(),
        }
    }
}

// Stored and transferred shape of a definition; the grouping invariant is
// checked again when reading it back.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightRecord {
    id: Uuid,
    #[serde(rename = "groupID", skip_serializing_if = "Option::is_none")]
    group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<f64>,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_type: Option<String>,
    unique_user: bool,
    filters: BTreeMap<String, String>,
    rolling_window_size: RollingWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_by: Option<InsightGroupByInterval>,
    display_mode: InsightDisplayMode,
    is_expanded: bool,
    should_use_druid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_run_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_query: Option<String>,
}

impl TryFrom<InsightRecord> for InsightDefinition {
    type Error = ConfigError;

    fn try_from(record: InsightRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            group_id: record.group_id,
            order: record.order,
            title: record.title,
            subtitle: record.subtitle,
            signal_type: record.signal_type,
            unique_user: record.unique_user,
            filters: record.filters,
            rolling_window_size: record.rolling_window_size.validate()?,
            grouping: Grouping::from_parts(record.breakdown_key, record.group_by)?,
            display_mode: record.display_mode,
            is_expanded: record.is_expanded,
            should_use_druid: record.should_use_druid,
            last_run_time: record.last_run_time,
            last_run_at: record.last_run_at,
            last_query: record.last_query,
        })
    }
}

impl From<InsightDefinition> for InsightRecord {
    fn from(definition: InsightDefinition) -> Self {
        let breakdown_key = definition.breakdown_key().map(str::to_string);
        let group_by = definition.group_by();
        Self {
            id: definition.id,
            group_id: definition.group_id,
            order: definition.order,
            title: definition.title,
            subtitle: definition.subtitle,
            signal_type: definition.signal_type,
            unique_user: definition.unique_user,
            filters: definition.filters,
            rolling_window_size: definition.rolling_window_size,
            breakdown_key,
            group_by,
            display_mode: definition.display_mode,
            is_expanded: definition.is_expanded,
            should_use_druid: definition.should_use_druid,
            last_run_time: definition.last_run_time,
            last_run_at: definition.last_run_at,
            last_query: definition.last_query,
        }
    }
}
