use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::definition::{
    InsightDefinition, InsightDisplayMode, InsightGroupByInterval, RollingWindow,
};
use crate::chart::{ChartDataSet, InsightData};
use crate::error::DerivationError;
use crate::metrics;
use crate::number_format::NumberFormat;
use crate::query_result::QueryResult;

/// A calculated insight as returned to clients. Built once per calculation
/// and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDataTransferObject {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    pub unique_user: bool,
    pub filters: BTreeMap<String, String>,
    pub rolling_window_size: RollingWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<InsightGroupByInterval>,
    pub display_mode: InsightDisplayMode,
    pub data: Vec<InsightData>,
    pub calculated_at: DateTime<Utc>,
    /// Seconds.
    pub calculation_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_use_druid: Option<bool>,
}

impl InsightDataTransferObject {
    pub fn new(
        definition: &InsightDefinition,
        data: Vec<InsightData>,
        calculated_at: DateTime<Utc>,
        calculation_duration: StdDuration,
    ) -> Self {
        metrics::INSIGHT_CALCULATION_DURATION.observe(calculation_duration.as_secs_f64());

        Self {
            id: definition.id,
            order: definition.order,
            title: definition.title.clone(),
            subtitle: definition.subtitle.clone(),
            signal_type: definition.signal_type.clone(),
            unique_user: definition.unique_user,
            filters: definition.filters.clone(),
            rolling_window_size: definition.rolling_window_size,
            breakdown_key: definition.breakdown_key().map(str::to_string),
            group_by: definition.group_by(),
            display_mode: definition.display_mode,
            data,
            calculated_at,
            calculation_duration: calculation_duration.as_secs_f64(),
            should_use_druid: Some(definition.should_use_druid),
        }
    }

    /// Bundles a decoded query result, reading time series values under the
    /// output name of the definition's aggregation.
    pub fn from_query_result(
        definition: &InsightDefinition,
        result: &QueryResult,
        calculated_at: DateTime<Utc>,
        calculation_duration: StdDuration,
    ) -> Self {
        let query = definition.query(calculated_at);
        let data = InsightData::from_query_result(result, &query.output_name);
        debug!(id = %definition.id, rows = data.len(), "bundled insight data");
        Self::new(definition, data, calculated_at, calculation_duration)
    }

    /// True when no row carries a value.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|row| row.y_axis_value.is_none())
    }

    pub fn chart_data(&self, format: &NumberFormat) -> Result<ChartDataSet, DerivationError> {
        ChartDataSet::derive(&self.data, format)
    }
}
