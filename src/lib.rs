//! Analytics core of the telemetry viewer: the query result wire model,
//! insight definitions and the chart data derived from query results.

pub mod chart;
pub mod error;
pub mod insight;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod number_format;
pub mod query_result;

pub use chart::{ChartDataSet, ChartPoint, InsightData};
pub use error::{
    ConfigError, DecodeError, DerivationError, InsightsError, Result, TransferError,
};
pub use insight::{
    InsightDataTransferObject, InsightDefinition, InsightDefinitionRequestBody,
    InsightDisplayMode, InsightGroupByInterval,
};
pub use number_format::NumberFormat;
pub use query_result::{GroupByRow, GroupByValue, QueryResult, TimeSeriesRow};
