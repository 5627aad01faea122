use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

use crate::{InsightsError, Result};

lazy_static! {
    // Codec metrics
    pub static ref QUERY_RESULTS_DECODED: IntCounterVec = register_int_counter_vec!(
        "query_results_decoded_total",
        "Query results decoded, by variant",
        &["variant"]
    ).unwrap();

    pub static ref QUERY_RESULT_DECODE_FAILURES: IntCounter = register_int_counter!(
        "query_result_decode_failures_total",
        "Query results that failed to decode"
    ).unwrap();

    // Chart metrics
    pub static ref CHART_DERIVATIONS: IntCounter = register_int_counter!(
        "chart_derivations_total",
        "Chart data derivations started"
    ).unwrap();

    pub static ref CHART_DERIVATION_FAILURES: IntCounter = register_int_counter!(
        "chart_derivation_failures_total",
        "Chart data derivations aborted on an unreadable value"
    ).unwrap();

    pub static ref CHART_DERIVATION_DURATION: Histogram = register_histogram!(
        "chart_derivation_duration_seconds",
        "Chart data derivation duration in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]
    ).unwrap();

    // Insight metrics
    pub static ref INSIGHT_DEFINITIONS_REJECTED: IntCounter = register_int_counter!(
        "insight_definitions_rejected_total",
        "Insight definitions rejected for conflicting grouping"
    ).unwrap();

    pub static ref INSIGHT_CALCULATION_DURATION: Histogram = register_histogram!(
        "insight_calculation_duration_seconds",
        "Reported insight calculation duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]
    ).unwrap();
}

/// Counts a chart derivation and records its duration when dropped.
pub struct DerivationTimer {
    start: Instant,
}

impl DerivationTimer {
    pub fn new() -> Self {
        CHART_DERIVATIONS.inc();
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for DerivationTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DerivationTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        CHART_DERIVATION_DURATION.observe(duration);
    }
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| InsightsError::Internal(e.to_string()))
}
