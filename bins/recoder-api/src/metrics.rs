// Prometheus metrics for validation traffic

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use recoder_common::types::ValidationResult;
use std::time::Duration;

lazy_static! {
    static ref VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "recoder_validations_total",
        "Validation runs by outcome",
        &["outcome"]
    )
    .expect("validation counter registers once");
    static ref CASE_RESULTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "recoder_case_results_total",
        "Evaluated test cases by status",
        &["status"]
    )
    .expect("case counter registers once");
    static ref VALIDATION_DURATION: Histogram = register_histogram!(
        "recoder_validation_duration_seconds",
        "Wall-clock duration of validation runs",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("duration histogram registers once");
}

/// `solved`, `failed` or `error` (whole-run failure)
pub fn outcome_label(result: &ValidationResult) -> &'static str {
    if result.is_whole_run_error() {
        "error"
    } else if result.success {
        "solved"
    } else {
        "failed"
    }
}

pub fn observe_validation(result: &ValidationResult, elapsed: Duration) {
    VALIDATIONS_TOTAL
        .with_label_values(&[outcome_label(result)])
        .inc();
    for case in &result.results {
        CASE_RESULTS_TOTAL
            .with_label_values(&[case.status.as_str()])
            .inc();
    }
    VALIDATION_DURATION.observe(elapsed.as_secs_f64());
}

/// Default registry in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
