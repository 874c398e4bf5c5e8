// HTTP route handlers for the Recoder API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use recoder_common::challenges::{self, day_number};
use recoder_common::progress::{ProgressRecord, ProgressTracker};
use recoder_common::redis::{self as progress_redis, RedisProgressStore};
use recoder_common::types::{Challenge, TestCase, ValidationResult};
use recoder_validator::extractor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub test_case_count: usize,
}

/// What a player sees: no reference solution
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub buggy_code: String,
    pub test_cases: Vec<TestCase>,
    pub entry_point: Option<String>,
    pub parameter_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_number: Option<u32>,
}

impl ChallengeView {
    fn new(challenge: &Challenge, day: Option<u32>) -> Self {
        Self {
            id: challenge.id.clone(),
            title: challenge.title.clone(),
            description: challenge.description.clone(),
            buggy_code: challenge.buggy_code.clone(),
            test_cases: challenge.test_cases.clone(),
            entry_point: extractor::entry_point(&challenge.buggy_code).ok(),
            parameter_names: extractor::parameter_names(&challenge.buggy_code),
            day_number: day,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    /// Defaults to today's challenge
    #[serde(default)]
    pub challenge_id: Option<String>,
    pub source: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub last_completed_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub completed_today: bool,
    pub completed_challenge_ids: Vec<String>,
}

impl ProgressView {
    fn new(record: &ProgressRecord, today: NaiveDate) -> Self {
        Self {
            last_completed_date: record.last_completed_date,
            current_streak: record.effective_streak(today),
            completed_today: record.is_completed_on(today),
            completed_challenge_ids: record.completed_challenge_ids.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub challenge_id: String,
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressView>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message.into()
        })),
    )
        .into_response()
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /challenges - Catalog summaries
pub async fn list_challenges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summaries: Vec<ChallengeSummary> = state
        .catalog
        .all()
        .iter()
        .map(|c| ChallengeSummary {
            id: c.id.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            test_case_count: c.test_cases.len(),
        })
        .collect();

    Json(summaries)
}

/// GET /challenges/today - The daily challenge
pub async fn get_today(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let today = challenges::today();
    let challenge = state.catalog.daily(today);
    Json(ChallengeView::new(challenge, Some(day_number(today))))
}

/// GET /challenges/{id}
pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.catalog.get(&id) {
        Some(challenge) => Json(ChallengeView::new(challenge, None)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Unknown challenge '{}'", id)),
    }
}

/// POST /validate - Run a submission against a challenge's test cases
pub async fn validate_submission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> Response {
    let today = challenges::today();
    let challenge = match &payload.challenge_id {
        Some(id) => match state.catalog.get(id) {
            Some(challenge) => challenge,
            None => {
                return error_response(StatusCode::NOT_FOUND, format!("Unknown challenge '{}'", id))
            }
        },
        None => state.catalog.daily(today),
    };

    let start = Instant::now();
    let result = state
        .validator
        .validate(&payload.source, &challenge.test_cases)
        .await;
    let elapsed = start.elapsed();
    metrics::observe_validation(&result, elapsed);

    info!(
        challenge_id = %challenge.id,
        outcome = metrics::outcome_label(&result),
        passed = result.passed_count,
        total = result.total_count,
        execution_ms = elapsed.as_millis() as u64,
        "Submission validated"
    );

    // Only today's puzzle counts towards the streak
    let progress = match (&state.redis, payload.user_id) {
        (Some(conn), Some(user_id))
            if result.success && state.catalog.is_daily(&challenge.id, today) =>
        {
            let tracker = ProgressTracker::new(RedisProgressStore::new(conn.clone(), user_id));
            match tracker.record_result(&challenge.id, true, today).await {
                Ok(record) => record.map(|r| ProgressView::new(&r, today)),
                Err(e) => {
                    // Non-fatal - the validation result is still returned
                    error!(user_id = %user_id, error = %e, "Failed to record progress");
                    None
                }
            }
        }
        _ => None,
    };

    Json(ValidateResponse {
        challenge_id: challenge.id.clone(),
        result,
        progress,
    })
    .into_response()
}

/// GET /progress/{user_id}
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    let user_uuid = match Uuid::parse_str(&user_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid user ID format"),
    };

    let Some(conn) = &state.redis else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Progress tracking is not configured",
        );
    };

    let mut conn = conn.clone();
    match progress_redis::get_progress(&mut conn, &user_uuid).await {
        Ok(record) => Json(ProgressView::new(&record, challenges::today())).into_response(),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch progress");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to query progress: {}", e),
            )
        }
    }
}

/// GET /metrics - Prometheus exposition
pub async fn get_metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
