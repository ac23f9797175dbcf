use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::Staff,
    error::ApiError,
    exams::repo::Exam,
    results::repo,
    retry,
    state::AppState,
    students::repo::Student,
};

use super::compute::{
    average_by_course, overall_stats, score_distribution, trend_over_time, Distribution, Filters,
    OverallStats, Series, Snapshot,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/analytics", get(get_analytics))
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub stats: OverallStats,
    pub average_by_course: Series,
    pub score_distribution: Distribution,
    pub trend: Series,
}

/// All four analytics views, derived synchronously from one freshly loaded
/// snapshot so they cannot disagree with each other.
#[instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<AppState>,
    Staff(_): Staff,
    Query(filters): Query<Filters>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let cfg = &state.config.retry;
    let students = retry::bounded(cfg, "students", || Student::list(&state.db)).await?;
    let exams = retry::bounded(cfg, "exams", || Exam::list(&state.db)).await?;
    let results = retry::bounded(cfg, "results", || repo::list_joined(&state.db)).await?;

    let snapshot = Snapshot {
        students,
        exams,
        results,
    };

    Ok(Json(AnalyticsResponse {
        stats: overall_stats(&snapshot),
        average_by_course: average_by_course(&snapshot.results, &filters),
        score_distribution: score_distribution(&snapshot.results, &filters),
        trend: trend_over_time(&snapshot.results, &filters),
    }))
}
