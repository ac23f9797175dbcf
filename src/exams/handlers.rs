use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{auth::Staff, error::ApiError, state::AppState};

use super::dto::CreateExamRequest;
use super::repo::Exam;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exams", get(list_exams).post(create_exam))
        .route("/exams/:id", delete(delete_exam))
}

#[instrument(skip(state))]
pub async fn list_exams(
    State(state): State<AppState>,
    Staff(_): Staff,
) -> Result<Json<Vec<Exam>>, ApiError> {
    let exams = Exam::list(&state.db).await?;
    Ok(Json(exams))
}

#[instrument(skip(state, payload))]
pub async fn create_exam(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(payload): Json<CreateExamRequest>,
) -> Result<(StatusCode, Json<Exam>), ApiError> {
    let course = payload.course.trim();
    let exam_name = payload.exam_name.trim();

    if course.len() < 2 || course.len() > 50 {
        return Err(ApiError::Validation(
            "Course name must be between 2 and 50 characters".into(),
        ));
    }
    if exam_name.len() < 3 || exam_name.len() > 100 {
        return Err(ApiError::Validation(
            "Exam name must be between 3 and 100 characters".into(),
        ));
    }
    if !(1..=30).contains(&payload.credits) {
        return Err(ApiError::Validation(
            "Credits must be between 1 and 30".into(),
        ));
    }
    if payload.date < OffsetDateTime::now_utc().date() {
        return Err(ApiError::Validation("Exam date cannot be in the past".into()));
    }

    // The unique index is the backstop; checking first gives the nicer message.
    if Exam::find_by_name(&state.db, exam_name).await?.is_some() {
        return Err(ApiError::Duplicate(
            "An exam with this name already exists".into(),
        ));
    }

    let exam = Exam::create(&state.db, course, exam_name, payload.date, payload.credits)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Duplicate(_) => {
                ApiError::Duplicate("An exam with this name already exists".into())
            }
            other => other,
        })?;

    info!(exam_id = %exam.exam_id, exam_name = %exam.exam_name, "exam created");
    Ok((StatusCode::CREATED, Json(exam)))
}

#[instrument(skip(state))]
pub async fn delete_exam(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exam = Exam::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Exam not found. It may have been already deleted.".into()))?;

    if !Exam::delete_cascade(&state.db, id).await? {
        return Err(ApiError::NotFound("Exam not found. It may have been already deleted.".into()));
    }

    info!(exam_id = %id, exam_name = %exam.exam_name, "exam deleted with results");
    Ok(Json(serde_json::json!({
        "message": format!("Successfully deleted exam \"{}\"", exam.exam_name)
    })))
}
