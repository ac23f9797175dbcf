use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{is_valid_email, Staff},
    error::ApiError,
    realtime::StudentEvent,
    state::AppState,
};

use super::dto::CreateStudentRequest;
use super::repo::Student;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route("/students/:id", delete(delete_student))
}

#[instrument(skip(state))]
pub async fn list_students(
    State(state): State<AppState>,
    Staff(_): Staff,
) -> Result<Json<Vec<Student>>, ApiError> {
    let students = Student::list(&state.db).await?;
    Ok(Json(students))
}

#[instrument(skip(state, payload))]
pub async fn create_student(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    if name.len() < 2 || name.len() > 100 {
        return Err(ApiError::Validation(
            "Name must be between 2 and 100 characters".into(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let student = Student::create(&state.db, name, &email)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Duplicate(_) => {
                ApiError::Duplicate("A student with this email already exists".into())
            }
            other => other,
        })?;

    let _ = state.events.send(StudentEvent::Inserted {
        student: student.clone(),
    });

    info!(student_id = %student.student_id, email = %student.email, "student created");
    Ok((StatusCode::CREATED, Json(student)))
}

#[instrument(skip(state))]
pub async fn delete_student(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let student = Student::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".into()))?;

    if !Student::delete_cascade(&state.db, id).await? {
        return Err(ApiError::NotFound("Student not found".into()));
    }

    let _ = state.events.send(StudentEvent::Deleted { student_id: id });

    info!(student_id = %id, "student removed with all associated results");
    Ok(Json(serde_json::json!({
        "message": format!("Successfully removed {} and all associated records", student.name)
    })))
}
