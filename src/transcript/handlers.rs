use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::auth::repo::User;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::results::repo::{self, JoinedResult};
use crate::retry;
use crate::state::AppState;
use crate::students::repo::Student;
use crate::transcript::doc::{self, Transcript};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/my/results", get(my_results))
        .route("/my/transcript", get(my_transcript))
}

#[derive(Debug, Serialize)]
struct MyResultsResponse {
    student: Student,
    results: Vec<JoinedResult>,
}

/// Resolves the signed-in user's student profile by email. Accounts created
/// before a lecturer registered the student have no profile yet.
async fn resolve_student(state: &AppState, user_id: uuid::Uuid) -> Result<Student, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".into()))?;
    Student::find_by_email(&state.db, &user.email)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No student record found for {}. Please contact your lecturer to add you to the system.",
                user.email
            ))
        })
}

#[instrument(skip(state))]
async fn my_results(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MyResultsResponse>, ApiError> {
    let student = resolve_student(&state, user_id).await?;
    let results = retry::bounded(&state.config.retry, "my results", || {
        repo::list_joined_for_student(&state.db, student.student_id)
    })
    .await?;
    Ok(Json(MyResultsResponse { student, results }))
}

#[instrument(skip(state))]
async fn my_transcript(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Transcript>, ApiError> {
    let student = resolve_student(&state, user_id).await?;
    let results = retry::bounded(&state.config.retry, "transcript results", || {
        repo::list_joined_for_student(&state.db, student.student_id)
    })
    .await?;
    Ok(Json(doc::build(&student.name, &student.email, &results)))
}
