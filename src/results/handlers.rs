use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::Staff,
    error::ApiError,
    exams::repo::Exam,
    grading::score_in_range,
    state::AppState,
    students::repo::Student,
};

use super::dto::{CreateResultRequest, UpdateResultRequest};
use super::repo::{self, JoinedResult, ResultRecord};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/results", get(list_results).post(create_result))
        .route(
            "/results/:id",
            axum::routing::put(update_result).delete(delete_result),
        )
}

#[instrument(skip(state))]
pub async fn list_results(
    State(state): State<AppState>,
    Staff(_): Staff,
) -> Result<Json<Vec<JoinedResult>>, ApiError> {
    let results = repo::list_joined(&state.db).await?;
    Ok(Json(results))
}

#[instrument(skip(state, payload))]
pub async fn create_result(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(payload): Json<CreateResultRequest>,
) -> Result<(StatusCode, Json<ResultRecord>), ApiError> {
    if !score_in_range(payload.score) {
        return Err(ApiError::Validation(
            "Score must be a number between 0 and 100".into(),
        ));
    }

    // Re-validate the references even though the database enforces them, so
    // the caller gets a field-level message instead of a constraint code.
    let student = Student::find(&state.db, payload.student_id)
        .await?
        .ok_or_else(|| ApiError::Validation("Selected student no longer exists".into()))?;
    let exam = Exam::find(&state.db, payload.exam_id)
        .await?
        .ok_or_else(|| ApiError::Validation("Selected exam no longer exists".into()))?;

    let duplicate_msg = format!(
        "{} already has a result for {}. Please edit the existing result instead.",
        student.name, exam.exam_name
    );

    if repo::existing_pair(&state.db, payload.student_id, payload.exam_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Duplicate(duplicate_msg));
    }

    let result = repo::create(&state.db, payload.student_id, payload.exam_id, payload.score)
        .await
        .map_err(|e| match ApiError::from(e) {
            // The pre-check can race a concurrent insert; the unique index
            // reports it and gets the same message.
            ApiError::Duplicate(_) => ApiError::Duplicate(duplicate_msg.clone()),
            other => other,
        })?;

    info!(result_id = %result.result_id, score = result.score, "result added");
    Ok((StatusCode::CREATED, Json(result)))
}

#[instrument(skip(state, payload))]
pub async fn update_result(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResultRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !score_in_range(payload.score) {
        return Err(ApiError::Validation(
            "Score must be a number between 0 and 100".into(),
        ));
    }

    // Same reference pre-checks as create: a stale id gets a field-level
    // message instead of a foreign-key constraint code.
    if Student::find(&state.db, payload.student_id).await?.is_none() {
        return Err(ApiError::Validation(
            "Selected student no longer exists".into(),
        ));
    }
    if Exam::find(&state.db, payload.exam_id).await?.is_none() {
        return Err(ApiError::Validation("Selected exam no longer exists".into()));
    }

    let updated = repo::update(
        &state.db,
        id,
        payload.student_id,
        payload.exam_id,
        payload.score,
    )
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Duplicate(_) => ApiError::Duplicate(
            "This student already has a result for this exam.".into(),
        ),
        other => other,
    })?;

    if !updated {
        return Err(ApiError::NotFound("Result not found".into()));
    }

    info!(result_id = %id, "result updated");
    Ok(Json(serde_json::json!({ "message": "Result updated successfully" })))
}

#[instrument(skip(state))]
pub async fn delete_result(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Result not found".into()));
    }
    info!(result_id = %id, "result deleted");
    Ok(Json(serde_json::json!({ "message": "Result deleted" })))
}

// Database-backed tests; run with `cargo test -- --ignored` against a
// Postgres instance at DATABASE_URL.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Staff;
    use sqlx::postgres::PgPoolOptions;
    use time::macros::date;

    async fn db_state() -> AppState {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");
        AppState {
            db,
            ..AppState::fake()
        }
    }

    async fn fixture(state: &AppState, tag: &str) -> (Student, Exam) {
        let student = Student::create(
            &state.db,
            "Resit Candidate",
            &format!("resit-{tag}@example.com"),
        )
        .await
        .expect("create student");
        let exam = Exam::create(
            &state.db,
            "CS101",
            &format!("Resit Exam {tag}"),
            date!(2030 - 06 - 01),
            3,
        )
        .await
        .expect("create exam");
        (student, exam)
    }

    async fn cleanup(state: &AppState, student: &Student, exam: &Exam) {
        let _ = Exam::delete_cascade(&state.db, exam.exam_id).await;
        let _ = Student::delete_cascade(&state.db, student.student_id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn second_insert_for_same_pair_is_rejected_toward_edit() {
        let state = db_state().await;
        let tag = Uuid::new_v4().simple().to_string();
        let (student, exam) = fixture(&state, &tag).await;

        let first = CreateResultRequest {
            student_id: student.student_id,
            exam_id: exam.exam_id,
            score: 70,
        };
        create_result(State(state.clone()), Staff(Uuid::new_v4()), Json(first))
            .await
            .expect("first insert");

        let second = CreateResultRequest {
            student_id: student.student_id,
            exam_id: exam.exam_id,
            score: 85,
        };
        let err = create_result(State(state.clone()), Staff(Uuid::new_v4()), Json(second))
            .await
            .unwrap_err();
        match err {
            ApiError::Duplicate(msg) => {
                assert!(msg.contains("edit the existing result"), "got: {msg}")
            }
            other => panic!("expected Duplicate, got {other:?}"),
        }

        cleanup(&state, &student, &exam).await;
    }

    #[tokio::test]
    #[ignore]
    async fn update_with_stale_exam_reports_missing_reference() {
        let state = db_state().await;
        let tag = Uuid::new_v4().simple().to_string();
        let (student, exam) = fixture(&state, &tag).await;
        let result = repo::create(&state.db, student.student_id, exam.exam_id, 60)
            .await
            .expect("create result");

        let payload = UpdateResultRequest {
            student_id: student.student_id,
            exam_id: Uuid::new_v4(),
            score: 90,
        };
        let err = update_result(
            State(state.clone()),
            Staff(Uuid::new_v4()),
            Path(result.result_id),
            Json(payload),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Validation(msg) => {
                assert!(msg.contains("Selected exam no longer exists"), "got: {msg}")
            }
            other => panic!("expected Validation, got {other:?}"),
        }

        cleanup(&state, &student, &exam).await;
    }
}
