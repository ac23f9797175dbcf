use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::Staff,
    error::ApiError,
    exams::repo::Exam,
    results::repo::insert_batch,
    retry,
    state::AppState,
    students::repo::Student,
};

use super::csv::{validate_csv, BATCH_SIZE};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/imports/results", post(import_results))
        // File-size ceiling is checked explicitly below; the body limit just
        // needs headroom for the multipart framing.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
}

/// Bulk result import from an uploaded CSV. Structural failures abort before
/// any insert; row and batch failures accumulate into the returned summary,
/// so a partial import is possible and reported.
#[instrument(skip(state, mp))]
pub async fn import_results(
    State(state): State<AppState>,
    Staff(_): Staff,
    mut mp: Multipart,
) -> Result<Json<super::csv::ImportSummary>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart upload: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read CSV file: {e}")))?;
            upload = Some((file_name, data.to_vec()));
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::Validation("Please select a CSV file to upload".into()))?;

    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(ApiError::Validation(
            "Invalid file type. Please upload a CSV file".into(),
        ));
    }
    if data.len() > state.config.max_csv_bytes {
        return Err(ApiError::Validation(
            "File is too large. Maximum size is 5MB".into(),
        ));
    }

    let text = String::from_utf8(data)
        .map_err(|_| ApiError::Validation("CSV file is not valid UTF-8 text".into()))?;

    // One snapshot of students and exams for the whole upload; rows resolve
    // against these maps, never against fresh queries.
    let retry_cfg = &state.config.retry;
    let students = retry::bounded(retry_cfg, "students", || Student::list(&state.db)).await?;
    let exams = retry::bounded(retry_cfg, "exams", || Exam::list(&state.db)).await?;

    let mut validated = validate_csv(&text, &students, &exams)?;

    for batch in validated.rows.chunks(BATCH_SIZE) {
        let rows: Vec<_> = batch
            .iter()
            .map(|r| (r.student_id, r.exam_id, r.score))
            .collect();
        match insert_batch(&state.db, &rows).await {
            Ok(n) => validated.summary.inserted += n as usize,
            Err(e) => {
                validated.summary.failed += batch.len();
                let message = match ApiError::from(e) {
                    ApiError::Duplicate(_) => {
                        "Batch insert failed: Some results already exist".to_string()
                    }
                    other => format!("Batch insert failed: {other}"),
                };
                warn!(%message, batch_len = batch.len(), "csv batch failed");
                validated.summary.errors.push(message);
            }
        }
    }

    info!(
        total = validated.summary.total,
        valid = validated.summary.valid,
        invalid = validated.summary.invalid,
        duplicates = validated.summary.duplicates,
        inserted = validated.summary.inserted,
        failed = validated.summary.failed,
        "csv import finished"
    );
    Ok(Json(validated.summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use time::macros::date;
    use uuid::Uuid;

    #[tokio::test]
    async fn garbled_multipart_is_reported_not_treated_as_missing_file() {
        let state = AppState::fake();
        // Valid content-type, but the body never contains the boundary.
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=UPLOAD")
            .body(Body::from("this is not a multipart body"))
            .unwrap();
        let mp = Multipart::from_request(req, &()).await.unwrap();

        let err = import_results(State(state), crate::auth::Staff(Uuid::new_v4()), mp)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(
            err.to_string().contains("Malformed multipart upload"),
            "got: {err}"
        );
    }

    // Database-backed test; run with `cargo test -- --ignored` against a
    // Postgres instance at DATABASE_URL.
    #[tokio::test]
    #[ignore]
    async fn every_valid_row_ends_up_inserted() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");

        let tag = Uuid::new_v4().simple().to_string();
        let ada = Student::create(&db, "Ada Import", &format!("ada-{tag}@example.com"))
            .await
            .expect("create student");
        let alan = Student::create(&db, "Alan Import", &format!("alan-{tag}@example.com"))
            .await
            .expect("create student");
        let midterm = Exam::create(
            &db,
            "CS101",
            &format!("Import Midterm {tag}"),
            date!(2030 - 06 - 01),
            3,
        )
        .await
        .expect("create exam");
        let fin = Exam::create(
            &db,
            "CS101",
            &format!("Import Final {tag}"),
            date!(2030 - 06 - 15),
            3,
        )
        .await
        .expect("create exam");

        let csv = format!(
            "student_email,exam_name,score\n\
             ada-{tag}@example.com,Import Midterm {tag},80\n\
             alan-{tag}@example.com,Import Midterm {tag},65\n\
             ada-{tag}@example.com,Import Final {tag},91\n"
        );
        let students = vec![ada.clone(), alan.clone()];
        let exams = vec![midterm.clone(), fin.clone()];
        let mut validated = validate_csv(&csv, &students, &exams).expect("validate");
        assert_eq!(validated.summary.valid, 3);

        for batch in validated.rows.chunks(BATCH_SIZE) {
            let rows: Vec<_> = batch
                .iter()
                .map(|r| (r.student_id, r.exam_id, r.score))
                .collect();
            validated.summary.inserted += insert_batch(&db, &rows).await.expect("insert") as usize;
        }
        assert_eq!(validated.summary.inserted, validated.summary.valid);

        let stored: (i64,) = sqlx::query_as(
            "SELECT count(*) FROM results WHERE student_id = $1 OR student_id = $2",
        )
        .bind(ada.student_id)
        .bind(alan.student_id)
        .fetch_one(&db)
        .await
        .expect("count results");
        assert_eq!(stored.0, validated.summary.valid as i64);

        let _ = Exam::delete_cascade(&db, midterm.exam_id).await;
        let _ = Exam::delete_cascade(&db, fin.exam_id).await;
        let _ = Student::delete_cascade(&db, ada.student_id).await;
        let _ = Student::delete_cascade(&db, alan.student_id).await;
    }
}
