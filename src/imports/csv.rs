use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::auth::is_valid_email;
use crate::error::ApiError;
use crate::exams::repo::Exam;
use crate::grading::score_in_range;
use crate::students::repo::Student;

pub const REQUIRED_COLUMNS: [&str; 3] = ["student_email", "exam_name", "score"];

/// Rows per insert statement; keeps each batch under backend size limits and
/// bounds the blast radius of a failed batch.
pub const BATCH_SIZE: usize = 100;

/// A fully validated candidate row, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub score: i32,
}

/// Import outcome counters. `total` counts processed (non-empty) data rows,
/// so `total == valid + invalid + duplicates` always holds. `inserted` and
/// `failed` are filled in by the batch-insert stage.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub inserted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct Validated {
    pub rows: Vec<ImportRow>,
    pub summary: ImportSummary,
}

/// Validates an uploaded CSV against the already-loaded students and exams.
/// Structural problems (missing header columns, empty file, zero valid rows)
/// abort before any insert; per-row problems are recorded and skipped.
pub fn validate_csv(
    text: &str,
    students: &[Student],
    exams: &[Exam],
) -> Result<Validated, ApiError> {
    let mut lines = text.lines();
    let header_line = match lines.next() {
        Some(l) if !l.trim().is_empty() => l,
        _ => {
            return Err(ApiError::Validation(
                "CSV file is empty or missing header row".into(),
            ))
        }
    };

    let header: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    // Column order is free; resolve indices once from the header.
    let idx_of = |name: &str| header.iter().position(|h| h == name).unwrap();
    let email_idx = idx_of("student_email");
    let exam_idx = idx_of("exam_name");
    let score_idx = idx_of("score");

    // Case-insensitive lookup maps built once; no per-row queries.
    let students_by_email: HashMap<String, &Student> = students
        .iter()
        .map(|s| (s.email.to_lowercase(), s))
        .collect();
    let exams_by_name: HashMap<String, &Exam> = exams
        .iter()
        .map(|e| (e.exam_name.to_lowercase(), e))
        .collect();

    let mut rows = Vec::new();
    let mut summary = ImportSummary::default();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();

    for (i, raw) in lines.enumerate() {
        let line_no = i + 2; // 1-based, after the header
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        summary.total += 1;

        let values: Vec<&str> = line.split(',').map(|v| v.trim()).collect();
        if values.len() != header.len() {
            summary.errors.push(format!(
                "Line {line_no}: Expected {} values, got {}",
                header.len(),
                values.len()
            ));
            summary.invalid += 1;
            continue;
        }

        let student_email = values[email_idx];
        let exam_name = values[exam_idx];
        let score_str = values[score_idx];

        if !is_valid_email(student_email) {
            summary
                .errors
                .push(format!("Line {line_no}: Invalid email format: {student_email}"));
            summary.invalid += 1;
            continue;
        }

        let score = match score_str.parse::<i32>() {
            Ok(s) if score_in_range(s) => s,
            _ => {
                summary.errors.push(format!(
                    "Line {line_no}: Invalid score (must be 0-100): {score_str}"
                ));
                summary.invalid += 1;
                continue;
            }
        };

        let Some(student) = students_by_email.get(&student_email.to_lowercase()) else {
            summary
                .errors
                .push(format!("Line {line_no}: Student not found: {student_email}"));
            summary.invalid += 1;
            continue;
        };

        let Some(exam) = exams_by_name.get(&exam_name.to_lowercase()) else {
            summary
                .errors
                .push(format!("Line {line_no}: Exam not found: {exam_name}"));
            summary.invalid += 1;
            continue;
        };

        if !seen.insert((student.student_id, exam.exam_id)) {
            summary.errors.push(format!(
                "Line {line_no}: Duplicate entry for student {student_email} in exam {exam_name}"
            ));
            summary.duplicates += 1;
            continue;
        }

        rows.push(ImportRow {
            student_id: student.student_id,
            exam_id: exam.exam_id,
            score,
        });
        summary.valid += 1;
    }

    if rows.is_empty() {
        return Err(ApiError::Validation(
            "No valid results found in CSV file".into(),
        ));
    }

    Ok(Validated { rows, summary })
}
