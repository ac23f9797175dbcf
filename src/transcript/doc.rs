use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::grading::{grade_for, is_distinction, status_for, Grade, Status};
use crate::results::repo::JoinedResult;

/// Credits assumed when a result has lost its exam join.
const DEFAULT_CREDITS: i32 = 3;

#[derive(Debug, Serialize)]
pub struct TranscriptRow {
    pub course: String,
    pub exam: String,
    pub date: Option<Date>,
    pub credits: i32,
    pub score: i32,
    pub grade: Grade,
    pub status: Status,
    pub distinction: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TranscriptSummary {
    pub average: i64,
    pub highest: i32,
    pub lowest: i32,
    pub total_exams: usize,
    /// Grade-point average expressed as a percentage, two decimals.
    pub gpa: f64,
    pub distinctions: usize,
}

/// The document the transcript screen renders: per-result rows plus summary
/// statistics. Produced on demand, never persisted.
#[derive(Debug, Serialize)]
pub struct Transcript {
    pub student_name: String,
    pub student_email: String,
    pub generated_at: OffsetDateTime,
    pub summary: TranscriptSummary,
    pub rows: Vec<TranscriptRow>,
}

pub fn summarize(results: &[JoinedResult]) -> TranscriptSummary {
    if results.is_empty() {
        return TranscriptSummary {
            average: 0,
            highest: 0,
            lowest: 0,
            total_exams: 0,
            gpa: 0.0,
            distinctions: 0,
        };
    }
    let scores: Vec<i32> = results.iter().map(|r| r.score).collect();
    let total: i64 = scores.iter().map(|&s| s as i64).sum();
    let average = (total as f64 / scores.len() as f64).round() as i64;
    let gpa = (total as f64 / (scores.len() as f64 * 100.0)) * 100.0;
    TranscriptSummary {
        average,
        highest: *scores.iter().max().unwrap(),
        lowest: *scores.iter().min().unwrap(),
        total_exams: results.len(),
        gpa: (gpa * 100.0).round() / 100.0,
        distinctions: scores.iter().filter(|&&s| is_distinction(s)).count(),
    }
}

pub fn build(name: &str, email: &str, results: &[JoinedResult]) -> Transcript {
    let rows = results
        .iter()
        .map(|r| TranscriptRow {
            course: r.course.clone().unwrap_or_else(|| "-".into()),
            exam: r.exam_name.clone().unwrap_or_else(|| "-".into()),
            date: r.exam_date,
            credits: r.credits.unwrap_or(DEFAULT_CREDITS),
            score: r.score,
            grade: grade_for(r.score),
            status: status_for(r.score),
            distinction: is_distinction(r.score),
        })
        .collect();
    Transcript {
        student_name: name.to_string(),
        student_email: email.to_string(),
        generated_at: OffsetDateTime::now_utc(),
        summary: summarize(results),
        rows,
    }
}
