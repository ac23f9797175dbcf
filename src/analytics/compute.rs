use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::exams::repo::Exam;
use crate::grading::{bucket_index, BUCKET_LABELS};
use crate::results::repo::JoinedResult;
use crate::students::repo::Student;

/// Immutable view of the loaded data. Rebuilt wholesale per request instead
/// of patched incrementally, so every derived figure agrees with itself.
#[derive(Debug)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub exams: Vec<Exam>,
    pub results: Vec<JoinedResult>,
}

/// Analytics filters; the date range is inclusive on both ends.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Filters {
    pub course: Option<String>,
    pub exam: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl Filters {
    fn matches(&self, r: &JoinedResult) -> bool {
        if let Some(course) = &self.course {
            if r.course.as_deref() != Some(course.as_str()) {
                return false;
            }
        }
        if let Some(exam) = &self.exam {
            if r.exam_name.as_deref() != Some(exam.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            match r.exam_date {
                Some(d) if d >= start => {}
                Some(_) => return false,
                None => {}
            }
        }
        if let Some(end) = self.end_date {
            match r.exam_date {
                Some(d) if d <= end => {}
                Some(_) => return false,
                None => {}
            }
        }
        true
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub data: Vec<i64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Distribution {
    pub labels: Vec<String>,
    pub data: [u64; 6],
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OverallStats {
    pub total_students: usize,
    pub total_exams: usize,
    pub average_score: i64,
    pub total_results: usize,
}

fn rounded_mean(sum: i64, count: usize) -> i64 {
    (sum as f64 / count as f64).round() as i64
}

/// Mean score per course, rounded to the nearest integer. Results without an
/// exam join are excluded. Courses appear sorted by label.
pub fn average_by_course(results: &[JoinedResult], filters: &Filters) -> Series {
    let mut agg: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    for r in results.iter().filter(|r| filters.matches(r)) {
        let Some(course) = r.course.as_deref() else {
            continue;
        };
        let entry = agg.entry(course).or_insert((0, 0));
        entry.0 += r.score as i64;
        entry.1 += 1;
    }
    let labels: Vec<String> = agg.keys().map(|c| c.to_string()).collect();
    let data: Vec<i64> = agg.values().map(|(sum, n)| rounded_mean(*sum, *n)).collect();
    Series { labels, data }
}

/// Fixed six-bucket score distribution: 0-49, 50-59, 60-69, 70-79, 80-89,
/// 90-100, lower bounds inclusive.
pub fn score_distribution(results: &[JoinedResult], filters: &Filters) -> Distribution {
    let mut data = [0u64; 6];
    for r in results.iter().filter(|r| filters.matches(r)) {
        data[bucket_index(r.score)] += 1;
    }
    Distribution {
        labels: BUCKET_LABELS.iter().map(|s| s.to_string()).collect(),
        data,
    }
}

/// Mean score per exam day, labels sorted ascending. Results without an exam
/// date are excluded.
pub fn trend_over_time(results: &[JoinedResult], filters: &Filters) -> Series {
    let mut agg: BTreeMap<Date, (i64, usize)> = BTreeMap::new();
    for r in results.iter().filter(|r| filters.matches(r)) {
        let Some(day) = r.exam_date else {
            continue;
        };
        let entry = agg.entry(day).or_insert((0, 0));
        entry.0 += r.score as i64;
        entry.1 += 1;
    }
    let labels: Vec<String> = agg.keys().map(|d| d.to_string()).collect();
    let data: Vec<i64> = agg.values().map(|(sum, n)| rounded_mean(*sum, *n)).collect();
    Series { labels, data }
}

/// Headline counters. All zeros when there are no results, matching the empty
/// dashboard.
pub fn overall_stats(snapshot: &Snapshot) -> OverallStats {
    if snapshot.results.is_empty() {
        return OverallStats {
            total_students: 0,
            total_exams: 0,
            average_score: 0,
            total_results: 0,
        };
    }
    let sum: i64 = snapshot.results.iter().map(|r| r.score as i64).sum();
    OverallStats {
        total_students: snapshot.students.len(),
        total_exams: snapshot.exams.len(),
        average_score: rounded_mean(sum, snapshot.results.len()),
        total_results: snapshot.results.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn result(course: Option<&str>, exam: &str, day: Option<Date>, score: i32) -> JoinedResult {
        JoinedResult {
            result_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            score,
            created_at: OffsetDateTime::now_utc(),
            student_name: Some("Ada Lovelace".into()),
            student_email: Some("ada@example.com".into()),
            exam_name: Some(exam.into()),
            course: course.map(|c| c.into()),
            exam_date: day,
            credits: Some(3),
        }
    }

    #[test]
    fn average_by_course_rounds_to_nearest() {
        let results = vec![
            result(Some("CourseA"), "Midterm", None, 80),
            result(Some("CourseA"), "Final", None, 60),
        ];
        let series = average_by_course(&results, &Filters::default());
        assert_eq!(series.labels, vec!["CourseA"]);
        assert_eq!(series.data, vec![70]);
    }

    #[test]
    fn missing_exam_join_is_excluded_not_fatal() {
        let results = vec![
            result(Some("CS101"), "Midterm", None, 90),
            result(None, "Orphan", None, 10),
        ];
        let series = average_by_course(&results, &Filters::default());
        assert_eq!(series.labels, vec!["CS101"]);
        assert_eq!(series.data, vec![90]);
    }

    #[test]
    fn distribution_bucket_boundaries() {
        let results = vec![
            result(Some("C"), "E1", None, 50),
            result(Some("C"), "E2", None, 90),
            result(Some("C"), "E3", None, 49),
            result(Some("C"), "E4", None, 89),
        ];
        let dist = score_distribution(&results, &Filters::default());
        assert_eq!(dist.data, [1, 1, 0, 0, 1, 1]);
        assert_eq!(dist.labels[1], "50-59");
        assert_eq!(dist.labels[5], "90-100");
    }

    #[test]
    fn trend_groups_by_day_sorted_ascending() {
        let d1 = date!(2026 - 03 - 01);
        let d2 = date!(2026 - 02 - 01);
        let results = vec![
            result(Some("C"), "E1", Some(d1), 80),
            result(Some("C"), "E1", Some(d1), 60),
            result(Some("C"), "E2", Some(d2), 90),
        ];
        let series = trend_over_time(&results, &Filters::default());
        assert_eq!(series.labels, vec!["2026-02-01", "2026-03-01"]);
        assert_eq!(series.data, vec![90, 70]);
    }

    #[test]
    fn filters_apply_course_exam_and_inclusive_dates() {
        let d = date!(2026 - 05 - 10);
        let results = vec![
            result(Some("CS101"), "Midterm", Some(d), 80),
            result(Some("CS102"), "Final", Some(date!(2026 - 07 - 01)), 40),
        ];

        let by_course = Filters {
            course: Some("CS101".into()),
            ..Default::default()
        };
        assert_eq!(average_by_course(&results, &by_course).labels, vec!["CS101"]);

        let by_exam = Filters {
            exam: Some("Final".into()),
            ..Default::default()
        };
        assert_eq!(average_by_course(&results, &by_exam).labels, vec!["CS102"]);

        // Boundary dates are included on both ends.
        let window = Filters {
            start_date: Some(d),
            end_date: Some(d),
            ..Default::default()
        };
        let dist = score_distribution(&results, &window);
        assert_eq!(dist.data.iter().sum::<u64>(), 1);
    }

    #[test]
    fn stats_zero_when_no_results() {
        let snapshot = Snapshot {
            students: vec![],
            exams: vec![],
            results: vec![],
        };
        let stats = overall_stats(&snapshot);
        assert_eq!(
            stats,
            OverallStats {
                total_students: 0,
                total_exams: 0,
                average_score: 0,
                total_results: 0
            }
        );
    }
}
