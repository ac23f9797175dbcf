use serde::Serialize;

/// Letter grade bands: A >= 90, B >= 80, C >= 70, D >= 50, F below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

/// Pass/fail band with a distinction tier, cut independently of the letter
/// grade: Distinction >= 75, Pass >= 50, Fail below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Distinction,
    Pass,
    Fail,
}

pub const DISTINCTION_CUTOFF: i32 = 75;

pub fn grade_for(score: i32) -> Grade {
    if score >= 90 {
        Grade::A
    } else if score >= 80 {
        Grade::B
    } else if score >= 70 {
        Grade::C
    } else if score >= 50 {
        Grade::D
    } else {
        Grade::F
    }
}

pub fn status_for(score: i32) -> Status {
    if score >= DISTINCTION_CUTOFF {
        Status::Distinction
    } else if score >= 50 {
        Status::Pass
    } else {
        Status::Fail
    }
}

pub fn is_distinction(score: i32) -> bool {
    score >= DISTINCTION_CUTOFF
}

pub const BUCKET_LABELS: [&str; 6] = ["0-49", "50-59", "60-69", "70-79", "80-89", "90-100"];

/// Index into [`BUCKET_LABELS`]; lower bounds inclusive, so 50 lands in
/// "50-59" and 90 in "90-100".
pub fn bucket_index(score: i32) -> usize {
    if score < 50 {
        0
    } else if score < 60 {
        1
    } else if score < 70 {
        2
    } else if score < 80 {
        3
    } else if score < 90 {
        4
    } else {
        5
    }
}

pub fn score_in_range(score: i32) -> bool {
    (0..=100).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_band_edges() {
        assert_eq!(grade_for(100), Grade::A);
        assert_eq!(grade_for(90), Grade::A);
        assert_eq!(grade_for(89), Grade::B);
        assert_eq!(grade_for(80), Grade::B);
        assert_eq!(grade_for(79), Grade::C);
        assert_eq!(grade_for(70), Grade::C);
        assert_eq!(grade_for(69), Grade::D);
        assert_eq!(grade_for(50), Grade::D);
        assert_eq!(grade_for(49), Grade::F);
        assert_eq!(grade_for(0), Grade::F);
    }

    #[test]
    fn status_band_edges() {
        assert_eq!(status_for(75), Status::Distinction);
        assert_eq!(status_for(74), Status::Pass);
        assert_eq!(status_for(50), Status::Pass);
        assert_eq!(status_for(49), Status::Fail);
    }

    #[test]
    fn letter_rank_is_monotonic_over_full_range() {
        // Grade derives Ord with A < B < ... < F, so the letter rank must
        // never improve as the score decreases.
        let mut previous = grade_for(100);
        for score in (0..=100).rev() {
            let grade = grade_for(score);
            assert!(grade >= previous, "score {score} broke monotonicity");
            previous = grade;
        }
    }

    #[test]
    fn bucket_boundaries_are_lower_inclusive() {
        assert_eq!(BUCKET_LABELS[bucket_index(50)], "50-59");
        assert_eq!(BUCKET_LABELS[bucket_index(59)], "50-59");
        assert_eq!(BUCKET_LABELS[bucket_index(90)], "90-100");
        assert_eq!(BUCKET_LABELS[bucket_index(100)], "90-100");
        assert_eq!(BUCKET_LABELS[bucket_index(49)], "0-49");
        assert_eq!(BUCKET_LABELS[bucket_index(0)], "0-49");
    }
}
