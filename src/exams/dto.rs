use serde::Deserialize;
use time::Date;

#[derive(Debug, Deserialize)]
pub struct CreateExamRequest {
    pub course: String,
    pub exam_name: String,
    pub date: Date,
    #[serde(default = "default_credits")]
    pub credits: i32,
}

fn default_credits() -> i32 {
    3
}
