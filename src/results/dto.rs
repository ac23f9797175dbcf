use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateResultRequest {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResultRequest {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub score: i32,
}
