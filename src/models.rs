use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SUCCESS_MESSAGE: &str = "Image received successfully!";

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub image: Option<String>,
}

/// One solved expression, assignment or recognized concept.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AnswerRecord {
    pub expr: String,
    pub result: Value,
    pub assign: bool,
}

pub type AnswerSet = Vec<AnswerRecord>;

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub message: &'static str,
    pub value: AnswerSet,
}
