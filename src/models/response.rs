use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
    Number(i64),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
}
