use serde::{Deserialize, Serialize};

pub const SHORT_TEXT_MAX: u32 = 255;
pub const LONG_TEXT_MAX: u32 = 5000;

/// Per-type options and settings of a question.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText {
        #[serde(default)]
        max_length: Option<u32>,
    },
    LongText {
        #[serde(default)]
        max_length: Option<u32>,
    },
    SingleChoice {
        options: Vec<String>,
    },
    MultipleChoice {
        options: Vec<String>,
        #[serde(default)]
        max_selections: Option<u32>,
    },
    Rating {
        scale: u8,
    },
}

impl QuestionKind {
    pub fn text_limit(&self) -> Option<u32> {
        match self {
            QuestionKind::ShortText { max_length } => {
                Some(max_length.unwrap_or(SHORT_TEXT_MAX).min(SHORT_TEXT_MAX))
            }
            QuestionKind::LongText { max_length } => {
                Some(max_length.unwrap_or(LONG_TEXT_MAX).min(LONG_TEXT_MAX))
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub survey_id: String,
    pub order: u32,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}
