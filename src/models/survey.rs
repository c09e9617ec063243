use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::permission::{SurveyAccess, SurveyPermission};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Survey {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: SurveyStatus,
    pub share_url: Option<String>, // ! unique when set, present only while ACTIVE
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Editable survey fields; `None` leaves a field as it is and
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyDetails {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

/// A collaborator grant on a survey the user does not own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SurveyUser {
    pub survey_id: String,
    pub user_id: String,
    pub permission: SurveyPermission,
    pub granted_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SurveyListItem {
    #[serde(flatten)]
    pub survey: Survey,
    pub access: SurveyAccess,
}
