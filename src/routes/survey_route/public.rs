use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};

use crate::{
    errors::Result,
    models::{question::Question, response::Answer},
    services::surveys,
    state::AppState,
    utils::validated_form::ValidatedJson,
};

/// What respondents see of a survey; the owner stays private.
#[derive(serde::Serialize, Debug, Clone)]
pub struct PublicSurvey {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

pub async fn public_survey(
    State(state): State<AppState>,
    Path(share_url): Path<String>,
) -> Result<Json<PublicSurvey>> {
    let (survey, questions) = surveys::public_view(state.store.as_ref(), &share_url).await?;
    Ok(Json(PublicSurvey {
        title: survey.title,
        description: survey.description,
        questions,
    }))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitResponseRequest {
    pub answers: Vec<Answer>,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct SubmittedResponse {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
}

pub async fn submit_response(
    State(state): State<AppState>,
    Path(share_url): Path<String>,
    ValidatedJson(input): ValidatedJson<SubmitResponseRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>)> {
    let response =
        surveys::submit_response(state.store.as_ref(), &share_url, input.answers).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmittedResponse {
            id: response.id,
            submitted_at: response.submitted_at,
        }),
    ))
}
