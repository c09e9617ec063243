use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    errors::{Error, Result},
    middleware::Session,
    models::{
        permission::{PermissionChecker, SurveyAccess},
        question::Question,
        response::SurveyResponse,
        survey::{Survey, SurveyDetails, SurveyListItem},
    },
    routes::{MessageResponse, survey_route::authorize},
    services::{
        permission,
        surveys::{self, QuestionInput, build_questions},
    },
    state::AppState,
    utils::{validated_form::ValidatedJson, validator::validate_not_blank},
};

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateSurveyRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

pub async fn create_survey(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(input): ValidatedJson<CreateSurveyRequest>,
) -> Result<(StatusCode, Json<Survey>)> {
    let survey = surveys::create(
        state.store.as_ref(),
        &session.user_id,
        input.title.trim().to_string(),
        input.description,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(survey)))
}

pub async fn list_surveys(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<SurveyListItem>>> {
    Ok(Json(
        surveys::list_for_user(state.store.as_ref(), &session.user_id).await?,
    ))
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct SurveyDetail {
    pub survey: Survey,
    pub questions: Vec<Question>,
    pub access: SurveyAccess,
}

pub async fn get_survey(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<SurveyDetail>> {
    let (survey, access) = authorize(&state, &session, &id, SurveyAccess::check_view).await?;
    let questions = state.store.list_questions(&survey.id).await?;
    Ok(Json(SurveyDetail {
        survey,
        questions,
        access,
    }))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateSurveyRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

pub async fn update_survey(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateSurveyRequest>,
) -> Result<Json<Survey>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_edit).await?;
    let details = SurveyDetails {
        title: input.title.map(|title| title.trim().to_string()),
        description: input
            .description
            .map(|description| Some(description).filter(|d| !d.trim().is_empty())),
    };

    Ok(Json(
        state
            .store
            .update_survey_details(&survey.id, details, Utc::now())
            .await?,
    ))
}

pub async fn delete_survey(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_owner).await?;
    if !state.store.delete_survey(&survey.id).await? {
        return Err(Error::NotFound);
    }
    info!("Survey {} deleted by {}", survey.id, session.user_id);
    Ok(Json(MessageResponse::new("Survey deleted")))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct ReplaceQuestionsRequest {
    pub questions: Vec<QuestionInput>,
}

pub async fn replace_questions(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<ReplaceQuestionsRequest>,
) -> Result<Json<Vec<Question>>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_edit).await?;
    let questions = build_questions(&survey.id, input.questions)?;
    let questions = state.store.replace_questions(&survey.id, questions).await?;
    info!(
        "Survey {} now has {} questions",
        survey.id,
        questions.len()
    );
    Ok(Json(questions))
}

pub async fn list_responses(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Vec<SurveyResponse>>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_view).await?;
    Ok(Json(state.store.list_responses(&survey.id).await?))
}

/// Evaluator output as-is; a survey the caller cannot see yields all-false.
pub async fn survey_permissions(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Json<SurveyAccess> {
    Json(permission::evaluate(state.store.as_ref(), &session.user_id, &id).await)
}
