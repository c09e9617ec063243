use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    errors::Result,
    middleware::Session,
    models::permission::{PermissionChecker, SurveyAccess},
    routes::{MessageResponse, survey_route::authorize},
    services::surveys,
    state::AppState,
};

#[derive(serde::Serialize, Debug, Clone)]
pub struct ShareResponse {
    pub share_url: String,
    pub public_url: String,
}

pub async fn share_survey(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_owner).await?;
    let survey = surveys::share(state.store.as_ref(), survey).await?;
    // ! share() only returns surveys that carry a share url
    let share_url = survey.share_url.unwrap_or_default();

    Ok(Json(ShareResponse {
        public_url: state.config.public_survey_url(&share_url),
        share_url,
    }))
}

pub async fn unshare_survey(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_owner).await?;
    surveys::unshare(state.store.as_ref(), survey).await?;
    Ok(Json(MessageResponse::new("Survey is no longer shared")))
}
