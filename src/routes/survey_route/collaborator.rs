use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use tracing::info;

use crate::{
    errors::{Error, Result},
    middleware::Session,
    models::{
        permission::{PermissionChecker, SurveyAccess, SurveyPermission},
        survey::SurveyUser,
    },
    routes::{MessageResponse, survey_route::authorize},
    state::AppState,
    utils::validated_form::ValidatedJson,
};

pub async fn list_collaborators(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Vec<SurveyUser>>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_admin).await?;
    Ok(Json(state.store.list_grants(&survey.id).await?))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct GrantRequest {
    #[validate(email)]
    pub email: String,
    pub permission: SurveyPermission,
}

pub async fn grant_collaborator(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<GrantRequest>,
) -> Result<Json<SurveyUser>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_admin).await?;
    let email = input.email.trim().to_lowercase();
    let collaborator = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| Error::BadRequest(format!("No user with email {email}")))?;
    if collaborator.id == survey.owner_id {
        return Err(Error::BadRequest(
            "The owner already has full access".to_string(),
        ));
    }

    let grant = state
        .store
        .upsert_grant(SurveyUser {
            survey_id: survey.id,
            user_id: collaborator.id,
            permission: input.permission,
            granted_by: session.user_id,
            created_at: Utc::now(),
        })
        .await?;
    info!(
        "{:?} on survey {} granted to {}",
        grant.permission, grant.survey_id, grant.user_id
    );
    Ok(Json(grant))
}

pub async fn revoke_collaborator(
    State(state): State<AppState>,
    session: Session,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    let (survey, _) = authorize(&state, &session, &id, SurveyAccess::check_admin).await?;
    if !state.store.delete_grant(&survey.id, &user_id).await? {
        return Err(Error::NotFound);
    }
    info!("Access to survey {} revoked for {user_id}", survey.id);
    Ok(Json(MessageResponse::new("Collaborator removed")))
}
