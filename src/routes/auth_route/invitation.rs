use axum::{Json, extract::State};
use chrono::{DateTime, Utc};

use crate::{
    errors::Result,
    middleware::Session,
    models::invitation::{Invitation, InvitationQuota, InvitationSummary},
    services::invitations::{self, NewInvitation},
    state::AppState,
    utils::validated_form::ValidatedJson,
};

#[derive(serde::Deserialize, Debug, Clone, Default, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateInvitationRequest {
    #[validate(email, length(max = 255))]
    pub invited_email: Option<String>,
    #[validate(length(max = 100))]
    pub invited_name: Option<String>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct CreateInvitationResponse {
    pub code: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_invitation(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(input): ValidatedJson<CreateInvitationRequest>,
) -> Result<Json<CreateInvitationResponse>> {
    let invitation = invitations::create(
        state.store.as_ref(),
        &session.user_id,
        NewInvitation {
            invited_email: input.invited_email,
            invited_name: input.invited_name,
            message: input.message,
        },
    )
    .await?;

    Ok(Json(CreateInvitationResponse {
        url: state.config.invitation_url(&invitation.code),
        code: invitation.code,
        expires_at: invitation.expires_at,
    }))
}

#[derive(serde::Deserialize, Debug, Clone, Default, validator::Validate)]
pub struct ValidateInvitationRequest {
    #[serde(default)]
    pub code: String,
}

pub async fn validate_invitation(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<ValidateInvitationRequest>,
) -> Result<Json<InvitationSummary>> {
    let summary = invitations::validate(state.store.as_ref(), &input.code).await?;
    Ok(Json(summary))
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct InvitationListResponse {
    pub quota: InvitationQuota,
    pub invitations: Vec<Invitation>,
}

pub async fn list_invitations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<InvitationListResponse>> {
    let store = state.store.as_ref();
    Ok(Json(InvitationListResponse {
        quota: invitations::quota(store, &session.user_id).await?,
        invitations: store.list_invitations(&session.user_id).await?,
    }))
}
