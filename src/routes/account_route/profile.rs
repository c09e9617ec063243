use axum::{Json, extract::State};
use tracing::info;

use crate::{
    errors::{Error, Result},
    middleware::Session,
    models::{
        account::DeletionReport,
        invitation::InvitationQuota,
        ticket::{UserAddon, UserTicket},
        user::UserSummary,
    },
    services::{account, tickets},
    state::AppState,
};

#[derive(serde::Serialize, Debug, Clone)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub invitations: InvitationQuota,
}

pub async fn me(State(state): State<AppState>, session: Session) -> Result<Json<ProfileResponse>> {
    let user = state
        .store
        .get_user(&session.user_id)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(Json(ProfileResponse {
        invitations: InvitationQuota {
            max: user.max_invitations,
            used: user.used_invitations,
            remaining: user.remaining_invitations(),
        },
        user: UserSummary::from(&user),
    }))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<UserTicket>>> {
    Ok(Json(
        tickets::list(state.store.as_ref(), &session.user_id).await?,
    ))
}

pub async fn list_addons(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<UserAddon>>> {
    Ok(Json(state.store.list_addons(&session.user_id).await?))
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct DeleteAccountResponse {
    pub message: String,
    pub report: DeletionReport,
}

pub async fn delete_account(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DeleteAccountResponse>> {
    info!("User {} requested account deletion", session.user_id);
    let report =
        account::delete_account(state.store.as_ref(), state.files.as_ref(), &session.user_id)
            .await?;
    Ok(Json(DeleteAccountResponse {
        message: "Account deleted".to_string(),
        report,
    }))
}
