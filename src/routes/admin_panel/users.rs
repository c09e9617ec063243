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
        account::DeletionReport,
        ticket::{TicketType, UserTicket},
        user::{Role, UserSummary},
    },
    services::{account, tickets},
    state::AppState,
    utils::validated_form::ValidatedJson,
};

#[derive(serde::Serialize, Debug, Clone)]
pub struct AdminUserView {
    #[serde(flatten)]
    pub user: UserSummary,
    pub max_invitations: u32,
    pub used_invitations: u32,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<AdminUserView>>> {
    let users = state.store.list_users().await?;
    Ok(Json(
        users
            .iter()
            .map(|user| AdminUserView {
                user: UserSummary::from(user),
                max_invitations: user.max_invitations,
                used_invitations: user.used_invitations,
            })
            .collect(),
    ))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    #[validate(range(max = 10_000))]
    pub max_invitations: Option<u32>,
}

pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<AdminUserView>> {
    let user = state
        .store
        .update_user_access(&id, input.role, input.max_invitations, Utc::now())
        .await?;
    info!(
        "Admin {} updated user {}: role {:?}, max invitations {}",
        session.user_id, user.id, user.role, user.max_invitations
    );

    Ok(Json(AdminUserView {
        user: UserSummary::from(&user),
        max_invitations: user.max_invitations,
        used_invitations: user.used_invitations,
    }))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct GrantTicketsRequest {
    pub ticket_type: TicketType,
    #[validate(range(min = 1, max = 10_000))]
    pub quantity: i64,
}

pub async fn grant_user_tickets(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<GrantTicketsRequest>,
) -> Result<Json<UserTicket>> {
    if state.store.get_user(&id).await?.is_none() {
        return Err(Error::NotFound);
    }
    info!("Admin {} grants tickets to {id}", session.user_id);
    let ticket = tickets::grant(
        state.store.as_ref(),
        &id,
        input.ticket_type,
        input.quantity,
    )
    .await?;
    Ok(Json(ticket))
}

pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<DeletionReport>> {
    info!("Admin {} deletes account {id}", session.user_id);
    let report = account::delete_account(state.store.as_ref(), state.files.as_ref(), &id).await?;
    Ok(Json(report))
}
