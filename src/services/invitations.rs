use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::consts::INVITATION_TTL_DAYS;
use crate::errors::{Error, Result};
use crate::models::invitation::{Invitation, InvitationQuota, InvitationSummary, InviterSummary};
use crate::store::Store;
use crate::utils::token::{invitation_code, new_id};

#[derive(Debug, Clone, Default)]
pub struct NewInvitation {
    pub invited_email: Option<String>,
    pub invited_name: Option<String>,
    pub message: Option<String>,
}

/// Issues a code against the inviter's quota. The quota check, the usage
/// bump and the insert happen in one store operation.
pub async fn create(store: &dyn Store, inviter_id: &str, input: NewInvitation) -> Result<Invitation> {
    let now = Utc::now();
    let invitation = Invitation {
        id: new_id(),
        code: invitation_code(),
        inviter_id: inviter_id.to_string(),
        invited_email: input.invited_email.map(|email| email.trim().to_lowercase()),
        invited_name: input.invited_name,
        message: input.message,
        expires_at: now + Duration::days(INVITATION_TTL_DAYS),
        is_used: false,
        used_by: None,
        used_at: None,
        created_at: now,
    };
    let invitation = store.create_invitation(invitation).await?;
    info!("User {inviter_id} issued invitation {}", invitation.id);
    Ok(invitation)
}

fn check_redeemable(invitation: &Invitation, now: DateTime<Utc>) -> Result<()> {
    if invitation.is_used {
        return Err(Error::InvitationAlreadyUsed);
    }
    if invitation.is_expired(now) {
        return Err(Error::InvitationExpired);
    }
    Ok(())
}

async fn find_redeemable(store: &dyn Store, code: &str) -> Result<Invitation> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::BadRequest("Invitation code is required".to_string()));
    }
    let invitation = store.find_invitation(code).await?.ok_or(Error::NotFound)?;
    check_redeemable(&invitation, Utc::now())?;
    Ok(invitation)
}

/// Read-only check of a code, as shown on the signup page.
pub async fn validate(store: &dyn Store, code: &str) -> Result<InvitationSummary> {
    let invitation = find_redeemable(store, code).await?;
    let inviter = store
        .get_user(&invitation.inviter_id)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(InvitationSummary {
        code: invitation.code,
        inviter: InviterSummary {
            name: inviter.name,
            email: inviter.email,
        },
        invited_email: invitation.invited_email,
        invited_name: invitation.invited_name,
        message: invitation.message,
        expires_at: invitation.expires_at,
    })
}

/// Marks the code used by `user_id`. Only one redemption ever succeeds.
pub async fn redeem(store: &dyn Store, code: &str, user_id: &str) -> Result<()> {
    let invitation = find_redeemable(store, code).await?;
    if !store
        .mark_invitation_used(&invitation.code, user_id, Utc::now())
        .await?
    {
        warn!("Invitation {} redeemed concurrently", invitation.id);
        return Err(Error::InvitationAlreadyUsed);
    }
    info!("Invitation {} redeemed by {user_id}", invitation.id);
    Ok(())
}

pub async fn quota(store: &dyn Store, user_id: &str) -> Result<InvitationQuota> {
    let user = store.get_user(user_id).await?.ok_or(Error::NotFound)?;
    Ok(InvitationQuota {
        max: user.max_invitations,
        used: user.used_invitations,
        remaining: user.remaining_invitations(),
    })
}
