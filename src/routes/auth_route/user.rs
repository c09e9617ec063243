use axum::{
    Json,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header::SET_COOKIE},
};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    errors::{Error, Result},
    models::user::{Role, User, UserSummary},
    routes::MessageResponse,
    services::invitations,
    state::AppState,
    utils::{
        cookie::{cleared_session_cookie, session_cookie},
        jwt::{Claims, encode_jwt},
        pwd::{hash, validate},
        token::new_id,
        validated_form::ValidatedJson,
        validator::{validate_not_blank, validate_password},
    },
};

#[derive(Debug, Clone, serde::Deserialize, validator::Validate)]
pub struct SignUpRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    pub invitation_code: Option<String>,
}

pub async fn sign_up(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<SignUpRequest>,
) -> Result<(StatusCode, Json<UserSummary>)> {
    let store = state.store.as_ref();
    let email = input.email.trim().to_lowercase();
    let invitation_code = input
        .invitation_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    // ! the code is checked before the account exists and redeemed after
    if let Some(code) = invitation_code {
        invitations::validate(store, code).await?;
    }
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(Error::EmailExist(email));
    }

    let role = if state.config.admin_bootstrap_email.as_deref() == Some(email.as_str()) {
        warn!("Bootstrapping {email} as ADMIN");
        Role::Admin
    } else {
        Role::User
    };
    let user = User {
        id: new_id(),
        email,
        name: input.name.trim().to_string(),
        password_hash: hash(input.password.as_bytes())?,
        role,
        max_invitations: state.config.default_max_invitations,
        used_invitations: 0,
        avatar_file: None,
        billing_customer_id: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    let user = store.insert_user(user).await?;
    info!("User {} signed up", user.id);

    if let Some(code) = invitation_code {
        if let Err(e) = invitations::redeem(store, code, &user.id).await {
            warn!("User {} signed up but invitation redemption failed: {e}", user.id);
        }
    }

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

#[derive(Debug, Clone, serde::Deserialize, validator::Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: UserSummary,
}

pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<SignInRequest>,
) -> Result<([(HeaderName, HeaderValue); 1], Json<SignInResponse>)> {
    let user = state
        .store
        .find_user_by_email(&input.email.trim().to_lowercase())
        .await?
        .ok_or(Error::InvalidLoginDetails)?;
    if !validate(input.password.as_bytes(), &user.password_hash)? {
        return Err(Error::InvalidLoginDetails);
    }

    let ttl = state.config.jwt_ttl_secs;
    let token = encode_jwt(
        &Claims::new(&user.id, &user.email, user.role, ttl),
        &state.config.jwt_secret,
    )?;
    let cookie = session_cookie(&token, ttl).ok_or(Error::InternalServerError)?;
    info!("User {} signed in", user.id);

    Ok((
        [(SET_COOKIE, cookie)],
        Json(SignInResponse {
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

pub async fn sign_out() -> ([(HeaderName, HeaderValue); 1], Json<MessageResponse>) {
    (
        [(SET_COOKIE, cleared_session_cookie())],
        Json(MessageResponse::new("Signed out")),
    )
}
