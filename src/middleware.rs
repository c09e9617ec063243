use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::{Error, Result as RResult};
use crate::models::user::Role;
use crate::state::AppState;
use crate::utils::{cookie::session_token, jwt::decode_jwt};

/// The authenticated caller, put in request extensions by [`auth_jwt_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub async fn auth_jwt_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, Response> {
    let (mut parts, body) = request.into_parts();
    let session = check_auth_parts(&parts, &state)
        .await
        .map_err(IntoResponse::into_response)?;

    parts.extensions.insert(session);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Runs after [`auth_jwt_middleware`]; the role in the session decides.
pub async fn require_admin(request: Request, next: Next) -> Result<impl IntoResponse, Response> {
    match request.extensions().get::<Session>() {
        Some(session) if session.is_admin() => Ok(next.run(request).await),
        Some(session) => {
            tracing::warn!("User {} denied admin access", session.user_id);
            Err(Error::Forbidden.into_response())
        }
        None => Err(Error::MissingToken.into_response()),
    }
}

/// Decodes the token, then loads the account so a deleted user or a changed
/// role takes effect before the token expires.
async fn check_auth_parts(parts: &Parts, state: &AppState) -> RResult<Session> {
    let token = match parts.headers.get(AUTHORIZATION) {
        Some(header_value) => {
            let header_value = header_value.to_str().map_err(|_| Error::InvalidToken)?;
            let mut parts = header_value.trim().splitn(2, ' ');

            let scheme = parts.next().ok_or(Error::MissingToken)?;
            let token = parts.next().ok_or(Error::MissingToken)?;

            if scheme != "Bearer" {
                tracing::warn!("Invalid auth scheme: {scheme}");
                return Err(Error::InvalidScheme);
            }
            token.trim().to_string()
        }
        None => session_token(&parts.headers).ok_or(Error::MissingToken)?,
    };

    let claims = decode_jwt(&token, &state.config.jwt_secret)?.claims;
    let user = state.store.get_user(&claims.id).await?.ok_or_else(|| {
        tracing::warn!("Token for missing account {}", claims.id);
        Error::InvalidToken
    })?;

    Ok(Session {
        user_id: user.id,
        email: user.email,
        role: user.role,
    })
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> RResult<Self> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(Error::MissingToken)
    }
}
