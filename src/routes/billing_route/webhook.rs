use axum::{Json, body::Bytes, extract::State, http::HeaderMap};

use crate::{errors::Result, routes::MessageResponse, services::billing, state::AppState};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Provider callback. Signed, not session-authenticated.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let completed =
        billing::handle_webhook(state.store.as_ref(), &state.config, signature, &body).await?;

    Ok(Json(MessageResponse::new(match completed {
        Some(_) => "Payment fulfilled",
        None => "Event acknowledged",
    })))
}
