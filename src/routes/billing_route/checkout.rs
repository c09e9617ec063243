use axum::{Json, extract::State};

use crate::{
    consts::PLANS,
    errors::Result,
    middleware::Session,
    models::billing::Plan,
    services::billing,
    state::AppState,
    utils::validated_form::ValidatedJson,
};

pub async fn list_plans() -> Json<&'static [Plan]> {
    Json(&PLANS)
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 64))]
    pub plan_id: String,
    #[validate(length(max = 32))]
    pub discount_code: Option<String>,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct CheckoutResponse {
    pub url: String,
    pub payment_id: String,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(input): ValidatedJson<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let outcome = billing::checkout(
        state.store.as_ref(),
        state.payments()?,
        &state.config,
        &session.user_id,
        &input.plan_id,
        input.discount_code.as_deref(),
    )
    .await?;
    Ok(Json(CheckoutResponse {
        url: outcome.url,
        payment_id: outcome.payment.id,
    }))
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct PortalResponse {
    pub url: String,
}

pub async fn create_portal(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PortalResponse>> {
    let url = billing::portal(
        state.store.as_ref(),
        state.payments()?,
        &state.config,
        &session.user_id,
    )
    .await?;
    Ok(Json(PortalResponse { url }))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct DiscountSummary {
    pub code: String,
    pub discount_percent: u8,
}

pub async fn validate_discount(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<ValidateDiscountRequest>,
) -> Result<Json<DiscountSummary>> {
    let link = billing::usable_discount(state.store.as_ref(), &input.code).await?;
    Ok(Json(DiscountSummary {
        code: link.code,
        discount_percent: link.discount_percent,
    }))
}
