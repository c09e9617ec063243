use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use tracing::info;
use validator::ValidationError;

use crate::{
    errors::{Error, Result},
    middleware::Session,
    models::discount::DiscountLink,
    state::AppState,
    utils::{token::new_id, validated_form::ValidatedJson},
};

fn validate_code(code: &str) -> core::result::Result<(), ValidationError> {
    if code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("code_charset")
            .with_message("only letters, digits, '-' and '_'".into()))
    }
}

pub async fn list_discount_links(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscountLink>>> {
    Ok(Json(state.store.list_discount_links().await?))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 3, max = 32), custom(function = "validate_code"))]
    pub code: String,
    #[validate(range(min = 1, max = 100))]
    pub discount_percent: u8,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

fn check_window(from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> Result<()> {
    match until {
        Some(until) if until <= from => Err(Error::BadRequest(
            "valid_until must be after valid_from".to_string(),
        )),
        _ => Ok(()),
    }
}

pub async fn create_discount_link(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(input): ValidatedJson<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountLink>)> {
    let code = input.code.trim().to_uppercase();
    let now = Utc::now();
    let valid_from = input.valid_from.unwrap_or(now);
    check_window(valid_from, input.valid_until)?;

    let link = state
        .store
        .insert_discount_link(DiscountLink {
            id: new_id(),
            code,
            discount_percent: input.discount_percent,
            is_active: true,
            valid_from,
            valid_until: input.valid_until,
            created_by: session.user_id,
            created_at: now,
        })
        .await?;
    info!("Discount {} ({}%) created", link.code, link.discount_percent);
    Ok((StatusCode::CREATED, Json(link)))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateDiscountRequest {
    pub is_active: Option<bool>,
    pub valid_until: Option<DateTime<Utc>>,
}

pub async fn update_discount_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateDiscountRequest>,
) -> Result<Json<DiscountLink>> {
    let mut link = state
        .store
        .get_discount_link(&id)
        .await?
        .ok_or(Error::NotFound)?;
    if let Some(is_active) = input.is_active {
        link.is_active = is_active;
    }
    if let Some(until) = input.valid_until {
        check_window(link.valid_from, Some(until))?;
        link.valid_until = Some(until);
    }
    Ok(Json(state.store.update_discount_link(link).await?))
}
