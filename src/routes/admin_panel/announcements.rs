use axum::{Json, extract::State, http::StatusCode};

use crate::{
    errors::Result,
    middleware::Session,
    models::announcement::Announcement,
    services::announcements,
    state::AppState,
    utils::{validated_form::ValidatedJson, validator::validate_not_blank},
};

pub async fn list_announcements(
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>> {
    Ok(Json(state.store.list_announcements().await?))
}

#[derive(serde::Deserialize, Debug, Clone, validator::Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000), custom(function = "validate_not_blank"))]
    pub body: String,
    /// Everyone when absent.
    pub user_ids: Option<Vec<String>>,
}

pub async fn create_announcement(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(input): ValidatedJson<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>)> {
    let announcement = announcements::publish(
        state.store.as_ref(),
        &session.user_id,
        input.title.trim().to_string(),
        input.body,
        input.user_ids,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}
