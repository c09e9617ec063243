use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    consts::{ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES},
    errors::{Error, Result},
    middleware::Session,
    models::user::UserSummary,
    routes::MessageResponse,
    state::AppState,
};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// File extension for an accepted upload, after checking the declared type
/// against the leading bytes.
fn image_extension(content_type: &str, bytes: &[u8]) -> Result<&'static str> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(Error::BadRequest(format!(
            "Unsupported image type, expected one of {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }
    let (magic, extension) = match content_type {
        "image/png" => (PNG_MAGIC, "png"),
        _ => (JPEG_MAGIC, "jpg"),
    };
    if !bytes.starts_with(magic) {
        return Err(Error::BadRequest(
            "File content does not match its declared type".to_string(),
        ));
    }
    Ok(extension)
}

fn content_type_for(file: &str) -> &'static str {
    if file.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<UserSummary>> {
    // ! the body limit layer rejects before the handler sees the bytes
    let body = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => Error::PayloadTooLarge(MAX_UPLOAD_BYTES),
        _ => Error::BadRequest(rejection.body_text()),
    })?;
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(Error::PayloadTooLarge(MAX_UPLOAD_BYTES));
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_lowercase())
        .unwrap_or_default();
    let extension = image_extension(&content_type, &body)?;

    let file = format!("{}.{extension}", uuid::Uuid::new_v4());
    state.files.store(&file, body.to_vec()).await?;

    let (user, previous) = match state
        .store
        .set_avatar(&session.user_id, Some(file.clone()), Utc::now())
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            if let Err(cleanup) = state.files.delete(&file).await {
                warn!("Orphaned avatar {file} left behind: {cleanup}");
            }
            return Err(e);
        }
    };
    if let Some(previous) = previous {
        if let Err(e) = state.files.delete(&previous).await {
            warn!("Old avatar {previous} left behind: {e}");
        }
    }
    info!("User {} uploaded a new avatar", user.id);

    Ok(Json(UserSummary::from(&user)))
}

pub async fn read_avatar(
    State(state): State<AppState>,
    session: Session,
) -> Result<([(HeaderName, HeaderValue); 1], Vec<u8>)> {
    let user = state
        .store
        .get_user(&session.user_id)
        .await?
        .ok_or(Error::NotFound)?;
    let file = user.avatar_file.ok_or(Error::NotFound)?;
    let bytes = state.files.load(&file).await?.ok_or(Error::NotFound)?;

    Ok((
        [(CONTENT_TYPE, HeaderValue::from_static(content_type_for(&file)))],
        bytes,
    ))
}

pub async fn delete_avatar(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<MessageResponse>> {
    let (_, previous) = state
        .store
        .set_avatar(&session.user_id, None, Utc::now())
        .await?;
    let file = previous.ok_or(Error::NotFound)?;

    if let Err(e) = state.files.delete(&file).await {
        warn!("Avatar {file} left behind: {e}");
    }
    Ok(Json(MessageResponse::new("Avatar removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_declared_type_against_magic_bytes() {
        let png = [PNG_MAGIC, b"rest"].concat();
        let jpeg = [JPEG_MAGIC, b"rest"].concat();

        assert_eq!(image_extension("image/png", &png).unwrap(), "png");
        assert_eq!(image_extension("image/jpeg", &jpeg).unwrap(), "jpg");
        assert!(image_extension("image/jpeg", &png).is_err());
        assert!(image_extension("image/gif", b"GIF89a").is_err());
        assert!(image_extension("image/png", b"").is_err());
    }
}
