use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};

use crate::{
    errors::Result,
    middleware::{Session, auth_jwt_middleware},
    models::announcement::DeliveredAnnouncement,
    routes::MessageResponse,
    services::announcements,
    state::AppState,
};

pub fn announcement_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(inbox))
        .route("/{id}/read", post(mark_read).delete(hide))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ))
        .with_state(config)
}

pub async fn inbox(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<DeliveredAnnouncement>>> {
    Ok(Json(
        announcements::inbox(state.store.as_ref(), &session.user_id).await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    announcements::read(state.store.as_ref(), &id, &session.user_id).await?;
    Ok(Json(MessageResponse::new("Announcement marked as read")))
}

pub async fn hide(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    announcements::hide(state.store.as_ref(), &id, &session.user_id).await?;
    Ok(Json(MessageResponse::new("Announcement hidden")))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn delivery_moves_from_sent_to_read_to_hidden() {
        let app = TestApp::new();
        let (_, reader) = app.user("reader@example.com").await;
        let (_, admin) = app.admin().await;

        let (status, announcement) = app
            .send(
                Method::POST,
                "/admin/announcements",
                Some(&admin),
                Some(json!({ "title": "Maintenance", "body": "Sunday 02:00 UTC" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(announcement["total_sent"], json!(2));
        let id = announcement["id"].as_str().unwrap();
        let read = format!("/announcements/{id}/read");

        let (_, inbox) = app.send(Method::GET, "/announcements", Some(&reader), None).await;
        assert_eq!(inbox[0]["status"], json!("SENT"));

        let (status, _) = app.send(Method::POST, &read, Some(&reader), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.send(Method::POST, &read, Some(&reader), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, listed) = app
            .send(Method::GET, "/admin/announcements", Some(&admin), None)
            .await;
        assert_eq!(listed[0]["total_read"], json!(1));

        let (status, _) = app.send(Method::DELETE, &read, Some(&reader), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.send(Method::DELETE, &read, Some(&reader), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, inbox) = app.send(Method::GET, "/announcements", Some(&reader), None).await;
        assert!(inbox.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn targeted_announcements_reach_only_their_recipients() {
        let app = TestApp::new();
        let (chosen_id, chosen) = app.user("chosen@example.com").await;
        let (_, other) = app.user("other@example.com").await;
        let (_, admin) = app.admin().await;

        let (status, _) = app
            .send(
                Method::POST,
                "/admin/announcements",
                Some(&admin),
                Some(json!({ "title": "Hi", "body": "Just you", "user_ids": ["ghost"] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, announcement) = app
            .send(
                Method::POST,
                "/admin/announcements",
                Some(&admin),
                Some(json!({ "title": "Hi", "body": "Just you", "user_ids": [chosen_id] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(announcement["total_sent"], json!(1));

        let (_, inbox) = app.send(Method::GET, "/announcements", Some(&chosen), None).await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        let (_, inbox) = app.send(Method::GET, "/announcements", Some(&other), None).await;
        assert!(inbox.as_array().unwrap().is_empty());
    }
}
