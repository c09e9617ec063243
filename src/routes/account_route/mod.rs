use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get},
};

use crate::{
    consts::MAX_UPLOAD_BYTES,
    middleware::auth_jwt_middleware,
    routes::account_route::{
        avatar::{delete_avatar, read_avatar, upload_avatar},
        profile::{delete_account, list_addons, list_tickets, me},
    },
    state::AppState,
};

pub mod avatar;
pub mod profile;

pub fn account_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/tickets", get(list_tickets))
        .route("/addons", get(list_addons))
        .route(
            "/avatar",
            get(read_avatar)
                .put(upload_avatar)
                .delete(delete_avatar)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/delete-account", delete(delete_account))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ))
        .with_state(config)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::json;

    use crate::{
        consts::MAX_UPLOAD_BYTES,
        models::account::DeletionStep,
        routes::test_support::{TestApp, json_of},
        store::{MemoryStore, Store},
    };

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn upload(token: &str, content_type: &str, bytes: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::PUT)
            .uri("/user/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .unwrap()
    }

    #[tokio::test]
    async fn avatar_upload_replaces_and_serves_the_file() {
        let app = TestApp::new();
        let (_, token) = app.user("ada@example.com").await;

        let (status, body) = json_of(app.raw(upload(&token, "image/png", PNG.to_vec())).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_avatar"], json!(true));
        let first = app
            .store
            .find_user_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap()
            .avatar_file
            .unwrap();
        assert!(first.ends_with(".png"));

        app.raw(upload(&token, "image/png", PNG.to_vec())).await;
        assert!(!app.files.contains(&first).await);

        let response = app
            .raw(
                Request::builder()
                    .uri("/user/avatar")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let (status, _) = app
            .send(Method::DELETE, "/user/avatar", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(Method::DELETE, "/user/avatar", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn avatar_upload_checks_type_content_and_size() {
        let app = TestApp::new();
        let (_, token) = app.user("ada@example.com").await;

        let response = app.raw(upload(&token, "image/gif", b"GIF89a".to_vec())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = app.raw(upload(&token, "image/jpeg", PNG.to_vec())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut oversized = PNG.to_vec();
        oversized.resize(MAX_UPLOAD_BYTES + 1, 0);
        let (status, body) = json_of(app.raw(upload(&token, "image/png", oversized)).await).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn delete_account_removes_everything_the_user_owns() {
        let app = TestApp::new();
        let (_, token) = app.user("leaving@example.com").await;
        app.raw(upload(&token, "image/png", PNG.to_vec())).await;
        let avatar = app
            .store
            .find_user_by_email("leaving@example.com")
            .await
            .unwrap()
            .unwrap()
            .avatar_file
            .unwrap();
        app.send(
            Method::POST,
            "/surveys",
            Some(&token),
            Some(json!({ "title": "Soon gone" })),
        )
        .await;

        let (status, body) = app
            .send(Method::DELETE, "/user/delete-account", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["deleted"]["surveys"], json!(1));
        assert_eq!(body["report"]["deleted"]["user"], json!(1));
        assert!(!app.files.contains(&avatar).await);

        let (status, _) = app.send(Method::GET, "/user/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn deleted_account_token_cannot_create_surveys() {
        let app = TestApp::new();
        let (user_id, token) = app.user("gone@example.com").await;
        app.send(Method::DELETE, "/user/delete-account", Some(&token), None)
            .await;

        let (status, body) = app
            .send(
                Method::POST,
                "/surveys",
                Some(&token),
                Some(json!({ "title": "Orphan" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].is_string());
        assert!(app.store.list_owned_surveys(&user_id).await.unwrap().is_empty());
        assert!(app.store.list_tickets(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_deletion_keeps_the_account() {
        let app = TestApp::with_store(MemoryStore::failing_deletion_at(DeletionStep::Tickets));
        let (_, token) = app.user("staying@example.com").await;

        let (status, _) = app
            .send(Method::DELETE, "/user/delete-account", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _) = app.send(Method::GET, "/user/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
