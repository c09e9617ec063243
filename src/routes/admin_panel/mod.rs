use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::{
    middleware::{auth_jwt_middleware, require_admin},
    routes::admin_panel::{
        announcements::{create_announcement, list_announcements},
        discounts::{create_discount_link, list_discount_links, update_discount_link},
        users::{delete_user, grant_user_tickets, list_users, update_user},
    },
    state::AppState,
};

pub mod announcements;
pub mod discounts;
pub mod users;

// ! the last layer runs first: authenticate, then check the role
pub fn admin_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", patch(update_user).delete(delete_user))
        .route("/users/{id}/tickets", post(grant_user_tickets))
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/discount-links",
            get(list_discount_links).post(create_discount_link),
        )
        .route("/discount-links/{id}", patch(update_discount_link))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ))
        .with_state(config)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn admin_routes_check_session_then_role() {
        let app = TestApp::new();
        let (_, user) = app.user("ada@example.com").await;
        let (_, admin) = app.admin().await;

        let (status, _) = app.send(Method::GET, "/admin/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.send(Method::GET, "/admin/users", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, users) = app.send(Method::GET, "/admin/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn role_changes_apply_to_live_tokens() {
        let app = TestApp::new();
        let (user_id, user) = app.user("ada@example.com").await;
        let (_, admin) = app.admin().await;
        let path = format!("/admin/users/{user_id}");

        app.send(Method::PATCH, &path, Some(&admin), Some(json!({ "role": "ADMIN" })))
            .await;
        let (status, _) = app.send(Method::GET, "/admin/users", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);

        app.send(Method::PATCH, &path, Some(&admin), Some(json!({ "role": "USER" })))
            .await;
        let (status, _) = app.send(Method::GET, "/admin/users", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invitation_limit_cannot_drop_below_usage() {
        let app = TestApp::new();
        let (user_id, user) = app.user("ada@example.com").await;
        let (_, admin) = app.admin().await;
        app.send(Method::POST, "/invitations/create", Some(&user), Some(json!({})))
            .await;

        let path = format!("/admin/users/{user_id}");
        let (status, _) = app
            .send(
                Method::PATCH,
                &path,
                Some(&admin),
                Some(json!({ "max_invitations": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                Method::PATCH,
                &path,
                Some(&admin),
                Some(json!({ "max_invitations": 10, "role": "ADMIN" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["max_invitations"], json!(10));
        assert_eq!(body["role"], json!("ADMIN"));

        let (status, _) = app
            .send(
                Method::POST,
                "/admin/users/nobody/tickets",
                Some(&admin),
                Some(json!({ "ticket_type": "PREMIUM", "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn discount_links_are_managed_and_validated() {
        let app = TestApp::new();
        let (_, admin) = app.admin().await;

        let (status, link) = app
            .send(
                Method::POST,
                "/admin/discount-links",
                Some(&admin),
                Some(json!({ "code": "spring", "discount_percent": 20 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(link["code"], json!("SPRING"));

        let (status, _) = app
            .send(
                Method::POST,
                "/admin/discount-links",
                Some(&admin),
                Some(json!({ "code": "autumn", "discount_percent": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                Method::POST,
                "/discount-links/validate",
                None,
                Some(json!({ "code": "spring" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "code": "SPRING", "discount_percent": 20 }));

        let id = link["id"].as_str().unwrap();
        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/admin/discount-links/{id}"),
                Some(&admin),
                Some(json!({ "is_active": false })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(
                Method::POST,
                "/discount-links/validate",
                None,
                Some(json!({ "code": "SPRING" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
