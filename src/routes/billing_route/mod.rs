use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    middleware::auth_jwt_middleware,
    routes::billing_route::{
        checkout::{create_checkout, create_portal, list_plans, validate_discount},
        webhook::receive_webhook,
    },
    state::AppState,
};

pub mod checkout;
pub mod webhook;

pub fn billing_router(config: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/plans", get(list_plans))
        .route("/webhook", post(receive_webhook))
        .with_state(config)
}

pub fn discount_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_discount))
        .with_state(config)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use chrono::Utc;
    use serde_json::json;

    use crate::{
        routes::{
            billing_route::webhook::SIGNATURE_HEADER,
            test_support::{TestApp, json_of},
        },
        services::billing::CHECKOUT_COMPLETED,
        utils::signature,
    };

    fn webhook(payload: Vec<u8>, signature: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/billing/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(payload))
            .unwrap()
    }

    #[tokio::test]
    async fn checkout_then_webhook_grants_the_plan() {
        let app = TestApp::new();
        let (_, token) = app.user("buyer@example.com").await;

        let (status, plans) = app.send(Method::GET, "/billing/plans", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(plans.as_array().unwrap().iter().any(|p| p["id"] == json!("basic-5")));

        let (status, checkout) = app
            .send(
                Method::POST,
                "/billing/checkout",
                Some(&token),
                Some(json!({ "plan_id": "basic-5" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let payment_id = checkout["payment_id"].as_str().unwrap();
        assert_eq!(
            checkout["url"],
            json!(format!("https://checkout.test/cs_{payment_id}"))
        );

        let payload = serde_json::to_vec(&json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "id": format!("cs_{payment_id}") } }
        }))
        .unwrap();
        let now = Utc::now().timestamp();
        let header = format!(
            "t={now},v1={}",
            signature::sign("whsec_test", now, &payload).unwrap()
        );

        let (status, _) = json_of(app.raw(webhook(payload.clone(), &header)).await).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = json_of(app.raw(webhook(payload.clone(), &header)).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Event acknowledged"));

        let (_, tickets) = app.send(Method::GET, "/user/tickets", Some(&token), None).await;
        let basic = tickets
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["ticket_type"] == json!("BASIC"))
            .unwrap();
        assert_eq!(basic["remaining_tickets"], json!(5));

        let (status, _) = json_of(app.raw(webhook(payload, &format!("t={now},v1=00"))).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_with_out_of_range_timestamp_is_rejected() {
        let app = TestApp::new();
        let payload = b"{}".to_vec();
        let header = format!(
            "t={},v1={}",
            i64::MIN,
            signature::sign("whsec_test", i64::MIN, &payload).unwrap()
        );

        let (status, body) = json_of(app.raw(webhook(payload, &header)).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid webhook signature"));
    }

    #[tokio::test]
    async fn portal_needs_a_billing_account() {
        let app = TestApp::new();
        let (_, token) = app.user("buyer@example.com").await;

        let (status, _) = app.send(Method::POST, "/billing/portal", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        app.send(
            Method::POST,
            "/billing/checkout",
            Some(&token),
            Some(json!({ "plan_id": "storage-5gb" })),
        )
        .await;
        let (status, body) = app.send(Method::POST, "/billing/portal", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["url"].as_str().unwrap().starts_with("https://portal.test/"));
    }
}
