use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{
    app,
    providers::{files::MemoryFileStorage, payments::FakePayments},
    state::AppState,
    store::MemoryStore,
};

pub const PASSWORD: &str = "Sup3rSecret";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// The full router over in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub files: Arc<MemoryFileStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let files = Arc::new(MemoryFileStorage::default());
        let mut state = AppState::for_tests(
            store.clone(),
            files.clone(),
            Some(Arc::new(FakePayments::default())),
        );
        Arc::make_mut(&mut state.config).admin_bootstrap_email = Some(ADMIN_EMAIL.to_string());

        Self {
            router: app(state.clone()),
            state,
            store,
            files,
        }
    }

    pub async fn raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        json_of(self.raw(request).await).await
    }

    pub async fn sign_up(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": email, "name": "Test User", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn sign_in(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Signs up and in; returns `(user_id, token)`.
    pub async fn user(&self, email: &str) -> (String, String) {
        let id = self.sign_up(email).await;
        (id, self.sign_in(email).await)
    }

    pub async fn admin(&self) -> (String, String) {
        self.user(ADMIN_EMAIL).await
    }
}

pub async fn json_of(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
