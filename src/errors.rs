use std::collections::BTreeMap;

use argon2::password_hash::Error as ArError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::Error as JWError;
use serde_json::json;
use surrealdb::Error as SError;

use thiserror::Error;
use tracing::error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Argon 2 Error: {0}")]
    Argon2Error(#[from] ArError),

    #[error("Jason web token Error: {0}")]
    JwTError(#[from] JWError),

    #[error("SurrealDb Error: {0}")]
    SurrealError(#[from] SError),

    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Axum Error: {0}")]
    AxumError(#[from] axum::Error),

    #[error("Http client Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Serialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Validator Error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Form Rejection Error: {0}")]
    AxumJsonRejection(#[from] axum::extract::rejection::JsonRejection),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid fields")]
    InvalidFields(BTreeMap<String, Vec<String>>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Store Error: {0}")]
    Store(String),

    #[error("Payment provider Error: {0}")]
    Payment(String),

    #[error("Invalid login detail")]
    InvalidLoginDetails,

    #[error("User with email `{0}` already exists!")]
    EmailExist(String),

    #[error("Not Found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invitation quota exceeded")]
    QuotaExceeded,

    #[error("Insufficient tickets")]
    InsufficientTickets,

    #[error("Invitation code already used")]
    InvitationAlreadyUsed,

    #[error("Invitation code expired")]
    InvitationExpired,

    #[error("Share url already taken")]
    ShareUrlTaken,

    #[error("File exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Payments are not configured")]
    PaymentsUnavailable,

    #[error("Internal Error")]
    InternalServerError,

    // ! Auth
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid authorization token")]
    InvalidToken,
    #[error("Invalid authorization scheme")]
    InvalidScheme,
    #[error("Token expired")]
    TokenExpired,
}

fn internal(kind: &str, error: &dyn std::fmt::Debug) -> (StatusCode, String) {
    error!("{kind} Error:{:#?}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Error".to_string(),
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Argon2Error(error) => internal("Argon 2", &error),
            Error::JwTError(error) => internal("JWT", &error),
            Error::SurrealError(error) => internal("Surreal", &error),
            Error::IoError(error) => internal("Io", &error),
            Error::AxumError(error) => internal("Axum", &error),
            Error::ReqwestError(error) => internal("Reqwest", &error),
            Error::SerdeError(error) => internal("Serde", &error),
            Error::Config(error) => internal("Config", &error),
            Error::Store(error) => internal("Store", &error),
            Error::Payment(error) => internal("Payment", &error),
            Error::InternalServerError => internal("Internal", &"unspecified"),
            Error::ValidationError(error) => {
                let errors: BTreeMap<String, Vec<String>> = error
                    .field_errors()
                    .into_iter()
                    .map(|(field, errors)| {
                        let messages = errors
                            .iter()
                            .map(|e| match &e.message {
                                Some(message) => message.to_string(),
                                None => e.code.to_string(),
                            })
                            .collect();
                        (field.to_string(), messages)
                    })
                    .collect();
                return field_error_response("Input validation error", errors);
            }
            Error::InvalidFields(errors) => {
                return field_error_response("Input validation error", errors);
            }
            Error::AxumJsonRejection(error) => {
                error!("Axum Json Rejection Error:{:#?}", error);
                (StatusCode::BAD_REQUEST, error.body_text())
            }
            Error::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Error::InvalidLoginDetails => {
                error!("Invalid login details");
                (StatusCode::BAD_REQUEST, "Invalid Login Details".to_string())
            }
            Error::EmailExist(email) => (
                StatusCode::BAD_REQUEST,
                format!("User with email {} already exists!", email),
            ),
            Error::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            Error::QuotaExceeded => (
                StatusCode::BAD_REQUEST,
                "Invitation quota exceeded".to_string(),
            ),
            Error::InsufficientTickets => (
                StatusCode::BAD_REQUEST,
                "Insufficient tickets".to_string(),
            ),
            Error::InvitationAlreadyUsed => (
                StatusCode::BAD_REQUEST,
                "Invitation code already used".to_string(),
            ),
            Error::InvitationExpired => (
                StatusCode::BAD_REQUEST,
                "Invitation code expired".to_string(),
            ),
            Error::ShareUrlTaken => internal("Share url", &"collision retries exhausted"),
            Error::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File exceeds {} bytes", limit),
            ),
            Error::PaymentsUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Payments are not configured".to_string(),
            ),
            Error::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Missing authorization token".to_string(),
            ),
            Error::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid authorization token".to_string(),
            ),
            Error::InvalidScheme => (
                StatusCode::UNAUTHORIZED,
                "Invalid authorization scheme".to_string(),
            ),
            Error::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired".to_string()),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn field_error_response(message: &str, errors: BTreeMap<String, Vec<String>>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": message, "errors": errors })),
    )
        .into_response()
}
