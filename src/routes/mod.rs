use serde::Serialize;

pub mod account_route;
pub mod admin_panel;
pub mod announcement_route;
pub mod auth_route;
pub mod billing_route;
pub mod survey_route;

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;
