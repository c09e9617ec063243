use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::models::{billing::Plan, user::User};

const STRIPE_API: &str = "https://api.stripe.com/v1";

pub struct CheckoutRequest<'a> {
    pub customer_id: &'a str,
    pub plan: &'a Plan,
    pub amount_cents: i64,
    /// Our payment id, echoed back by the provider on completion.
    pub reference: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Hosted checkout provider. Only the calls the billing routes make.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Returns the user's customer id at the provider, creating one when absent.
    async fn ensure_customer(&self, user: &User) -> Result<String>;
    async fn create_checkout_session(&self, request: CheckoutRequest<'_>)
    -> Result<CheckoutSession>;
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            secret_key,
            base_url: STRIPE_API.to_string(),
        }
    }

    async fn post(&self, path: &str, form: &[(String, String)]) -> Result<StripeObject> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Stripe {path} failed with {status}: {body}");
            return Err(Error::Payment(format!("{path} returned {status}")));
        }
        Ok(response.json::<StripeObject>().await?)
    }
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn ensure_customer(&self, user: &User) -> Result<String> {
        if let Some(customer_id) = &user.billing_customer_id {
            return Ok(customer_id.clone());
        }
        let customer = self
            .post(
                "/customers",
                &[
                    field("email", &user.email),
                    field("name", &user.name),
                    field("metadata[user_id]", &user.id),
                ],
            )
            .await?;
        info!("Created billing customer for user {}", user.id);
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        let session = self
            .post(
                "/checkout/sessions",
                &[
                    field("mode", "payment"),
                    field("customer", request.customer_id),
                    field("client_reference_id", request.reference),
                    field("success_url", request.success_url),
                    field("cancel_url", request.cancel_url),
                    field("line_items[0][quantity]", 1),
                    field("line_items[0][price_data][currency]", "usd"),
                    field("line_items[0][price_data][unit_amount]", request.amount_cents),
                    field("line_items[0][price_data][product_data][name]", request.plan.name),
                    field("metadata[plan_id]", request.plan.id),
                ],
            )
            .await?;
        let url = session
            .url
            .ok_or_else(|| Error::Payment("checkout session without url".to_string()))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        self.post(
            "/billing_portal/sessions",
            &[field("customer", customer_id), field("return_url", return_url)],
        )
        .await?
        .url
        .ok_or_else(|| Error::Payment("portal session without url".to_string()))
    }
}

/// Records checkout sessions instead of calling out.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakePayments {
    pub sessions: std::sync::Mutex<Vec<(String, i64)>>,
}

#[cfg(test)]
#[async_trait]
impl PaymentProvider for FakePayments {
    async fn ensure_customer(&self, user: &User) -> Result<String> {
        Ok(user
            .billing_customer_id
            .clone()
            .unwrap_or_else(|| format!("cus_{}", user.id)))
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        let id = format!("cs_{}", request.reference);
        self.sessions
            .lock()
            .unwrap()
            .push((id.clone(), request.amount_cents));
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{id}"),
            id,
        })
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<String> {
        Ok(format!("https://portal.test/{customer_id}"))
    }
}
