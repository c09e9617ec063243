use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::consts::find_plan;
use crate::errors::{Error, Result};
use crate::models::{
    billing::{Payment, PaymentStatus},
    discount::DiscountLink,
};
use crate::providers::payments::{CheckoutRequest, PaymentProvider};
use crate::store::Store;
use crate::utils::{signature, token::new_id};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// The active discount link behind `code`, or 400.
pub async fn usable_discount(store: &dyn Store, code: &str) -> Result<DiscountLink> {
    let code = code.trim().to_uppercase();
    store
        .find_discount_link(&code)
        .await?
        .filter(|link| link.is_usable(Utc::now()))
        .ok_or_else(|| Error::BadRequest(format!("Discount code {code} is not valid")))
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub payment: Payment,
    pub url: String,
}

/// Records a PENDING payment for `plan_id` and opens a hosted checkout.
pub async fn checkout(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    config: &Config,
    user_id: &str,
    plan_id: &str,
    discount_code: Option<&str>,
) -> Result<CheckoutOutcome> {
    let plan = find_plan(plan_id)
        .ok_or_else(|| Error::BadRequest(format!("Unknown plan {plan_id}")))?;
    let discount = match discount_code.filter(|code| !code.trim().is_empty()) {
        Some(code) => Some(usable_discount(store, code).await?),
        None => None,
    };
    let amount_cents = discount
        .as_ref()
        .map_or(plan.price_cents, |link| link.apply(plan.price_cents));

    let mut user = store.get_user(user_id).await?.ok_or(Error::NotFound)?;
    let customer_id = provider.ensure_customer(&user).await?;
    if user.billing_customer_id.as_deref() != Some(customer_id.as_str()) {
        user = store
            .set_billing_customer(&user.id, &customer_id, Utc::now())
            .await?;
    }

    let payment_id = new_id();
    let session = provider
        .create_checkout_session(CheckoutRequest {
            customer_id: &customer_id,
            plan,
            amount_cents,
            reference: &payment_id,
            success_url: format!("{}/billing/success", config.public_base_url),
            cancel_url: format!("{}/billing/cancel", config.public_base_url),
        })
        .await?;

    let payment = store
        .insert_payment(Payment {
            id: payment_id,
            user_id: user.id,
            plan_id: plan.id.to_string(),
            product: plan.product,
            amount_cents,
            discount_code: discount.map(|link| link.code),
            provider_session_id: session.id,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        })
        .await?;
    info!(
        "Checkout {} opened for {user_id}: {} at {} cents",
        payment.id, payment.plan_id, payment.amount_cents
    );
    Ok(CheckoutOutcome {
        payment,
        url: session.url,
    })
}

pub async fn portal(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    config: &Config,
    user_id: &str,
) -> Result<String> {
    let user = store.get_user(user_id).await?.ok_or(Error::NotFound)?;
    let customer_id = user
        .billing_customer_id
        .ok_or_else(|| Error::BadRequest("No billing account yet".to_string()))?;
    provider
        .create_portal_session(&customer_id, &format!("{}/billing", config.public_base_url))
        .await
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    id: String,
}

/// Verifies and applies a provider event. Returns the payment completed by
/// this delivery; repeated deliveries complete nothing.
pub async fn handle_webhook(
    store: &dyn Store,
    config: &Config,
    signature_header: Option<&str>,
    payload: &[u8],
) -> Result<Option<Payment>> {
    let secret = config
        .stripe_webhook_secret
        .as_deref()
        .ok_or(Error::PaymentsUnavailable)?;
    let header = signature_header
        .ok_or_else(|| Error::BadRequest("Missing webhook signature".to_string()))?;
    signature::verify(header, payload, secret, Utc::now().timestamp())?;

    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| Error::BadRequest(format!("Malformed webhook event: {e}")))?;
    if event.kind != CHECKOUT_COMPLETED {
        info!("Ignoring webhook event {}", event.kind);
        return Ok(None);
    }

    let session_id = event.data.object.id;
    let completed = store.complete_payment(&session_id, Utc::now()).await?;
    match &completed {
        Some(payment) => info!(
            "Payment {} completed, {} granted to {}",
            payment.id, payment.plan_id, payment.user_id
        ),
        None => warn!("Checkout {session_id} unknown or already fulfilled"),
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::ticket::TicketType;
    use crate::providers::payments::FakePayments;
    use crate::services::{fixtures::seed_user, tickets};
    use crate::store::MemoryStore;

    fn completed_event(session_id: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "id": session_id } }
        }))
        .unwrap()
    }

    fn signed(payload: &[u8]) -> String {
        let now = Utc::now().timestamp();
        format!(
            "t={now},v1={}",
            signature::sign("whsec_test", now, payload).unwrap()
        )
    }

    async fn spring_discount(store: &MemoryStore) {
        store
            .insert_discount_link(DiscountLink {
                id: "d1".to_string(),
                code: "SPRING".to_string(),
                discount_percent: 20,
                is_active: true,
                valid_from: Utc::now() - chrono::Duration::days(1),
                valid_until: None,
                created_by: "admin".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn checkout_applies_discount_and_records_pending_payment() {
        let store = MemoryStore::new();
        let provider = FakePayments::default();
        seed_user(&store, "buyer").await;
        spring_discount(&store).await;

        let outcome = checkout(
            &store,
            &provider,
            &test_config(),
            "buyer",
            "basic-5",
            Some("spring"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.payment.amount_cents, 720);
        assert_eq!(outcome.payment.status, PaymentStatus::Pending);
        assert_eq!(outcome.payment.discount_code.as_deref(), Some("SPRING"));
        assert!(outcome.url.starts_with("https://checkout.test/"));

        let user = store.get_user("buyer").await.unwrap().unwrap();
        assert_eq!(user.billing_customer_id.as_deref(), Some("cus_buyer"));
    }

    #[tokio::test]
    async fn checkout_rejects_unknown_plan_and_bad_code() {
        let store = MemoryStore::new();
        let provider = FakePayments::default();
        seed_user(&store, "buyer").await;
        let config = test_config();

        assert!(matches!(
            checkout(&store, &provider, &config, "buyer", "gold", None).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            checkout(&store, &provider, &config, "buyer", "basic-5", Some("NOPE")).await,
            Err(Error::BadRequest(_))
        ));
        assert!(provider.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_fulfils_once() {
        let store = MemoryStore::new();
        let provider = FakePayments::default();
        let config = test_config();
        seed_user(&store, "buyer").await;
        let outcome = checkout(&store, &provider, &config, "buyer", "basic-5", None)
            .await
            .unwrap();

        let payload = completed_event(&outcome.payment.provider_session_id);
        let header = signed(&payload);
        let first = handle_webhook(&store, &config, Some(&header), &payload)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, PaymentStatus::Completed);

        let again = handle_webhook(&store, &config, Some(&header), &payload)
            .await
            .unwrap();
        assert!(again.is_none());

        let basic = tickets::list(&store, "buyer")
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.ticket_type == TicketType::Basic)
            .unwrap();
        assert_eq!(basic.remaining_tickets, 5);
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signatures() {
        let store = MemoryStore::new();
        let config = test_config();
        let payload = completed_event("cs_x");

        assert!(matches!(
            handle_webhook(&store, &config, None, &payload).await,
            Err(Error::BadRequest(_))
        ));
        let forged = format!("t={},v1=00", Utc::now().timestamp());
        assert!(matches!(
            handle_webhook(&store, &config, Some(&forged), &payload).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let store = MemoryStore::new();
        let payload = br#"{"type":"invoice.paid","data":{"object":{"id":"in_1"}}}"#;
        let header = signed(payload);
        let result = handle_webhook(&store, &test_config(), Some(&header), payload)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
