use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ticket::{AddonKind, TicketType};

/// What a completed payment entitles the buyer to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Product {
    Tickets {
        ticket_type: TicketType,
        quantity: i64,
    },
    Addon {
        kind: AddonKind,
        quantity: i64,
    },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    pub product: Product,
    pub price_cents: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub product: Product,
    pub amount_cents: i64,
    pub discount_code: Option<String>,
    pub provider_session_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
