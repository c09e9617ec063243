use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiscountLink {
    pub id: String,
    pub code: String, // ! unique & upper-cased
    pub discount_percent: u8,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl DiscountLink {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && self.valid_until.is_none_or(|until| now <= until)
    }

    pub fn apply(&self, amount_cents: i64) -> i64 {
        amount_cents - amount_cents * i64::from(self.discount_percent) / 100
    }
}
