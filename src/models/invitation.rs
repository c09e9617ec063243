use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Invitation {
    pub id: String,
    pub code: String, // ! unique, 128 random bits hex encoded
    pub inviter_id: String,

    // ? hints for the invited party
    pub invited_email: Option<String>,
    pub invited_name: Option<String>,
    pub message: Option<String>,

    // ? Status & Timing
    pub expires_at: DateTime<Utc>, // ! (now + 7 days)
    pub is_used: bool,
    pub used_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct InviterSummary {
    pub name: String,
    pub email: String,
}

/// What an anonymous visitor learns from a valid code.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct InvitationSummary {
    pub code: String,
    pub inviter: InviterSummary,
    pub invited_email: Option<String>,
    pub invited_name: Option<String>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitationQuota {
    pub max: u32,
    pub used: u32,
    pub remaining: u32,
}
