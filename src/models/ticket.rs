use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::FREE_TICKET_ALLOTMENT;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Free,
    Basic,
    Premium,
}

impl TicketType {
    /// Order in which survey creation draws tickets.
    pub const CONSUMPTION_ORDER: [TicketType; 3] =
        [TicketType::Free, TicketType::Basic, TicketType::Premium];

    /// Tickets every user holds before any row exists.
    pub fn baseline(self) -> i64 {
        match self {
            TicketType::Free => FREE_TICKET_ALLOTMENT,
            _ => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketType::Free => "FREE",
            TicketType::Basic => "BASIC",
            TicketType::Premium => "PREMIUM",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserTicket {
    pub user_id: String,
    pub ticket_type: TicketType,
    pub total_tickets: i64,
    pub used_tickets: i64,
    pub remaining_tickets: i64,
    pub created_at: Option<DateTime<Utc>>, // ! None for the synthesized FREE row
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserTicket {
    pub fn baseline(user_id: &str, ticket_type: TicketType) -> Self {
        let allotment = ticket_type.baseline();
        Self {
            user_id: user_id.to_string(),
            ticket_type,
            total_tickets: allotment,
            used_tickets: 0,
            remaining_tickets: allotment,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total_tickets == self.used_tickets + self.remaining_tickets
            && self.remaining_tickets >= 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddonKind {
    Storage,   // ! GB
    Retention, // ! months
}

impl AddonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AddonKind::Storage => "STORAGE",
            AddonKind::Retention => "RETENTION",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserAddon {
    pub user_id: String,
    pub kind: AddonKind,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}
