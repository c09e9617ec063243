use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_by: String,
    pub total_sent: i64,
    pub total_read: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Read,
    Hidden,
}

impl DeliveryStatus {
    pub fn can_read(self) -> bool {
        self == DeliveryStatus::Sent
    }

    pub fn can_hide(self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Read)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Read => "READ",
            DeliveryStatus::Hidden => "HIDDEN",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnnouncementDelivery {
    pub announcement_id: String,
    pub user_id: String,
    pub status: DeliveryStatus,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub hidden_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeliveredAnnouncement {
    pub announcement: Announcement,
    pub status: DeliveryStatus,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
