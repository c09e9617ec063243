use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String, // ! unique & lower-cased
    pub name: String,
    pub password_hash: String,
    pub role: Role,

    // ? invitation quota
    pub max_invitations: u32,
    pub used_invitations: u32,

    pub avatar_file: Option<String>,
    pub billing_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn remaining_invitations(&self) -> u32 {
        self.max_invitations.saturating_sub(self.used_invitations)
    }
}

/// Public projection of a [`User`]; never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub has_avatar: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            has_avatar: user.avatar_file.is_some(),
            created_at: user.created_at,
        }
    }
}
