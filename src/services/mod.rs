//! Domain operations shared by the HTTP handlers. Everything here talks to
//! the [`Store`](crate::store::Store) seam only, so the tests drive it with
//! the in-memory backend.

pub mod account;
pub mod announcements;
pub mod billing;
pub mod invitations;
pub mod permission;
pub mod surveys;
pub mod tickets;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::models::user::{Role, User};
    use crate::store::Store;

    pub fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: format!("User {id}"),
            password_hash: "not-a-hash".to_string(),
            role: Role::User,
            max_invitations: 2,
            used_invitations: 0,
            avatar_file: None,
            billing_customer_id: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub async fn seed_user(store: &dyn Store, id: &str) -> User {
        store.insert_user(user(id)).await.unwrap()
    }
}
