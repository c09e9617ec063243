use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::errors::{Error, Result};
use crate::models::announcement::{Announcement, DeliveredAnnouncement};
use crate::store::Store;
use crate::utils::token::new_id;

/// Creates the announcement with one SENT delivery per recipient; every user
/// receives it when no recipients are named.
pub async fn publish(
    store: &dyn Store,
    author_id: &str,
    title: String,
    body: String,
    recipients: Option<Vec<String>>,
) -> Result<Announcement> {
    let recipients: Vec<String> = match recipients {
        Some(ids) => {
            let ids: BTreeSet<String> = ids.into_iter().collect();
            for id in &ids {
                if store.get_user(id).await?.is_none() {
                    return Err(Error::BadRequest(format!("Unknown recipient {id}")));
                }
            }
            ids.into_iter().collect()
        }
        None => store
            .list_users()
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect(),
    };

    let announcement = Announcement {
        id: new_id(),
        title,
        body,
        created_by: author_id.to_string(),
        total_sent: 0,
        total_read: 0,
        created_at: Utc::now(),
    };
    let announcement = store.publish_announcement(announcement, recipients).await?;
    info!(
        "Announcement {} sent to {} users",
        announcement.id, announcement.total_sent
    );
    Ok(announcement)
}

pub async fn inbox(store: &dyn Store, user_id: &str) -> Result<Vec<DeliveredAnnouncement>> {
    store.list_deliveries(user_id).await
}

/// SENT -> READ. Anything else (unknown, already read, hidden) is reported missing.
pub async fn read(store: &dyn Store, announcement_id: &str, user_id: &str) -> Result<()> {
    if store
        .mark_delivery_read(announcement_id, user_id, Utc::now())
        .await?
    {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}

/// SENT|READ -> HIDDEN. Hiding again is reported missing.
pub async fn hide(store: &dyn Store, announcement_id: &str, user_id: &str) -> Result<()> {
    if store
        .hide_delivery(announcement_id, user_id, Utc::now())
        .await?
    {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}
