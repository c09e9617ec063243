use tracing::{info, warn};

use crate::errors::Result;
use crate::models::account::DeletionReport;
use crate::providers::files::FileStorage;
use crate::store::Store;

/// Removes the user and everything they own in one store transaction, then
/// the avatar file. A failed file delete is only logged.
pub async fn delete_account(
    store: &dyn Store,
    files: &dyn FileStorage,
    user_id: &str,
) -> Result<DeletionReport> {
    let report = store.delete_account(user_id).await?;
    for (step, count) in &report.deleted {
        info!("Account {user_id}: step {} removed {count} rows ({step:?})", step.position());
    }

    if let Some(file) = &report.avatar_file {
        if let Err(e) = files.delete(file).await {
            warn!("Avatar {file} of deleted account {user_id} left behind: {e}");
        }
    }
    info!("Account {user_id} deleted");
    Ok(report)
}
