use tracing::error;

use crate::models::{permission::SurveyAccess, survey::Survey};
use crate::store::Store;

/// Survey and the caller's capabilities on it, from a single store lookup.
///
/// Fails closed: a missing survey or a store error yields
/// [`SurveyAccess::DENIED`]. Nothing is cached.
pub async fn survey_with_access(
    store: &dyn Store,
    user_id: &str,
    survey_id: &str,
) -> (Option<Survey>, SurveyAccess) {
    match store.get_survey_with_grant(survey_id, user_id).await {
        Ok(Some((survey, grant))) => {
            let access = SurveyAccess::resolve(user_id, &survey, grant.as_ref());
            (Some(survey), access)
        }
        Ok(None) => (None, SurveyAccess::DENIED),
        Err(e) => {
            error!("Permission lookup failed for survey {survey_id}, user {user_id}: {e}");
            (None, SurveyAccess::DENIED)
        }
    }
}

pub async fn evaluate(store: &dyn Store, user_id: &str, survey_id: &str) -> SurveyAccess {
    survey_with_access(store, user_id, survey_id).await.1
}
