use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    errors::{Error, Result},
    middleware::{Session, auth_jwt_middleware},
    models::{permission::SurveyAccess, survey::Survey},
    routes::survey_route::{
        collaborator::{grant_collaborator, list_collaborators, revoke_collaborator},
        public::{public_survey, submit_response},
        share::{share_survey, unshare_survey},
        survey::{
            create_survey, delete_survey, get_survey, list_responses, list_surveys,
            replace_questions, survey_permissions, update_survey,
        },
    },
    services::permission::survey_with_access,
    state::AppState,
};

pub mod collaborator;
pub mod public;
pub mod share;
pub mod survey;

pub fn survey_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_survey).get(list_surveys))
        .route(
            "/{id}",
            get(get_survey).patch(update_survey).delete(delete_survey),
        )
        .route("/{id}/share", post(share_survey).delete(unshare_survey))
        .route("/{id}/questions", put(replace_questions))
        .route("/{id}/responses", get(list_responses))
        .route("/{id}/permissions", get(survey_permissions))
        .route(
            "/{id}/collaborators",
            get(list_collaborators).post(grant_collaborator),
        )
        .route("/{id}/collaborators/{user_id}", delete(revoke_collaborator))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ))
        .with_state(config)
}

pub fn public_survey_router(config: AppState) -> Router<AppState> {
    Router::new()
        .route("/{share_url}", get(public_survey))
        .route("/{share_url}/responses", post(submit_response))
        .with_state(config)
}

/// Loads the survey once and runs `check` on the caller's capabilities.
async fn authorize(
    state: &AppState,
    session: &Session,
    survey_id: &str,
    check: fn(&SurveyAccess) -> Result<()>,
) -> Result<(Survey, SurveyAccess)> {
    let (survey, access) =
        survey_with_access(state.store.as_ref(), &session.user_id, survey_id).await;
    check(&access)?;
    let survey = survey.ok_or(Error::NotFound)?;
    Ok((survey, access))
}

#[cfg(test)]
mod tests;
