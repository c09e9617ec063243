use std::{sync::Arc, time::Duration};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::{
    middleware::auth_jwt_middleware,
    routes::auth_route::{
        invitation::{create_invitation, list_invitations, validate_invitation},
        user::{sign_in, sign_out, sign_up},
    },
    state::AppState,
};

pub mod invitation;
pub mod user;

pub fn auth_router(config: AppState) -> Router<AppState> {
    let credentials = Router::new()
        .route("/signin", post(sign_in))
        .route("/signup", post(sign_up));
    let credentials = if config.config.rate_limit {
        governed(credentials)
    } else {
        credentials
    };

    Router::new()
        .merge(credentials)
        .route("/signout", post(sign_out))
        .with_state(config)
}

pub fn invitation_router(config: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(list_invitations))
        .route("/create", post(create_invitation))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_jwt_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/validate", post(validate_invitation))
        .with_state(config)
}

// ? rate limiter for credential endpoints: bursts of 5, then one every 12s per client ip
fn governed(router: Router<AppState>) -> Router<AppState> {
    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
    else {
        tracing::error!("Invalid rate limiter settings, serving credentials unthrottled");
        return router;
    };
    let governor_conf = Arc::new(governor_conf);
    let governor_limiter = governor_conf.limiter().clone();
    let interval = Duration::from_secs(60);
    // a separate background task to clean up
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(interval);
            tracing::debug!("rate limiting storage size: {}", governor_limiter.len());
            governor_limiter.retain_recent();
        }
    });

    router.layer(GovernorLayer {
        config: governor_conf,
    })
}
