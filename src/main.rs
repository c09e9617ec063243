use std::{net::SocketAddr, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use crate::{
    config::Config,
    errors::{Error, Result},
    routes::{
        account_route::account_router,
        admin_panel::admin_router,
        announcement_route::announcement_router,
        auth_route::{auth_router, invitation_router},
        billing_route::{billing_router, discount_router},
        survey_route::{public_survey_router, survey_router},
    },
    state::AppState,
};

pub mod config;
pub mod consts;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Config::log_level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("tracing subscriber: {e}")))?;
    let config = Config::load()?;

    let cors = cors_layer(&config)?;
    let address = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::init(config).await?;

    info!("Starting server");

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Serving surveys at http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app(state)
            .layer(cors)
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth_router(state.clone()))
        .nest("/invitations", invitation_router(state.clone()))
        .nest("/user", account_router(state.clone()))
        .nest("/surveys", survey_router(state.clone()))
        .nest("/public/surveys", public_survey_router(state.clone()))
        .nest("/announcements", announcement_router(state.clone()))
        .nest("/billing", billing_router(state.clone()))
        .nest("/discount-links", discount_router(state.clone()))
        .nest("/admin", admin_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ? the web client lives on PUBLIC_BASE_URL and sends the session cookie
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origin = config
        .public_base_url
        .parse::<HeaderValue>()
        .map_err(|e| Error::Config(format!("PUBLIC_BASE_URL is not a valid origin: {e}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Ctrl+C handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
