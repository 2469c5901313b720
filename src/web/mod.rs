//! HTTP surface: one page per planner screen plus form actions. Every route
//! runs behind the cookie session layer.

pub mod auth;
pub mod browse;
pub mod error;
pub mod profile;
pub mod recipe;
pub mod render;
pub mod session;
pub mod settings;
pub mod state;
pub mod this_week;

use crate::config::AppConfig;
use crate::utils::error::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(auth::index))
        .route("/login", get(auth::login))
        .route("/oauth2callback", get(auth::oauth_callback))
        .route("/logout", get(auth::logout))
        .route("/this-week", get(this_week::this_week))
        .route("/this-week/{offset}/populate", post(this_week::populate_week))
        .route("/this-week/{offset}/clear", post(this_week::clear_week))
        .route("/this-week/{offset}/remove/{index}", post(this_week::remove_meal))
        .route("/this-week/{offset}/shopping-list.csv", get(this_week::shopping_list))
        .route("/recipes", get(browse::browse))
        .route("/recipes/new", get(browse::new_recipe_form).post(browse::create_recipe))
        .route("/recipes/{id}", get(recipe::view_recipe))
        .route("/recipes/{id}/add", post(recipe::add_to_week))
        .route("/profile", get(profile::profile))
        .route("/settings", get(settings::settings))
        .route("/settings/meals-per-week", post(profile::update_meals_per_week))
        .route("/settings/anylist/connect", post(settings::anylist_connect))
        .route("/settings/anylist/test", post(settings::anylist_test))
        .route("/settings/anylist/sync", post(settings::anylist_sync))
        .route("/settings/anylist/disconnect", post(settings::anylist_disconnect))
        .route("/settings/anylist/lists", get(settings::anylist_lists))
        .route("/settings/drive/connect", get(settings::drive_connect))
        .route("/drive_oauth2callback", get(settings::drive_callback))
        .route("/settings/drive/load", post(settings::drive_load))
        .route("/settings/drive/save", post(settings::drive_save))
        .route("/settings/drive/test", post(settings::drive_test))
        .route("/settings/drive/clear", post(settings::drive_clear))
        .route("/settings/drive/disconnect", post(settings::drive_disconnect))
        .route("/settings/drive/backup.zip", get(settings::backup))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = format!("{}:{}", state.config.host(), state.config.port());
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("🍽️ Recipe Calendar running on {}", state.config.public_url());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Loads everything the server needs from the configuration, then serves.
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_config(config)?;
    if !state.provider.is_available().await {
        tracing::warn!("💡 Node.js was not found; AnyList features are disabled");
    }
    serve(state).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
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
