use crate::adapters::google_oauth::{self, OAuthGrant};
use crate::utils::error::{AppError, Result};
use crate::web::render;
use crate::web::session::{expired_cookie, SessionHandle};
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Extension;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Login page, or straight to the planner when already signed in.
pub async fn index(Extension(handle): Extension<SessionHandle>) -> Response {
    let mut session = handle.lock().await;
    if session.is_authenticated() {
        return Redirect::to("/this-week").into_response();
    }

    let body = "<div class=\"card\"><p>Plan your weekly meals from your AnyList recipes, \
                your own recipes and a built-in collection.</p>\
                <p><a href=\"/login\"><button>Sign in with Google</button></a></p></div>";
    render::page("Recipe Calendar", "/", &mut session, body).into_response()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    let csrf = google_oauth::new_state();
    let url = state.oauth.authorization_url(OAuthGrant::Login, &csrf)?;
    session.oauth_state = Some(csrf);
    Ok(Redirect::to(&url))
}

/// Checks the `state` we issued; it is single use either way.
pub fn verify_state(expected: Option<String>, returned: Option<&str>) -> Result<()> {
    match (expected, returned) {
        (Some(expected), Some(returned)) if expected == returned => Ok(()),
        _ => Err(AppError::AuthError {
            message: "OAuth state mismatch".to_string(),
        }),
    }
}

fn callback_code(query: &CallbackQuery) -> Result<&str> {
    if let Some(error) = &query.error {
        return Err(AppError::AuthError {
            message: format!("Google returned '{}'", error),
        });
    }
    query.code.as_deref().ok_or_else(|| AppError::AuthError {
        message: "authorization code missing".to_string(),
    })
}

pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let mut session = handle.lock().await;
    let expected = session.oauth_state.take();

    let result = async {
        verify_state(expected, query.state.as_deref())?;
        let code = callback_code(&query)?;
        let token = state.oauth.exchange_code(OAuthGrant::Login, code).await?;
        let profile = state.oauth.user_profile(&token).await?;
        Ok::<_, AppError>((token, profile))
    }
    .await;

    match result {
        Ok((token, profile)) => {
            tracing::info!("✅ Signed in {}", profile.email);
            session.success(format!("Welcome, {}!", profile.display_name()));
            session.user = Some(profile);
            session.login_token = Some(token);
            state.ensure_loaded(&mut session).await;
            Redirect::to("/this-week")
        }
        Err(e) => {
            tracing::warn!("Google sign-in failed: {}", e);
            session.error(format!("Sign-in failed: {}", e));
            Redirect::to("/")
        }
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Response {
    {
        let mut session = handle.lock().await;
        if let Some(email) = session.user_email() {
            tracing::info!("Signed out {}", email);
        }
        session.sign_out();
    }
    state.sessions.remove(&handle.id);

    (
        [(SET_COOKIE, expired_cookie(state.config.secure_cookies()))],
        Redirect::to("/"),
    )
        .into_response()
}
