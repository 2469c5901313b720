use crate::core::session::{SessionState, SessionStore, SharedSession};
use crate::domain::model::UserProfile;
use crate::utils::error::{AppError, Result};
use crate::web::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub const SESSION_COOKIE: &str = "recipe_session";

/// Request extension pointing at the caller's session.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    shared: SharedSession,
}

impl SessionHandle {
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared.lock().await
    }
}

/// Value of our cookie from the `Cookie` header(s), if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Attaches a [`SessionHandle`] to every request. A browser without a
/// recognized cookie gets a fresh session, which is stored (and the cookie
/// set) only if the handler left something in it worth keeping.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = session_id_from_headers(request.headers())
        .and_then(|id| state.sessions.get(&id).map(|shared| (id, shared)));

    let (handle, created) = match existing {
        Some((id, shared)) => (SessionHandle { id, shared }, false),
        None => {
            let shared = Arc::new(Mutex::new(state.new_session()));
            (SessionHandle { id: SessionStore::new_id(), shared }, true)
        }
    };

    request.extensions_mut().insert(handle.clone());
    let mut response = next.run(request).await;

    if !created || response.headers().contains_key(SET_COOKIE) {
        return response;
    }
    if !handle.lock().await.has_state_to_keep() {
        return response;
    }

    let cookie = session_cookie(&handle.id, state.config.secure_cookies());
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
            state.sessions.insert(handle.id, handle.shared);
        }
        Err(e) => tracing::error!("Could not encode session cookie: {}", e),
    }
    response
}

/// The signed-in user, or `Unauthenticated` (redirects to the login page).
pub fn require_user(session: &SessionState) -> Result<&UserProfile> {
    session.user.as_ref().ok_or(AppError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; recipe_session=abc-123 ; other=1"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_missing_or_empty_cookie() {
        let mut headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers).is_none());

        headers.insert(COOKIE, HeaderValue::from_static("recipe_session="));
        assert!(session_id_from_headers(&headers).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        assert_eq!(
            session_cookie("abc", false),
            "recipe_session=abc; Path=/; HttpOnly; SameSite=Lax"
        );
        assert!(session_cookie("abc", true).ends_with("; Secure"));
        assert!(expired_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_require_user() {
        let state = SessionState::default();
        assert!(matches!(require_user(&state), Err(AppError::Unauthenticated)));
    }
}
