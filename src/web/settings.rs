use crate::adapters::google_oauth::{self, OAuthGrant, DRIVE_FILE_SCOPE};
use crate::core::export;
use crate::core::import;
use crate::core::persistence::{self, Persistence};
use crate::core::session::{SessionState, StorageStatus};
use crate::domain::ports::AnyListCredentials;
use crate::utils::error::{AppError, Result};
use crate::web::auth::{verify_state, CallbackQuery};
use crate::web::render::{self, escape, post_button};
use crate::web::session::{require_user, SessionHandle};
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

const ANYLIST_TAB: &str = "/settings?tab=anylist";
const DRIVE_TAB: &str = "/settings?tab=drive";

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    #[serde(default)]
    pub tab: Option<String>,
}

/// The checkbox is only sent when ticked.
#[derive(Debug, Default, Deserialize)]
pub struct ClearDriveForm {
    #[serde(default)]
    pub confirm: Option<String>,
}

impl ClearDriveForm {
    pub fn confirmed(&self) -> bool {
        self.confirm.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct AnyListLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl AnyListLoginForm {
    fn credentials(&self) -> Result<AnyListCredentials> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(AppError::ValidationError {
                message: "Enter your AnyList email and password".to_string(),
            });
        }
        Ok(AnyListCredentials {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

async fn anylist_tab(state: &AppState, session: &SessionState) -> String {
    let node_ready = state.provider.is_available().await;
    let creds = state.anylist_credentials(session);
    let mut body = String::from("<div class=\"card\"><h2>AnyList</h2>");

    if !node_ready {
        body.push_str(
            "<div class=\"notice warning\">Node.js is not available, so AnyList features are disabled. \
             Install Node.js and the AnyList bridge to enable them.</div>",
        );
    }

    match &creds {
        Some(creds) => {
            let _ = write!(body, "<p>Connected as <strong>{}</strong></p>", escape(&creds.email));
            let _ = write!(
                body,
                "<p>{} recipes synced{}</p>",
                session.anylist_recipes.len(),
                session
                    .last_anylist_sync
                    .as_deref()
                    .map(|t| format!(", last sync {}", escape(t)))
                    .unwrap_or_default()
            );
            body.push_str(&post_button("/settings/anylist/sync", "Sync recipes"));
            body.push(' ');
            body.push_str(&post_button("/settings/anylist/test", "Test connection"));
            body.push(' ');
            body.push_str("<a href=\"/settings/anylist/lists\">Shopping lists</a> ");
            body.push_str(&post_button("/settings/anylist/disconnect", "Disconnect"));
        }
        None => body.push_str(
            "<form method=\"post\" action=\"/settings/anylist/connect\">\
             <label>Email <input name=\"email\" type=\"email\"></label> \
             <label>Password <input name=\"password\" type=\"password\"></label> \
             <button type=\"submit\">Connect AnyList</button></form>",
        ),
    }
    body.push_str("</div>");
    body
}

fn drive_tab(session: &SessionState) -> String {
    let mut body = String::from("<div class=\"card\"><h2>Google Drive</h2>");
    let _ = write!(body, "<p>Status: {}</p>", render::storage_badge(&session.storage));
    if let StorageStatus::SessionOnly { reason } = &session.storage {
        let _ = write!(body, "<p><small>{}</small></p>", escape(reason));
    }

    if session.drive_connected() {
        for (action, label) in [
            ("/settings/drive/load", "Load from Drive"),
            ("/settings/drive/save", "Save to Drive"),
            ("/settings/drive/test", "Test connection"),
            ("/settings/drive/disconnect", "Disconnect"),
        ] {
            body.push_str(&post_button(action, label));
            body.push(' ');
        }
        body.push_str(
            "<form method=\"post\" action=\"/settings/drive/clear\" class=\"card\">\
             <label><input type=\"checkbox\" name=\"confirm\" value=\"yes\"> \
             I understand this will delete all app data from Drive</label> \
             <button type=\"submit\">Delete app data from Drive</button></form>",
        );
    } else {
        body.push_str(
            "<p>Your recipes and plans are only kept for this session.</p>\
             <p><a href=\"/settings/drive/connect\"><button>Connect Google Drive</button></a></p>",
        );
    }
    body.push_str("<p><a href=\"/settings/drive/backup.zip\">Download backup (.zip)</a></p></div>");
    body
}

pub async fn settings(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<SettingsQuery>,
) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    require_user(&session)?;

    let tab = query.tab.as_deref().unwrap_or("anylist");
    let mut body = String::from("<div class=\"tabs\">");
    for (key, label) in [("anylist", "AnyList"), ("drive", "Google Drive")] {
        let class = if key == tab { " class=\"active\"" } else { "" };
        let _ = write!(body, "<a href=\"/settings?tab={}\"{}>{}</a>", key, class, label);
    }
    body.push_str("</div>");

    if tab == "drive" {
        body.push_str(&drive_tab(&session));
    } else if state.config.anylist_enabled() {
        body.push_str(&anylist_tab(&state, &session).await);
    } else {
        body.push_str("<p>AnyList integration is turned off in the server configuration.</p>");
    }

    Ok(render::page("Settings", "/settings", &mut session, &body))
}

pub async fn anylist_connect(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Form(form): Form<AnyListLoginForm>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    let email = require_user(&session)?.email.clone();

    let creds = match form.credentials() {
        Ok(creds) => creds,
        Err(e) => {
            session.error(e.user_friendly_message());
            return Ok(Redirect::to(ANYLIST_TAB));
        }
    };

    if let Err(e) = state.provider.login(&creds).await {
        tracing::warn!("AnyList login failed for {}: {}", email, e);
        session.error(format!("AnyList login failed: {}", e));
        return Ok(Redirect::to(ANYLIST_TAB));
    }

    match &state.vault {
        Some(vault) => match vault.save(&email, &creds) {
            Ok(()) => session.anylist_credentials = None,
            Err(e) => {
                tracing::warn!("Could not store AnyList credentials: {}", e);
                session.warning("Credentials could not be saved and will be forgotten when you sign out.");
                session.anylist_credentials = Some(creds);
            }
        },
        None => session.anylist_credentials = Some(creds),
    }
    tracing::info!("✅ AnyList connected for {}", email);
    session.success("AnyList connected. Sync to import your recipes.");
    Ok(Redirect::to(ANYLIST_TAB))
}

fn require_anylist(state: &AppState, session: &mut SessionState) -> Option<AnyListCredentials> {
    let creds = state.anylist_credentials(session);
    if creds.is_none() {
        session.warning("Connect AnyList first.");
    }
    creds
}

pub async fn anylist_test(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let Some(creds) = require_anylist(&state, &mut session) else {
        return Ok(Redirect::to(ANYLIST_TAB));
    };

    match state.provider.login(&creds).await {
        Ok(message) => session.success(format!("AnyList connection works: {}", message)),
        Err(e) => session.error(format!("AnyList connection failed: {}", e)),
    }
    Ok(Redirect::to(ANYLIST_TAB))
}

pub async fn anylist_sync(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let Some(creds) = require_anylist(&state, &mut session) else {
        return Ok(Redirect::to(ANYLIST_TAB));
    };

    match import::sync_from_provider(state.provider.as_ref(), &creds, None).await {
        Ok((recipes, summary)) => {
            session.anylist_recipes = recipes;
            session.last_anylist_sync = Some(persistence::timestamp());
            session.success(summary.describe());
            let persistence = state.persistence(&mut session).await;
            persistence.save_recipes(&mut session).await;
        }
        Err(e) => {
            tracing::warn!("AnyList sync failed: {}", e);
            session.error(format!("AnyList sync failed: {}", e));
        }
    }
    Ok(Redirect::to(ANYLIST_TAB))
}

pub async fn anylist_disconnect(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    let email = require_user(&session)?.email.clone();

    if let Some(vault) = &state.vault {
        if let Err(e) = vault.remove(&email) {
            tracing::warn!("Could not remove AnyList credentials: {}", e);
        }
    }
    session.anylist_credentials = None;
    session.info("AnyList disconnected. Synced recipes stay in your library.");
    Ok(Redirect::to(ANYLIST_TAB))
}

pub async fn anylist_lists(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let Some(creds) = require_anylist(&state, &mut session) else {
        return Ok(Redirect::to(ANYLIST_TAB).into_response());
    };

    let lists = match state.provider.lists(&creds).await {
        Ok(lists) => lists,
        Err(e) => {
            session.error(format!("Could not load AnyList lists: {}", e));
            return Ok(Redirect::to(ANYLIST_TAB).into_response());
        }
    };

    let mut body = String::new();
    if lists.is_empty() {
        body.push_str("<p>No shopping lists found.</p>");
    }
    for list in &lists {
        let _ = write!(
            body,
            "<div class=\"card\"><strong>{}</strong> ({} items)<ul>",
            escape(&list.name),
            list.items.len()
        );
        for item in &list.items {
            let _ = write!(body, "<li>{}</li>", escape(item));
        }
        body.push_str("</ul></div>");
    }
    body.push_str("<p><a href=\"/settings\">Back to settings</a></p>");
    Ok(render::page("AnyList Shopping Lists", "/settings", &mut session, &body).into_response())
}

pub async fn drive_connect(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let csrf = google_oauth::new_state();
    let url = state.oauth.authorization_url(OAuthGrant::Drive, &csrf)?;
    session.drive_oauth_state = Some(csrf);
    Ok(Redirect::to(&url))
}

pub async fn drive_callback(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let expected = session.drive_oauth_state.take();

    let result = async {
        verify_state(expected, query.state.as_deref())?;
        if let Some(error) = &query.error {
            return Err(AppError::AuthError {
                message: format!("Google returned '{}'", error),
            });
        }
        let code = query.code.as_deref().ok_or_else(|| AppError::AuthError {
            message: "authorization code missing".to_string(),
        })?;
        state.oauth.exchange_code(OAuthGrant::Drive, code).await
    }
    .await;

    match result {
        Ok(token) if token.scope.is_some() && !token.has_scope(DRIVE_FILE_SCOPE) => {
            session.error("Google Drive access was not granted.");
        }
        Ok(token) => {
            session.drive_token = Some(token);
            session.loaded_from_drive = false;
            let persistence = state.persistence(&mut session).await;
            let status = persistence.load_into(&mut session, state.current_week()).await;
            if status.is_drive() {
                tracing::info!("✅ Google Drive connected");
                session.success("Google Drive connected. Your data is now saved to Drive.");
            }
        }
        Err(e) => {
            tracing::warn!("Google Drive authorization failed: {}", e);
            session.error(format!("Google Drive authorization failed: {}", e));
        }
    }
    Ok(Redirect::to(DRIVE_TAB))
}

/// Persistence for a Drive action, or a warning when Drive is not connected.
async fn drive_persistence(state: &AppState, session: &mut SessionState) -> Option<Persistence> {
    let persistence = state.persistence(session).await;
    if persistence.is_connected() {
        Some(persistence)
    } else {
        session.warning("Connect Google Drive first.");
        None
    }
}

pub async fn drive_load(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    if let Some(persistence) = drive_persistence(&state, &mut session).await {
        if persistence.load_into(&mut session, state.current_week()).await.is_drive() {
            session.success("Loaded your data from Google Drive.");
        }
    }
    Ok(Redirect::to(DRIVE_TAB))
}

pub async fn drive_save(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    if let Some(persistence) = drive_persistence(&state, &mut session).await {
        if persistence.awaiting_load(&session) {
            session.warning(
                "Your Drive data has not been loaded yet. Load from Drive first so saving does not replace it.",
            );
        } else if persistence.save_all(&mut session, state.current_week()).await.is_drive() {
            session.success("Saved everything to Google Drive.");
        }
    }
    Ok(Redirect::to(DRIVE_TAB))
}

pub async fn drive_test(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    if let Some(persistence) = drive_persistence(&state, &mut session).await {
        match persistence.probe().await {
            Ok(()) => session.success("Google Drive connection works."),
            Err(e) => session.error(format!("Google Drive test failed: {}", e)),
        }
    }
    Ok(Redirect::to(DRIVE_TAB))
}

pub async fn drive_clear(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Form(form): Form<ClearDriveForm>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    if !form.confirmed() {
        session.warning("Tick the confirmation box to delete your app data from Drive.");
        return Ok(Redirect::to(DRIVE_TAB));
    }
    if let Some(persistence) = drive_persistence(&state, &mut session).await {
        match persistence.delete_all().await {
            Ok(()) => {
                tracing::info!("Deleted app folder from Google Drive");
                session.success("Deleted the app's data from Google Drive. Session data is unchanged.");
            }
            Err(e) => session.error(format!("Could not delete Drive data: {}", e)),
        }
    }
    Ok(Redirect::to(DRIVE_TAB))
}

pub async fn drive_disconnect(Extension(handle): Extension<SessionHandle>) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    session.drive_token = None;
    session.loaded_from_drive = false;
    session.storage = StorageStatus::NotConnected;
    session.info("Google Drive disconnected. Changes are kept for this session only.");
    Ok(Redirect::to(DRIVE_TAB))
}

pub async fn backup(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let session = handle.lock().await;
    require_user(&session)?;

    let documents = persistence::session_documents(&session, state.current_week())?;
    let archive = export::backup_archive(&documents)?;
    Ok((
        [
            (CONTENT_TYPE, "application/zip"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"recipe-calendar-backup.zip\"",
            ),
        ],
        archive,
    )
        .into_response())
}
