use crate::adapters::anylist::AnyListClient;
use crate::adapters::credentials::CredentialVault;
use crate::adapters::drive::GoogleDriveStore;
use crate::adapters::google_oauth::{GoogleOAuth, OAuthGrant};
use crate::config::AppConfig;
use crate::core::import;
use crate::core::persistence::Persistence;
use crate::core::session::{SessionState, SessionStore, StorageStatus};
use crate::core::week;
use crate::domain::model::{Recipe, WeekKey};
use crate::domain::ports::{AnyListCredentials, RecipeProvider};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide state shared by every handler.
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionStore,
    pub oauth: GoogleOAuth,
    pub provider: Arc<dyn RecipeProvider>,
    pub vault: Option<CredentialVault>,
    pub http: Client,
    pub default_recipes: Vec<Recipe>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        http: Client,
        provider: Arc<dyn RecipeProvider>,
        vault: Option<CredentialVault>,
        default_recipes: Vec<Recipe>,
    ) -> Arc<Self> {
        let oauth = GoogleOAuth::from_config(http.clone(), &config);
        let sessions = SessionStore::with_idle_timeout(config.session_idle_timeout());
        Arc::new(Self {
            config,
            sessions,
            oauth,
            provider,
            vault,
            http,
            default_recipes,
        })
    }

    /// Builds the production wiring. Missing default recipes or an unreadable
    /// vault only disable those features.
    pub fn from_config(config: AppConfig) -> Result<Arc<Self>> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let provider: Arc<dyn RecipeProvider> = Arc::new(AnyListClient::from_config(&config));

        let vault = if config.anylist_enabled() {
            match CredentialVault::open(config.credentials_path(), config.key_path()) {
                Ok(vault) => Some(vault),
                Err(e) => {
                    tracing::warn!("AnyList credential vault unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let default_recipes = match config.default_recipes_path() {
            Some(path) => match import::load_default_recipes(path) {
                Ok(recipes) => recipes,
                Err(e) => {
                    tracing::warn!("Could not load default recipes from {}: {}", path, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(Self::new(config, http, provider, vault, default_recipes))
    }

    pub fn new_session(&self) -> SessionState {
        SessionState::new(self.default_recipes.clone(), self.config.meals_per_week())
    }

    pub fn current_week(&self) -> WeekKey {
        week::week_key_for_offset(week::today(), 0)
    }

    /// Offsets past the configured horizon are clamped to the last tab.
    pub fn week_for_offset(&self, offset: u32) -> (u32, WeekKey) {
        let last = self.config.weeks_shown().saturating_sub(1) as u32;
        let offset = offset.min(last);
        (offset, week::week_key_for_offset(week::today(), offset))
    }

    /// "This Week - Week 35 (Aug 25 - Aug 31)" and so on, one per tab.
    pub fn week_labels(&self) -> Vec<String> {
        let today = week::today();
        (0..self.config.weeks_shown() as u32)
            .map(|offset| week::relative_week_label(today, offset))
            .collect()
    }

    /// Stored credentials for the signed-in user, vault first.
    pub fn anylist_credentials(&self, session: &SessionState) -> Option<AnyListCredentials> {
        if let (Some(vault), Some(email)) = (&self.vault, session.user_email()) {
            match vault.get(email) {
                Ok(Some(creds)) => return Some(creds),
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not read AnyList credentials: {}", e),
            }
        }
        session.anylist_credentials.clone()
    }

    pub fn drive_store(&self, access_token: &str) -> GoogleDriveStore {
        GoogleDriveStore::new(
            self.http.clone(),
            self.config.drive_api_base(),
            access_token,
            self.config.drive_folder_name(),
        )
    }

    /// Drive-backed persistence when a Drive grant is present, refreshing an
    /// expired access token first. Without a usable grant, session-only.
    pub async fn persistence(&self, session: &mut SessionState) -> Persistence {
        let Some(token) = session.drive_token.clone() else {
            return Persistence::session_only();
        };

        let token = if token.is_expired() {
            match self.oauth.refresh(OAuthGrant::Drive, &token).await {
                Ok(fresh) => {
                    tracing::debug!("Refreshed Google Drive access token");
                    session.drive_token = Some(fresh.clone());
                    fresh
                }
                Err(e) => {
                    tracing::warn!("Google Drive token refresh failed: {}", e);
                    session.drive_token = None;
                    session.storage = StorageStatus::SessionOnly {
                        reason: e.to_string(),
                    };
                    session.warning(
                        "Google Drive access expired. Reconnect it from Settings; changes are kept for this session only.",
                    );
                    return Persistence::session_only();
                }
            }
        } else {
            token
        };

        Persistence::new(Some(Arc::new(self.drive_store(&token.access_token))))
    }

    /// Loads Drive documents once per session. After a failed load the
    /// session stays session-only until the user reloads from Settings.
    pub async fn ensure_loaded(&self, session: &mut SessionState) {
        if session.loaded_from_drive
            || !session.drive_connected()
            || matches!(session.storage, StorageStatus::SessionOnly { .. })
        {
            return;
        }
        let persistence = self.persistence(session).await;
        if persistence.is_connected() {
            persistence.load_into(session, self.current_week()).await;
        }
    }
}
