use crate::adapters::google_oauth::OAuthToken;
use crate::domain::ports::AnyListCredentials;
use crate::domain::model::{Recipe, UserProfile, WeekKey, WeeklyMealPlan, DEFAULT_MEALS_PER_WEEK};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sessions untouched for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Where the session's documents currently live.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageStatus {
    /// Drive never connected in this session.
    #[default]
    NotConnected,
    Drive,
    /// Drive was wanted but failed; edits stay in memory.
    SessionOnly { reason: String },
}

impl StorageStatus {
    pub fn is_drive(&self) -> bool {
        matches!(self, StorageStatus::Drive)
    }
}

/// Everything the app remembers about one browser session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub login_token: Option<OAuthToken>,
    pub oauth_state: Option<String>,
    pub drive_oauth_state: Option<String>,
    pub drive_token: Option<OAuthToken>,
    /// Used when the credential vault is unavailable.
    pub anylist_credentials: Option<AnyListCredentials>,
    pub anylist_recipes: Vec<Recipe>,
    pub local_recipes: Vec<Recipe>,
    pub default_recipes: Vec<Recipe>,
    pub weekly_plans: BTreeMap<WeekKey, WeeklyMealPlan>,
    pub meals_per_week: usize,
    pub last_anylist_sync: Option<String>,
    pub loaded_from_drive: bool,
    pub storage: StorageStatus,
    /// recipe id -> scale factor chosen on the recipe page
    pub scale_factors: HashMap<String, f64>,
    notices: Vec<Notice>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_MEALS_PER_WEEK)
    }
}

impl SessionState {
    pub fn new(default_recipes: Vec<Recipe>, meals_per_week: usize) -> Self {
        Self {
            user: None,
            login_token: None,
            oauth_state: None,
            drive_oauth_state: None,
            drive_token: None,
            anylist_credentials: None,
            anylist_recipes: Vec::new(),
            local_recipes: Vec::new(),
            default_recipes,
            weekly_plans: BTreeMap::new(),
            meals_per_week,
            last_anylist_sync: None,
            loaded_from_drive: false,
            storage: StorageStatus::default(),
            scale_factors: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }

    pub fn drive_connected(&self) -> bool {
        self.drive_token.is_some()
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notify(NoticeLevel::Info, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.notify(NoticeLevel::Success, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.notify(NoticeLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.notify(NoticeLevel::Error, text);
    }

    /// Anything worth a cookie: a user, a pending OAuth state or an unread notice.
    pub fn has_state_to_keep(&self) -> bool {
        self.user.is_some()
            || self.oauth_state.is_some()
            || self.drive_oauth_state.is_some()
            || !self.notices.is_empty()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Drops everything tied to the signed-in user. Default recipes stay.
    pub fn sign_out(&mut self) {
        let defaults = std::mem::take(&mut self.default_recipes);
        let meals_per_week = DEFAULT_MEALS_PER_WEEK;
        *self = Self::new(defaults, meals_per_week);
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

#[derive(Debug)]
struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// Session id (cookie value) to state. A handler keeps the session's mutex
/// for its whole run, so requests within one session are serialized.
/// Idle sessions are swept whenever a new one is inserted.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Live session for `id`, marking it as seen. Expired ones are removed.
    pub fn get(&self, id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let entry = sessions.get_mut(id)?;
        if entry.last_seen.elapsed() >= self.idle_timeout {
            sessions.remove(id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    pub fn insert(&self, id: String, session: SharedSession) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < self.idle_timeout);
        if sessions.len() < before {
            tracing::debug!("Expired {} idle sessions", before - sessions.len());
        }
        sessions.insert(
            id,
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
        tracing::debug!("Stored session ({} active)", sessions.len());
    }

    pub fn create(&self, state: SessionState) -> (String, SharedSession) {
        let id = Self::new_id();
        let shared = Arc::new(Mutex::new(state));
        self.insert(id.clone(), shared.clone());
        (id, shared)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RecipeOrigin;

    #[test]
    fn test_notices_are_drained_once() {
        let mut state = SessionState::default();
        state.warning("Drive unavailable");
        state.success("Saved");

        let notices = state.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn test_sign_out_keeps_default_recipes_only() {
        let mut state = SessionState::new(vec![Recipe::new("Toast", RecipeOrigin::Builtin)], 5);
        state.user = Some(UserProfile {
            email: "cook@example.com".to_string(),
            name: None,
            given_name: None,
            family_name: None,
            picture: None,
            email_verified: None,
        });
        state
            .local_recipes
            .push(Recipe::new("Soup", RecipeOrigin::Local));

        state.sign_out();

        assert!(!state.is_authenticated());
        assert!(state.local_recipes.is_empty());
        assert_eq!(state.default_recipes.len(), 1);
        assert_eq!(state.meals_per_week, DEFAULT_MEALS_PER_WEEK);
    }

    #[tokio::test]
    async fn test_session_store_lifecycle() {
        let store = SessionStore::new();
        let (id, session) = store.create(SessionState::default());
        session.lock().await.meals_per_week = 4;

        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched.lock().await.meals_per_week, 4);
        assert!(store.get("missing").is_none());

        assert!(store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_idle_sessions_are_swept_on_insert() {
        let store = SessionStore::with_idle_timeout(Duration::ZERO);
        let (first, _) = store.create(SessionState::default());
        let (second, _) = store.create(SessionState::default());

        assert_eq!(store.len(), 1);
        assert!(store.get(&first).is_none());
        // zero timeout: even the newest entry is already idle
        assert!(store.get(&second).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_only_sessions_with_state_are_worth_keeping() {
        let mut state = SessionState::default();
        assert!(!state.has_state_to_keep());

        state.oauth_state = Some("csrf".to_string());
        assert!(state.has_state_to_keep());

        let mut state = SessionState::default();
        state.error("Sign-in failed");
        assert!(state.has_state_to_keep());
    }
}
