use crate::core::planner;
use crate::core::session::{SessionState, StorageStatus};
use crate::domain::model::{
    Document, DocumentKind, MealPlansDocument, RecipesDocument, UserSettings, WeekKey,
    WeeklyRecipesDocument,
};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{AppError, Result};
use chrono::Local;
use std::sync::Arc;

pub fn timestamp() -> String {
    Local::now().to_rfc3339()
}

pub fn recipes_document(session: &SessionState) -> RecipesDocument {
    RecipesDocument {
        anylist_recipes: session.anylist_recipes.clone(),
        local_recipes: session.local_recipes.clone(),
        last_sync: session.last_anylist_sync.clone(),
        last_updated: None,
    }
}

pub fn weekly_recipes_document(session: &SessionState, current_week: WeekKey) -> WeeklyRecipesDocument {
    WeeklyRecipesDocument {
        current_week: planner::recipes_for_week(&session.weekly_plans, current_week).to_vec(),
        weekly_plans: session.weekly_plans.clone(),
        last_updated: None,
    }
}

pub fn meal_plans_document(session: &SessionState) -> MealPlansDocument {
    MealPlansDocument {
        weekly_plans: session.weekly_plans.clone(),
        last_updated: None,
    }
}

pub fn settings_document(session: &SessionState) -> UserSettings {
    UserSettings {
        meals_per_week: session.meals_per_week,
        last_updated: None,
    }
}

/// Session documents serialized the way they are written to Drive.
pub fn session_documents(session: &SessionState, current_week: WeekKey) -> Result<Vec<(DocumentKind, Vec<u8>)>> {
    Ok(vec![
        (
            DocumentKind::Recipes,
            serde_json::to_vec_pretty(&recipes_document(session))?,
        ),
        (
            DocumentKind::WeeklyRecipes,
            serde_json::to_vec_pretty(&weekly_recipes_document(session, current_week))?,
        ),
        (
            DocumentKind::MealPlans,
            serde_json::to_vec_pretty(&meal_plans_document(session))?,
        ),
        (
            DocumentKind::UserSettings,
            serde_json::to_vec_pretty(&settings_document(session))?,
        ),
    ])
}

/// Reads and writes session data through an optional document store.
///
/// Every failure degrades to session-only state: the session keeps its data,
/// gets a warning notice and its storage status flips to `SessionOnly`.
/// Nothing is written until the store has been read successfully, so a session
/// that failed to load never replaces the stored documents.
#[derive(Clone, Default)]
pub struct Persistence {
    store: Option<Arc<dyn DocumentStore>>,
}

impl Persistence {
    pub fn new(store: Option<Arc<dyn DocumentStore>>) -> Self {
        Self { store }
    }

    pub fn session_only() -> Self {
        Self { store: None }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store
            .as_ref()
            .map(|s| s.backend_name())
            .unwrap_or("session")
    }

    async fn read<D: Document>(store: &dyn DocumentStore) -> Result<Option<D>> {
        match store.read_document(D::KIND).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                AppError::storage(format!("{} is not valid JSON: {}", D::KIND.file_name(), e))
            }),
            None => Ok(None),
        }
    }

    async fn write<D: Document>(store: &dyn DocumentStore, mut document: D) -> Result<()> {
        document.set_last_updated(timestamp());
        let bytes = serde_json::to_vec_pretty(&document)?;
        store.write_document(D::KIND, &bytes).await
    }

    fn degrade(session: &mut SessionState, action: &str, err: &AppError) -> StorageStatus {
        tracing::warn!("Drive {} failed, keeping session-only state: {}", action, err);
        let reason = err.to_string();
        session.warning(format!(
            "Could not {} Google Drive; your changes are kept for this session only.",
            action
        ));
        session.storage = StorageStatus::SessionOnly { reason };
        session.storage.clone()
    }

    /// Store to write to, or `None` while writes are held back.
    fn writable<'a>(&'a self, session: &SessionState) -> Option<&'a dyn DocumentStore> {
        let store = self.store.as_deref()?;
        if !session.loaded_from_drive {
            tracing::debug!("Skipping {} write: documents not loaded yet", store.backend_name());
            return None;
        }
        Some(store)
    }

    /// True when a store is attached but the session has not loaded from it.
    pub fn awaiting_load(&self, session: &SessionState) -> bool {
        self.store.is_some() && !session.loaded_from_drive
    }

    fn mark_saved(session: &mut SessionState) -> StorageStatus {
        session.storage = StorageStatus::Drive;
        StorageStatus::Drive
    }

    /// Loads all documents into the session. Missing files leave defaults in place.
    pub async fn load_into(&self, session: &mut SessionState, current_week: WeekKey) -> StorageStatus {
        let Some(store) = self.store.as_deref() else {
            return session.storage.clone();
        };

        match Self::load_documents(store, session, current_week).await {
            Ok(()) => {
                session.loaded_from_drive = true;
                tracing::info!(
                    "Loaded {} AnyList, {} local recipes and {} meal plans from {}",
                    session.anylist_recipes.len(),
                    session.local_recipes.len(),
                    session.weekly_plans.len(),
                    store.backend_name()
                );
                Self::mark_saved(session)
            }
            Err(e) => Self::degrade(session, "load from", &e),
        }
    }

    async fn load_documents(
        store: &dyn DocumentStore,
        session: &mut SessionState,
        current_week: WeekKey,
    ) -> Result<()> {
        let recipes: Option<RecipesDocument> = Self::read(store).await?;
        let meal_plans: Option<MealPlansDocument> = Self::read(store).await?;
        let weekly: Option<WeeklyRecipesDocument> = Self::read(store).await?;
        let settings: Option<UserSettings> = Self::read(store).await?;

        if let Some(recipes) = recipes {
            session.anylist_recipes = recipes.anylist_recipes;
            session.local_recipes = recipes.local_recipes;
            session.last_anylist_sync = recipes.last_sync;
        }

        if weekly.is_some() || meal_plans.is_some() {
            let mut plans = planner::WeeklyPlans::new();
            let mut current = Vec::new();
            if let Some(weekly) = weekly {
                plans.extend(weekly.weekly_plans);
                current = weekly.current_week;
            }
            if let Some(meal_plans) = meal_plans {
                plans.extend(meal_plans.weekly_plans);
            }
            if !current.is_empty() && !planner::has_recipes_for_week(&plans, current_week) {
                plans
                    .entry(current_week)
                    .or_insert_with(|| crate::domain::model::WeeklyMealPlan::new(current_week))
                    .meals = current;
            }
            session.weekly_plans = plans;
        }

        if let Some(settings) = settings {
            session.meals_per_week = settings.meals_per_week;
        }
        Ok(())
    }

    pub async fn save_recipes(&self, session: &mut SessionState) -> StorageStatus {
        let Some(store) = self.writable(session) else {
            return session.storage.clone();
        };
        match Self::write(store, recipes_document(session)).await {
            Ok(()) => Self::mark_saved(session),
            Err(e) => Self::degrade(session, "save recipes to", &e),
        }
    }

    /// Writes both `weekly_recipes.json` and `meal_plans.json`.
    pub async fn save_plans(&self, session: &mut SessionState, current_week: WeekKey) -> StorageStatus {
        let Some(store) = self.writable(session) else {
            return session.storage.clone();
        };
        let result = async {
            Self::write(store, weekly_recipes_document(session, current_week)).await?;
            Self::write(store, meal_plans_document(session)).await
        }
        .await;
        match result {
            Ok(()) => Self::mark_saved(session),
            Err(e) => Self::degrade(session, "save meal plans to", &e),
        }
    }

    pub async fn save_settings(&self, session: &mut SessionState) -> StorageStatus {
        let Some(store) = self.writable(session) else {
            return session.storage.clone();
        };
        match Self::write(store, settings_document(session)).await {
            Ok(()) => Self::mark_saved(session),
            Err(e) => Self::degrade(session, "save settings to", &e),
        }
    }

    pub async fn save_all(&self, session: &mut SessionState, current_week: WeekKey) -> StorageStatus {
        let status = self.save_recipes(session).await;
        if !status.is_drive() {
            return status;
        }
        let status = self.save_plans(session, current_week).await;
        if !status.is_drive() {
            return status;
        }
        self.save_settings(session).await
    }

    pub async fn delete_all(&self) -> Result<()> {
        match self.store.as_deref() {
            Some(store) => store.delete_all().await,
            None => Ok(()),
        }
    }

    pub async fn probe(&self) -> Result<()> {
        match self.store.as_deref() {
            Some(store) => store.probe().await,
            None => Err(AppError::storage("Google Drive is not connected")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::model::{Recipe, RecipeOrigin};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose reads or writes can be switched to answer 503.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        reads_fail: AtomicBool,
        writes_fail: AtomicBool,
    }

    impl FlakyStore {
        fn unavailable(flag: &AtomicBool) -> Result<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(AppError::storage("Drive returned 503"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn read_document(&self, kind: DocumentKind) -> Result<Option<Vec<u8>>> {
            Self::unavailable(&self.reads_fail)?;
            self.inner.read_document(kind).await
        }

        async fn write_document(&self, kind: DocumentKind, data: &[u8]) -> Result<()> {
            Self::unavailable(&self.writes_fail)?;
            self.inner.write_document(kind, data).await
        }

        async fn delete_all(&self) -> Result<()> {
            Self::unavailable(&self.writes_fail)?;
            self.inner.delete_all().await
        }

        async fn probe(&self) -> Result<()> {
            Self::unavailable(&self.reads_fail)
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn week() -> WeekKey {
        "2025-W35".parse().unwrap()
    }

    fn planned_session() -> SessionState {
        let mut session = SessionState::default();
        let recipe = Recipe::new("Chili", RecipeOrigin::Local);
        session.local_recipes.push(recipe.clone());
        planner::add_to_week(&mut session.weekly_plans, week(), &recipe);
        session.meals_per_week = 5;
        session
    }

    fn stored_meal_names(bytes: &[u8]) -> Vec<String> {
        let doc: MealPlansDocument = serde_json::from_slice(bytes).unwrap();
        doc.weekly_plans
            .values()
            .flat_map(|plan| plan.meals.iter().map(|m| m.recipe_name.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_save_then_load_restores_session() {
        let store = Arc::new(MemoryStore::new());
        let persistence = Persistence::new(Some(store.clone()));
        let mut session = planned_session();

        // an empty store loads fine and leaves the session as it is
        assert_eq!(persistence.load_into(&mut session, week()).await, StorageStatus::Drive);
        assert_eq!(persistence.save_all(&mut session, week()).await, StorageStatus::Drive);
        assert_eq!(store.len(), 4);

        let mut fresh = SessionState::default();
        let status = persistence.load_into(&mut fresh, week()).await;

        assert_eq!(status, StorageStatus::Drive);
        assert!(fresh.loaded_from_drive);
        assert_eq!(fresh.local_recipes, session.local_recipes);
        assert_eq!(fresh.weekly_plans, session.weekly_plans);
        assert_eq!(fresh.meals_per_week, 5);
    }

    #[tokio::test]
    async fn test_repeated_plan_saves_are_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let persistence = Persistence::new(Some(store.clone()));
        let mut session = planned_session();
        persistence.load_into(&mut session, week()).await;

        persistence.save_plans(&mut session, week()).await;
        let first = store.read_document(DocumentKind::MealPlans).await.unwrap().unwrap();
        persistence.save_plans(&mut session, week()).await;
        let second = store.read_document(DocumentKind::MealPlans).await.unwrap().unwrap();

        let first: MealPlansDocument = serde_json::from_slice(&first).unwrap();
        let second: MealPlansDocument = serde_json::from_slice(&second).unwrap();
        assert_eq!(first.weekly_plans, second.weekly_plans);
        assert!(second.last_updated.is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_degrades_to_session_only() {
        let store = Arc::new(FlakyStore::default());
        let persistence = Persistence::new(Some(store.clone()));
        let mut session = planned_session();
        persistence.load_into(&mut session, week()).await;
        store.writes_fail.store(true, Ordering::SeqCst);

        let status = persistence.save_plans(&mut session, week()).await;

        assert!(matches!(status, StorageStatus::SessionOnly { .. }));
        assert_eq!(planner::recipes_for_week(&session.weekly_plans, week()).len(), 1);
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].text.contains("this session only"));

        // the next save retries once Drive answers again
        store.writes_fail.store(false, Ordering::SeqCst);
        assert_eq!(persistence.save_plans(&mut session, week()).await, StorageStatus::Drive);
    }

    #[tokio::test]
    async fn test_failed_load_never_overwrites_stored_plans() {
        let store = Arc::new(FlakyStore::default());
        let mut stored = SessionState::default();
        for name in ["Chili", "Soup", "Tacos"] {
            let recipe = Recipe::new(name, RecipeOrigin::Local);
            planner::add_to_week(&mut stored.weekly_plans, week(), &recipe);
        }
        let seeded = serde_json::to_vec(&meal_plans_document(&stored)).unwrap();
        store
            .inner
            .write_document(DocumentKind::MealPlans, &seeded)
            .await
            .unwrap();

        let persistence = Persistence::new(Some(store.clone()));
        let mut session = SessionState::default();
        store.reads_fail.store(true, Ordering::SeqCst);

        let status = persistence.load_into(&mut session, week()).await;
        assert!(matches!(status, StorageStatus::SessionOnly { .. }));
        assert!(!session.loaded_from_drive);
        assert!(persistence.awaiting_load(&session));

        planner::add_to_week(&mut session.weekly_plans, week(), &Recipe::new("New", RecipeOrigin::Local));
        let status = persistence.save_plans(&mut session, week()).await;
        assert!(matches!(status, StorageStatus::SessionOnly { .. }));
        assert!(persistence.save_recipes(&mut session).await != StorageStatus::Drive);

        let bytes = store.inner.read_document(DocumentKind::MealPlans).await.unwrap().unwrap();
        assert_eq!(stored_meal_names(&bytes), vec!["Chili", "Soup", "Tacos"]);
        assert_eq!(store.inner.len(), 1);

        // a successful reload brings the stored plans back and re-enables saving
        store.reads_fail.store(false, Ordering::SeqCst);
        assert_eq!(persistence.load_into(&mut session, week()).await, StorageStatus::Drive);
        assert_eq!(planner::recipes_for_week(&session.weekly_plans, week()).len(), 3);
        assert_eq!(persistence.save_plans(&mut session, week()).await, StorageStatus::Drive);
    }

    #[tokio::test]
    async fn test_current_week_list_is_restored_when_plans_lack_it() {
        let store = Arc::new(MemoryStore::new());
        let recipe = Recipe::new("Soup", RecipeOrigin::Local);
        let legacy = WeeklyRecipesDocument {
            current_week: vec![recipe.to_planned_meal()],
            ..Default::default()
        };
        store
            .write_document(DocumentKind::WeeklyRecipes, &serde_json::to_vec(&legacy).unwrap())
            .await
            .unwrap();

        let mut session = SessionState::default();
        Persistence::new(Some(store)).load_into(&mut session, week()).await;

        assert_eq!(planner::recipes_for_week(&session.weekly_plans, week())[0].recipe_name, "Soup");
    }

    #[tokio::test]
    async fn test_without_store_nothing_is_written() {
        let persistence = Persistence::session_only();
        let mut session = planned_session();

        assert_eq!(
            persistence.save_all(&mut session, week()).await,
            StorageStatus::NotConnected
        );
        assert!(session.take_notices().is_empty());
        assert!(!persistence.awaiting_load(&session));
        assert!(persistence.probe().await.is_err());
    }
}
