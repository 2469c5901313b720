use crate::domain::model::{DocumentKind, Recipe};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whole-file JSON persistence. Writes overwrite; last write wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_document(&self, kind: DocumentKind) -> Result<Option<Vec<u8>>>;
    async fn write_document(&self, kind: DocumentKind, data: &[u8]) -> Result<()>;
    async fn delete_all(&self) -> Result<()>;
    /// Cheap round trip used by the "test connection" button.
    async fn probe(&self) -> Result<()>;
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyListCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShoppingList {
    #[serde(default, alias = "identifier")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Third-party recipe service reached through the subprocess bridge.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn login(&self, credentials: &AnyListCredentials) -> Result<String>;
    async fn fetch_recipes(
        &self,
        credentials: &AnyListCredentials,
        max_recipes: Option<usize>,
    ) -> Result<Vec<Recipe>>;
    async fn fetch_recipe(&self, credentials: &AnyListCredentials, id: &str) -> Result<Option<Recipe>>;
    async fn collections(&self, credentials: &AnyListCredentials) -> Result<Vec<String>>;
    async fn lists(&self, credentials: &AnyListCredentials) -> Result<Vec<ShoppingList>>;
    async fn create_recipe(&self, credentials: &AnyListCredentials, recipe: &Recipe) -> Result<Recipe>;
}
