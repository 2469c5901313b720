//! AnyList access through the Node.js bridge script.
//!
//! The bridge is invoked as
//! `<node> <script> <command> <email> <password> [payload]` and answers with a
//! single JSON object on stdout: `{"success": true, ...}` or
//! `{"success": false, "error": "..."}`. Anything else printed by the script
//! (npm warnings, debug output) is ignored.

use crate::config::AppConfig;
use crate::domain::model::{Ingredient, Recipe, RecipeOrigin};
use crate::domain::ports::{AnyListCredentials, RecipeProvider, ShoppingList};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;

const SERVICE: &str = "AnyList";
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    Login,
    FetchRecipes,
    FetchRecipe,
    GetLists,
    GetCollections,
    CreateRecipe,
}

impl BridgeCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeCommand::Login => "login",
            BridgeCommand::FetchRecipes => "fetch-recipes",
            BridgeCommand::FetchRecipe => "fetch-recipe",
            BridgeCommand::GetLists => "get-lists",
            BridgeCommand::GetCollections => "get-collections",
            BridgeCommand::CreateRecipe => "create-recipe",
        }
    }
}

/// Last line of `text` that looks like, and parses as, a JSON object.
fn last_json_line(text: &str) -> Option<Value> {
    text.lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
}

/// Picks the bridge's JSON answer out of its output, preferring stdout.
pub fn parse_bridge_response(stdout: &str, stderr: &str) -> Result<Value> {
    if let Some(value) = last_json_line(stdout).or_else(|| last_json_line(stderr)) {
        return Ok(value);
    }

    if !stdout.is_empty() {
        tracing::debug!("Bridge stdout tail: {}", tail(stdout, 200));
    }
    if !stderr.is_empty() {
        tracing::debug!("Bridge stderr tail: {}", tail(stderr, 200));
    }

    let message = if stdout.trim().is_empty() && stderr.trim().is_empty() {
        "No response from bridge"
    } else {
        "No valid JSON response from bridge"
    };
    Err(AppError::external(SERVICE, message))
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

fn error_field(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Spawns the bridge script and turns its answer into a `Result`.
pub struct NodeBridge {
    node_binary: String,
    script: PathBuf,
    timeout: Duration,
    node_available: OnceCell<bool>,
}

impl NodeBridge {
    pub fn new(node_binary: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            node_binary: node_binary.into(),
            script: script.into(),
            timeout,
            node_available: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.node_binary(),
            config.bridge_script(),
            config.bridge_timeout(),
        )
    }

    /// `node --version`, checked once per process.
    pub async fn node_available(&self) -> bool {
        *self
            .node_available
            .get_or_init(|| async {
                let output = tokio::time::timeout(
                    VERSION_CHECK_TIMEOUT,
                    Command::new(&self.node_binary)
                        .arg("--version")
                        .stdout(Stdio::piped())
                        .stderr(Stdio::piped())
                        .kill_on_drop(true)
                        .output(),
                )
                .await;

                match output {
                    Ok(Ok(output)) if output.status.success() => {
                        tracing::info!(
                            "Node.js version: {}",
                            String::from_utf8_lossy(&output.stdout).trim()
                        );
                        true
                    }
                    Ok(Ok(output)) => {
                        tracing::warn!("Node.js check exited with {}", output.status);
                        false
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Node.js is not installed or not in PATH: {}", e);
                        false
                    }
                    Err(_) => {
                        tracing::warn!("Node.js version check timed out");
                        false
                    }
                }
            })
            .await
    }

    pub async fn run(
        &self,
        command: BridgeCommand,
        credentials: &AnyListCredentials,
        payload: Option<&str>,
    ) -> Result<Value> {
        if !self.node_available().await {
            return Err(AppError::external(SERVICE, "Node.js is not available"));
        }

        tracing::debug!(
            "Running bridge command {} with {}",
            command.as_str(),
            self.script.display()
        );

        let mut cmd = Command::new(&self.node_binary);
        cmd.arg(&self.script)
            .arg(command.as_str())
            .arg(&credentials.email)
            .arg(&credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(payload) = payload {
            cmd.arg(payload);
        }

        let child = cmd.spawn().map_err(|e| {
            AppError::external(SERVICE, format!("failed to start bridge: {}", e))
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    "Bridge command {} timed out after {:?}",
                    command.as_str(),
                    self.timeout
                );
                return Err(AppError::external(
                    SERVICE,
                    format!("bridge timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let response = parse_bridge_response(&stdout, &stderr)?;

        let succeeded = response.get("success").and_then(Value::as_bool) == Some(true);
        if !output.status.success() || !succeeded {
            let message = error_field(&response).unwrap_or_else(|| match output.status.code() {
                Some(code) if code != 0 => format!("bridge exited with code {}", code),
                _ => "Unknown error".to_string(),
            });
            tracing::error!("Bridge command {} failed: {}", command.as_str(), message);
            return Err(AppError::external(SERVICE, message));
        }

        Ok(response)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgePhoto {
    #[serde(default)]
    has_photo: bool,
    url: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeIngredient {
    raw_ingredient: Option<String>,
    name: Option<String>,
    quantity: Option<String>,
    note: Option<String>,
}

impl BridgeIngredient {
    fn into_ingredient(self) -> Option<Ingredient> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or(self.raw_ingredient)?;
        Some(Ingredient {
            name,
            quantity: self.quantity.unwrap_or_default(),
            note: self.note.unwrap_or_default(),
        })
    }
}

/// Recipe as the bridge prints it (camelCase, AnyList field names).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeRecipe {
    identifier: Option<String>,
    id: Option<String>,
    name: Option<String>,
    note: Option<String>,
    description: Option<String>,
    prep_time: Option<f64>,
    cook_time: Option<f64>,
    servings: Option<Value>,
    rating: Option<f64>,
    source_url: Option<String>,
    ingredients: Option<Vec<BridgeIngredient>>,
    preparation_steps: Option<Vec<String>>,
    photo: Option<BridgePhoto>,
    photo_url: Option<String>,
    collections: Option<Vec<Value>>,
    tags: Option<Vec<String>>,
}

fn value_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn servings_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl BridgeRecipe {
    fn into_recipe(self) -> Recipe {
        let mut recipe = Recipe::new(self.name.unwrap_or_default(), RecipeOrigin::AnyList);
        if let Some(id) = self.identifier.or(self.id) {
            recipe.id = id;
        }
        recipe.description = self.description.or(self.note).unwrap_or_default();
        recipe.prep_time = self.prep_time.map(|t| t.max(0.0) as u32);
        recipe.cook_time = self.cook_time.map(|t| t.max(0.0) as u32);
        recipe.servings = self.servings.as_ref().and_then(servings_text);
        recipe.rating = self.rating.map(|r| r.clamp(0.0, 5.0).round() as u8).unwrap_or(0);
        recipe.source_url = self.source_url.filter(|u| !u.is_empty());
        recipe.ingredients = self
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .filter_map(BridgeIngredient::into_ingredient)
            .collect();
        recipe.preparation_steps = self
            .preparation_steps
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        recipe.photo_url = self.photo_url.or_else(|| {
            self.photo
                .filter(|p| p.has_photo)
                .and_then(|p| p.url.or_else(|| p.urls.into_iter().next()))
        });
        recipe.collections = self
            .collections
            .unwrap_or_default()
            .iter()
            .filter_map(value_name)
            .collect();
        recipe.tags = self.tags.unwrap_or_default();
        recipe
    }
}

/// Converts one bridge recipe object into a [`Recipe`] tagged as AnyList.
pub fn normalize_recipe(value: Value) -> Result<Recipe> {
    let raw: BridgeRecipe = serde_json::from_value(value)?;
    Ok(raw.into_recipe())
}

pub struct AnyListClient {
    bridge: NodeBridge,
    enabled: bool,
}

impl AnyListClient {
    pub fn new(bridge: NodeBridge, enabled: bool) -> Self {
        Self { bridge, enabled }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(NodeBridge::from_config(config), config.anylist_enabled())
    }

    async fn run(
        &self,
        command: BridgeCommand,
        credentials: &AnyListCredentials,
        payload: Option<&str>,
    ) -> Result<Value> {
        if !self.enabled {
            return Err(AppError::external(SERVICE, "integration is disabled"));
        }
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AppError::ValidationError {
                message: "Email and password are required".to_string(),
            });
        }
        self.bridge.run(command, credentials, payload).await
    }
}

#[async_trait]
impl RecipeProvider for AnyListClient {
    async fn is_available(&self) -> bool {
        self.enabled && self.bridge.node_available().await
    }

    async fn login(&self, credentials: &AnyListCredentials) -> Result<String> {
        tracing::info!("Logging in to AnyList...");
        let response = self.run(BridgeCommand::Login, credentials, None).await?;
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Successfully logged in")
            .to_string();
        tracing::info!("✅ {}", message);
        Ok(message)
    }

    async fn fetch_recipes(
        &self,
        credentials: &AnyListCredentials,
        max_recipes: Option<usize>,
    ) -> Result<Vec<Recipe>> {
        tracing::info!("Fetching recipes from AnyList...");
        let mut response = self.run(BridgeCommand::FetchRecipes, credentials, None).await?;

        let raw = match response.get_mut("recipes").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let limit = max_recipes.unwrap_or(usize::MAX);
        let recipes = raw
            .into_iter()
            .take(limit)
            .map(normalize_recipe)
            .collect::<Result<Vec<_>>>()?;

        let with_photos = recipes.iter().filter(|r| r.photo_url.is_some()).count();
        tracing::info!(
            "✅ Fetched {} recipes from AnyList ({} with photos)",
            recipes.len(),
            with_photos
        );
        Ok(recipes)
    }

    async fn fetch_recipe(&self, credentials: &AnyListCredentials, id: &str) -> Result<Option<Recipe>> {
        tracing::info!("Fetching recipe {} from AnyList...", id);
        let mut response = self
            .run(BridgeCommand::FetchRecipe, credentials, Some(id))
            .await?;
        match response.get_mut("recipe").map(Value::take) {
            Some(value) if value.is_object() => normalize_recipe(value).map(Some),
            _ => Ok(None),
        }
    }

    async fn collections(&self, credentials: &AnyListCredentials) -> Result<Vec<String>> {
        let response = self
            .run(BridgeCommand::GetCollections, credentials, None)
            .await?;
        let names: Vec<String> = response
            .get("collections")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(value_name).collect())
            .unwrap_or_default();
        tracing::info!("✅ Found {} collections", names.len());
        Ok(names)
    }

    async fn lists(&self, credentials: &AnyListCredentials) -> Result<Vec<ShoppingList>> {
        let mut response = self.run(BridgeCommand::GetLists, credentials, None).await?;
        let lists: Vec<ShoppingList> = match response.get_mut("lists").map(Value::take) {
            Some(value @ Value::Array(_)) => serde_json::from_value(value)?,
            _ => Vec::new(),
        };
        tracing::info!("✅ Found {} lists", lists.len());
        Ok(lists)
    }

    async fn create_recipe(&self, credentials: &AnyListCredentials, recipe: &Recipe) -> Result<Recipe> {
        tracing::info!("Creating recipe: {}", recipe.name);
        let payload = serde_json::to_string(recipe)?;
        let mut response = self
            .run(BridgeCommand::CreateRecipe, credentials, Some(&payload))
            .await?;

        match response.get_mut("recipe").map(Value::take) {
            Some(value) if value.is_object() => normalize_recipe(value),
            _ => {
                let mut created = recipe.clone();
                created.source = RecipeOrigin::AnyList;
                Ok(created)
            }
        }
    }
}
