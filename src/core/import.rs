use crate::domain::model::{Recipe, RecipeOrigin};
use crate::domain::ports::{AnyListCredentials, RecipeProvider};
use crate::utils::error::{AppError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;

const COLLECTION_HEADER_MARKER: &str = "AnyList Recipe Collection";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_recipes: usize,
    pub filtered_out: usize,
    pub recipes_with_photos: usize,
    pub recipes_with_ingredients: usize,
    pub recipes_with_steps: usize,
    pub recipes_with_rating: usize,
}

impl ImportSummary {
    pub fn describe(&self) -> String {
        format!(
            "Imported {} recipes ({} with photos, {} with ingredients, {} with steps, {} rated)",
            self.total_recipes,
            self.recipes_with_photos,
            self.recipes_with_ingredients,
            self.recipes_with_steps,
            self.recipes_with_rating
        )
    }
}

pub fn is_collection_header(recipe: &Recipe) -> bool {
    recipe.name.trim().is_empty() || recipe.name.contains(COLLECTION_HEADER_MARKER)
}

/// Drops collection headers and counts what is left.
pub fn clean_import(fetched: Vec<Recipe>) -> (Vec<Recipe>, ImportSummary) {
    let fetched_count = fetched.len();
    let recipes: Vec<Recipe> = fetched
        .into_iter()
        .filter(|r| !is_collection_header(r))
        .collect();

    let summary = ImportSummary {
        total_recipes: recipes.len(),
        filtered_out: fetched_count - recipes.len(),
        recipes_with_photos: recipes.iter().filter(|r| r.photo_url.is_some()).count(),
        recipes_with_ingredients: recipes.iter().filter(|r| !r.ingredients.is_empty()).count(),
        recipes_with_steps: recipes
            .iter()
            .filter(|r| !r.preparation_steps.is_empty())
            .count(),
        recipes_with_rating: recipes.iter().filter(|r| r.rating > 0).count(),
    };
    (recipes, summary)
}

/// Logs in and pulls every recipe from the provider.
pub async fn sync_from_provider(
    provider: &dyn RecipeProvider,
    credentials: &AnyListCredentials,
    max_recipes: Option<usize>,
) -> Result<(Vec<Recipe>, ImportSummary)> {
    if !provider.is_available().await {
        return Err(AppError::external("AnyList", "Node.js is not available"));
    }

    provider.login(credentials).await?;
    let fetched = provider.fetch_recipes(credentials, max_recipes).await?;
    let (recipes, summary) = clean_import(fetched);

    tracing::info!(
        "Synced {} recipes from AnyList (filtered out {} non-recipe entries)",
        summary.total_recipes,
        summary.filtered_out
    );
    Ok((recipes, summary))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportInfo {
    pub exported_at: String,
    pub exported_from: String,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DefaultRecipesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_info: Option<ExportInfo>,
    #[serde(default)]
    recipes: Vec<Recipe>,
}

/// Reads the bundled default recipes; every entry is tagged `Default`.
pub fn load_default_recipes(path: impl AsRef<Path>) -> Result<Vec<Recipe>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file: DefaultRecipesFile = serde_json::from_str(&content)?;

    let recipes: Vec<Recipe> = file
        .recipes
        .into_iter()
        .filter(|r| !is_collection_header(r))
        .map(|mut r| {
            r.source = RecipeOrigin::Builtin;
            r
        })
        .collect();
    tracing::info!("Loaded {} default recipes from {}", recipes.len(), path.display());
    Ok(recipes)
}

pub fn write_default_recipes(
    path: impl AsRef<Path>,
    recipes: &[Recipe],
    summary: &ImportSummary,
    exported_from: &str,
) -> Result<()> {
    let path = path.as_ref();
    let file = DefaultRecipesFile {
        export_info: Some(ExportInfo {
            exported_at: Local::now().to_rfc3339(),
            exported_from: exported_from.to_string(),
            summary: summary.clone(),
        }),
        recipes: recipes.to_vec(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
    tracing::info!("Wrote {} recipes to {}", recipes.len(), path.display());
    Ok(())
}
