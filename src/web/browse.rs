use crate::core::library::{self, RecipeFilter, SourceFilter};
use crate::domain::model::{Ingredient, Recipe, RecipeOrigin};
use crate::utils::error::{AppError, Result};
use crate::web::render::{self, escape};
use crate::web::session::{require_user, SessionHandle};
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use axum::{Extension, Form};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub search: String,
    /// Comma separated.
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub source: String,
    /// One-based.
    #[serde(default)]
    pub page: Option<usize>,
}

impl BrowseQuery {
    pub fn filter(&self) -> RecipeFilter {
        RecipeFilter {
            search: self.search.clone(),
            categories: split_list(&self.categories),
            source: SourceFilter::parse(&self.source),
        }
    }

    fn url_for_page(&self, page: usize) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("search", &self.search)
            .append_pair("categories", &self.categories)
            .append_pair("source", &self.source)
            .append_pair("page", &page.to_string())
            .finish();
        format!("/recipes?{}", query)
    }
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn source_options(selected: &str) -> String {
    ["All", "AnyList", "Local", "Default"]
        .iter()
        .map(|label| {
            let sel = if SourceFilter::parse(selected).label() == *label {
                " selected"
            } else {
                ""
            };
            format!("<option{}>{}</option>", sel, label)
        })
        .collect()
}

fn add_to_week_form(recipe_id: &str, labels: &[String]) -> String {
    format!(
        "<form class=\"inline\" method=\"post\" action=\"/recipes/{}/add\">\
         <select name=\"week\">{}</select> <button type=\"submit\">Add to week</button></form>",
        escape(recipe_id),
        render::week_options(labels, 0)
    )
}

pub async fn browse(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<BrowseQuery>,
) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    state.ensure_loaded(&mut session).await;

    let recipes = library::all_recipes(&session);
    let filtered = library::filter_recipes(&recipes, &query.filter());
    let page = library::paginate(
        &filtered,
        query.page.unwrap_or(1).saturating_sub(1),
        state.config.recipes_per_page(),
    );
    let labels = state.week_labels();

    let mut body = format!(
        "<form method=\"get\" action=\"/recipes\" class=\"card\">\
         <input name=\"search\" placeholder=\"Search name, ingredient or category\" value=\"{}\"> \
         <input name=\"categories\" placeholder=\"Categories, comma separated\" value=\"{}\"> \
         <select name=\"source\">{}</select> <button type=\"submit\">Filter</button></form>",
        escape(&query.search),
        escape(&query.categories),
        source_options(&query.source)
    );

    let categories = library::all_categories(&recipes);
    if !categories.is_empty() {
        body.push_str("<p>Categories: ");
        for category in &categories {
            let link = BrowseQuery {
                categories: category.clone(),
                ..Default::default()
            }
            .url_for_page(1);
            let _ = write!(body, "<a class=\"badge\" href=\"{}\">{}</a>", escape(&link), escape(category));
        }
        body.push_str("</p>");
    }

    body.push_str("<p><a href=\"/recipes/new\">+ Add a recipe</a></p>");

    if page.total == 0 {
        body.push_str("<p>No recipes match these filters.</p>");
    } else {
        let _ = write!(
            body,
            "<p>Showing {}-{} of {} recipes</p>",
            page.showing_start, page.showing_end, page.total
        );
        for recipe in &page.items {
            let _ = write!(
                body,
                "<div class=\"card\">{}<br>{}</div>",
                render::recipe_summary(recipe),
                add_to_week_form(&recipe.id, &labels)
            );
        }
        if page.has_previous() {
            let _ = write!(body, "<a href=\"{}\">← Previous</a> ", escape(&query.url_for_page(page.page)));
        }
        let _ = write!(body, "Page {} of {}", page.page + 1, page.total_pages);
        if page.has_next() {
            let _ = write!(body, " <a href=\"{}\">Next →</a>", escape(&query.url_for_page(page.page + 2)));
        }
    }

    Ok(render::page("Browse Recipes", "/recipes", &mut session, &body))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewRecipeForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prep_minutes: String,
    #[serde(default)]
    pub cook_minutes: String,
    #[serde(default)]
    pub servings: String,
    /// One per line, `quantity | name | note`.
    #[serde(default)]
    pub ingredients: String,
    /// One per line.
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub collections: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub rating: String,
    /// Checkbox; present when ticked.
    #[serde(default)]
    pub push_to_anylist: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn minutes_to_seconds(field: &str, value: &str) -> Result<Option<u32>> {
    let text = value.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .map(Some)
        .ok_or_else(|| AppError::ValidationError {
            message: format!("{} must be a whole number of minutes", field),
        })
}

pub fn parse_ingredient_line(line: &str) -> Option<Ingredient> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    let ingredient = match parts.as_slice() {
        [name] => Ingredient::new(*name, ""),
        [quantity, name] => Ingredient::new(*name, *quantity),
        [quantity, name, note, ..] => Ingredient {
            name: name.to_string(),
            quantity: quantity.to_string(),
            note: note.to_string(),
        },
        [] => return None,
    };
    (!ingredient.name.is_empty()).then_some(ingredient)
}

impl NewRecipeForm {
    pub fn into_recipe(self) -> Result<Recipe> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError {
                message: "Recipe name is required".to_string(),
            });
        }

        let mut recipe = Recipe::new(name, RecipeOrigin::Local);
        recipe.description = self.description.trim().to_string();
        recipe.prep_time = minutes_to_seconds("Prep time", &self.prep_minutes)?;
        recipe.cook_time = minutes_to_seconds("Cook time", &self.cook_minutes)?;
        recipe.servings = non_empty(&self.servings);
        recipe.rating = match self.rating.trim() {
            "" => 0,
            text => text
                .parse::<u8>()
                .ok()
                .filter(|r| *r <= 5)
                .ok_or_else(|| AppError::ValidationError {
                    message: "Rating must be between 0 and 5".to_string(),
                })?,
        };
        recipe.ingredients = self
            .ingredients
            .lines()
            .filter_map(parse_ingredient_line)
            .collect();
        recipe.preparation_steps = self
            .steps
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        recipe.collections = split_list(&self.collections);
        recipe.photo_url = non_empty(&self.photo_url);
        recipe.source_url = non_empty(&self.source_url);
        Ok(recipe)
    }
}

const NEW_RECIPE_FORM: &str = "<form method=\"post\" action=\"/recipes/new\" class=\"card\">\
<p><label>Name <input name=\"name\" required></label></p>\
<p><label>Description<br><textarea name=\"description\" rows=\"2\" cols=\"60\"></textarea></label></p>\
<p><label>Prep (min) <input name=\"prep_minutes\" size=\"4\"></label> \
<label>Cook (min) <input name=\"cook_minutes\" size=\"4\"></label> \
<label>Servings <input name=\"servings\" size=\"4\"></label> \
<label>Rating <input name=\"rating\" size=\"2\" placeholder=\"0-5\"></label></p>\
<p><label>Ingredients, one per line as <code>quantity | name | note</code><br>\
<textarea name=\"ingredients\" rows=\"6\" cols=\"60\"></textarea></label></p>\
<p><label>Steps, one per line<br><textarea name=\"steps\" rows=\"6\" cols=\"60\"></textarea></label></p>\
<p><label>Categories <input name=\"collections\" placeholder=\"Dinner, Vegetarian\"></label></p>\
<p><label>Photo URL <input name=\"photo_url\"></label> <label>Source URL <input name=\"source_url\"></label></p>\
<p><label><input type=\"checkbox\" name=\"push_to_anylist\" value=\"on\"> Also create in AnyList</label></p>\
<button type=\"submit\">Save recipe</button></form>";

pub async fn new_recipe_form(Extension(handle): Extension<SessionHandle>) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    Ok(render::page("Add a Recipe", "/recipes", &mut session, NEW_RECIPE_FORM))
}

pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Form(form): Form<NewRecipeForm>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;

    let push = form.push_to_anylist.is_some();
    let recipe = match form.into_recipe() {
        Ok(recipe) => recipe,
        Err(e) => {
            session.error(e.user_friendly_message());
            return Ok(Redirect::to("/recipes/new"));
        }
    };
    let id = recipe.id.clone();

    if push {
        match state.anylist_credentials(&session) {
            Some(creds) => match state.provider.create_recipe(&creds, &recipe).await {
                Ok(_) => session.success(format!("Created {} in AnyList", recipe.name)),
                Err(e) => {
                    tracing::warn!("AnyList recipe creation failed: {}", e);
                    session.warning(format!("Saved locally; AnyList said: {}", e));
                }
            },
            None => session.warning("Connect AnyList in Settings to create recipes there."),
        }
    }

    tracing::info!("Added local recipe {}", recipe.name);
    session.success(format!("Saved {}", recipe.name));
    session.local_recipes.push(recipe);
    let persistence = state.persistence(&mut session).await;
    persistence.save_recipes(&mut session).await;

    Ok(Redirect::to(&format!("/recipes/{}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingredient_line() {
        assert_eq!(
            parse_ingredient_line("2 cups | flour"),
            Some(Ingredient::new("flour", "2 cups"))
        );
        assert_eq!(parse_ingredient_line("salt"), Some(Ingredient::new("salt", "")));
        let full = parse_ingredient_line("1 | onion | diced").unwrap();
        assert_eq!(full.note, "diced");
        assert!(parse_ingredient_line("   ").is_none());
    }

    #[test]
    fn test_form_into_recipe() {
        let form = NewRecipeForm {
            name: "  Lentil Soup ".to_string(),
            prep_minutes: "10".to_string(),
            servings: "4".to_string(),
            ingredients: "1 cup | lentils\n\n2 | carrots".to_string(),
            steps: "Rinse\n Simmer \n".to_string(),
            collections: "Soup, Vegetarian".to_string(),
            ..Default::default()
        };
        let recipe = form.into_recipe().unwrap();
        assert_eq!(recipe.name, "Lentil Soup");
        assert_eq!(recipe.source, RecipeOrigin::Local);
        assert_eq!(recipe.prep_time, Some(600));
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.preparation_steps, vec!["Rinse", "Simmer"]);
        assert_eq!(recipe.collections, vec!["Soup", "Vegetarian"]);
    }

    #[test]
    fn test_form_rejects_bad_input() {
        let blank = NewRecipeForm::default();
        assert!(matches!(
            blank.into_recipe(),
            Err(AppError::ValidationError { .. })
        ));

        let bad_time = NewRecipeForm {
            name: "Toast".to_string(),
            cook_minutes: "soon".to_string(),
            ..Default::default()
        };
        assert!(bad_time.into_recipe().is_err());

        let too_long = NewRecipeForm {
            name: "Toast".to_string(),
            prep_minutes: "99999999".to_string(),
            ..Default::default()
        };
        match too_long.into_recipe() {
            Err(AppError::ValidationError { message }) => assert!(message.starts_with("Prep time")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_browse_query_filter() {
        let query = BrowseQuery {
            categories: "Dinner, ,Quick".to_string(),
            source: "AnyList".to_string(),
            ..Default::default()
        };
        let filter = query.filter();
        assert_eq!(filter.categories, vec!["Dinner", "Quick"]);
        assert_eq!(filter.source, SourceFilter::Only(RecipeOrigin::AnyList));
        assert!(query.url_for_page(2).contains("page=2"));
    }
}
