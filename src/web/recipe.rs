use crate::core::library;
use crate::core::planner;
use crate::core::scaling::{self, ScalingOptions};
use crate::domain::model::Recipe;
use crate::utils::error::{AppError, Result};
use crate::web::render::{self, escape};
use crate::web::session::{require_user, SessionHandle};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::{Extension, Form};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ScaleQuery {
    /// Index into the recipe's scaling options.
    pub scale: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AddToWeekForm {
    #[serde(default)]
    pub week: u32,
}

/// Selected option: explicit choice, then the remembered factor, then the default.
pub fn selected_scale(options: &ScalingOptions, requested: Option<usize>, remembered: Option<f64>) -> usize {
    if let Some(index) = requested.filter(|i| *i < options.options.len()) {
        return index;
    }
    remembered
        .and_then(|factor| {
            options
                .options
                .iter()
                .position(|o| (o.factor - factor).abs() < 1e-9)
        })
        .unwrap_or(options.default_index)
}

fn render_recipe(recipe: &Recipe, options: &ScalingOptions, selected: usize, labels: &[String]) -> String {
    let factor = options
        .options
        .get(selected)
        .map(|o| o.factor)
        .unwrap_or(1.0);

    let mut body = format!("<p>{}</p>", render::recipe_summary(recipe));
    if let Some(photo) = &recipe.photo_url {
        let _ = write!(body, "<img src=\"{}\" alt=\"\" style=\"max-width:320px\">", escape(photo));
    }
    if !recipe.description.is_empty() {
        let _ = write!(body, "<p>{}</p>", escape(&recipe.description));
    }
    let times: Vec<String> = [("Prep", recipe.prep_time), ("Cook", recipe.cook_time)]
        .into_iter()
        .filter_map(|(label, seconds)| seconds.map(|s| format!("{}: {} min", label, s / 60)))
        .collect();
    if !times.is_empty() {
        let _ = write!(body, "<p>{}</p>", times.join(" · "));
    }
    if !recipe.collections.is_empty() {
        let _ = write!(body, "<p>Categories: {}</p>", escape(&recipe.collections.join(", ")));
    }
    if let Some(source) = &recipe.source_url {
        let _ = write!(body, "<p><a href=\"{}\">Original recipe</a></p>", escape(source));
    }

    let _ = write!(
        body,
        "<form method=\"get\" action=\"/recipes/{}\">{} <select name=\"scale\">",
        escape(&recipe.id),
        options.prompt
    );
    for (i, option) in options.options.iter().enumerate() {
        let sel = if i == selected { " selected" } else { "" };
        let _ = write!(body, "<option value=\"{}\"{}>{}</option>", i, sel, escape(&option.label));
    }
    body.push_str("</select> <button type=\"submit\">Apply</button></form>");

    body.push_str("<h2>Ingredients</h2><ul>");
    for ingredient in &recipe.ingredients {
        let quantity = scaling::scale_quantity(&ingredient.quantity, factor);
        let _ = write!(body, "<li>{} {}", escape(&quantity), escape(&ingredient.name));
        if !ingredient.note.is_empty() {
            let _ = write!(body, " <em>({})</em>", escape(&ingredient.note));
        }
        body.push_str("</li>");
    }
    body.push_str("</ul><h2>Steps</h2><ol>");
    for step in &recipe.preparation_steps {
        let _ = write!(body, "<li>{}</li>", escape(step));
    }
    body.push_str("</ol>");

    let _ = write!(
        body,
        "<form method=\"post\" action=\"/recipes/{}/add\"><select name=\"week\">{}</select> \
         <button type=\"submit\">Add to week</button></form>",
        escape(&recipe.id),
        render::week_options(labels, 0)
    );
    body
}

pub async fn view_recipe(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path(id): Path<String>,
    Query(query): Query<ScaleQuery>,
) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    state.ensure_loaded(&mut session).await;

    let recipes = library::all_recipes(&session);
    let recipe = library::find_recipe(&recipes, &id).ok_or_else(|| AppError::NotFound {
        what: format!("Recipe {}", id),
    })?;

    let options = scaling::scaling_options(recipe.servings.as_deref());
    let selected = selected_scale(&options, query.scale, session.scale_factors.get(&id).copied());
    if let Some(option) = options.options.get(selected) {
        session.scale_factors.insert(id.clone(), option.factor);
    }

    let body = render_recipe(recipe, &options, selected, &state.week_labels());
    let title = recipe.name.clone();
    Ok(render::page(&title, "/recipes", &mut session, &body))
}

pub async fn add_to_week(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path(id): Path<String>,
    Form(form): Form<AddToWeekForm>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;

    let recipes = library::all_recipes(&session);
    let recipe = library::find_recipe(&recipes, &id).ok_or_else(|| AppError::NotFound {
        what: format!("Recipe {}", id),
    })?;
    let (offset, week) = state.week_for_offset(form.week);

    planner::add_to_week(&mut session.weekly_plans, week, recipe);
    let label = state
        .week_labels()
        .into_iter()
        .nth(offset as usize)
        .unwrap_or_else(|| week.to_string());
    session.success(format!("Added {} to {}", recipe.name, label));

    let persistence = state.persistence(&mut session).await;
    persistence.save_plans(&mut session, state.current_week()).await;
    Ok(Redirect::to(&format!("/recipes/{}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Ingredient, RecipeOrigin};

    #[test]
    fn test_selected_scale_precedence() {
        let options = scaling::scaling_options(Some("4"));
        assert_eq!(selected_scale(&options, None, None), 3);
        assert_eq!(selected_scale(&options, Some(7), Some(0.5)), 7);
        assert_eq!(selected_scale(&options, None, Some(0.5)), 1);
        assert_eq!(selected_scale(&options, Some(99), None), 3);
    }

    #[test]
    fn test_render_recipe_scales_ingredients() {
        let mut recipe = Recipe::new("Pancakes", RecipeOrigin::Local);
        recipe.servings = Some("2".to_string());
        recipe.ingredients = vec![Ingredient::new("milk", "3 dl")];
        let options = scaling::scaling_options(Some("2"));

        // index 3 is "4 servings", double the original
        let html = render_recipe(&recipe, &options, 3, &["This Week".to_string()]);
        assert!(html.contains("6 dl milk"));
        assert!(html.contains("Scale to:"));
    }

    #[test]
    fn test_cook_time_shown_without_prep_time() {
        let mut recipe = Recipe::new("Stew", RecipeOrigin::Local);
        recipe.cook_time = Some(5400);
        let options = scaling::scaling_options(None);

        let html = render_recipe(&recipe, &options, 3, &[]);
        assert!(html.contains("<p>Cook: 90 min</p>"));
        assert!(!html.contains("Prep:"));

        recipe.prep_time = Some(600);
        let html = render_recipe(&recipe, &options, 3, &[]);
        assert!(html.contains("<p>Prep: 10 min · Cook: 90 min</p>"));
    }
}
