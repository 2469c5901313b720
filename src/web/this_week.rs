use crate::core::export;
use crate::core::library;
use crate::core::planner::{self, ResolvedMeal};
use crate::core::session::SessionState;
use crate::domain::model::{Recipe, WeekKey};
use crate::utils::error::Result;
use crate::web::render::{self, escape, post_button};
use crate::web::session::{require_user, SessionHandle};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub week: u32,
}

fn week_url(offset: u32) -> String {
    format!("/this-week?week={}", offset)
}

/// Fills an empty week with random recipes. Returns how many were added.
async fn populate(state: &AppState, session: &mut SessionState, week: WeekKey) -> usize {
    let available = library::all_recipes(session);
    let count = session.meals_per_week;
    let added = {
        let mut rng = rand::thread_rng();
        planner::populate_week_random(&mut session.weekly_plans, week, &available, count, &mut rng)
    };
    if added > 0 {
        let persistence = state.persistence(session).await;
        persistence.save_plans(session, state.current_week()).await;
    }
    added
}

fn render_meals(body: &mut String, offset: u32, meals: &[ResolvedMeal<'_>]) {
    for (index, meal) in meals.iter().enumerate() {
        let remove = post_button(
            &format!("/this-week/{}/remove/{}", offset, index),
            "Remove",
        );
        let line = match meal {
            ResolvedMeal::Found(recipe) => render::recipe_summary(recipe),
            ResolvedMeal::Missing(planned) => format!(
                "<em>{}</em> (no longer in your library)",
                escape(if planned.recipe_name.is_empty() {
                    &planned.recipe_id
                } else {
                    &planned.recipe_name
                })
            ),
        };
        let _ = write!(
            body,
            "<div class=\"card\">Meal {}: {} {}</div>",
            index + 1,
            line,
            remove
        );
    }
}

pub async fn this_week(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<WeekQuery>,
) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    state.ensure_loaded(&mut session).await;

    let (offset, week) = state.week_for_offset(query.week);
    let labels = state.week_labels();

    if state.config.auto_populate() && !planner::has_recipes_for_week(&session.weekly_plans, week) {
        let added = populate(&state, &mut session, week).await;
        if added > 0 {
            session.info(format!("Picked {} random recipes for {}", added, labels[offset as usize]));
        }
    }

    let recipes = library::all_recipes(&session);
    let planned = planner::recipes_for_week(&session.weekly_plans, week).to_vec();
    let resolved = planner::resolve_meals(&planned, &recipes);

    let mut body = String::from("<div class=\"tabs\">");
    for (i, label) in labels.iter().enumerate() {
        let class = if i as u32 == offset { " class=\"active\"" } else { "" };
        let _ = write!(body, "<a href=\"{}\"{}>{}</a>", week_url(i as u32), class, escape(label));
    }
    body.push_str("</div>");
    let _ = write!(body, "<h2>{}</h2>", escape(&labels[offset as usize]));

    if resolved.is_empty() {
        if recipes.is_empty() {
            body.push_str(
                "<p>No recipes available yet. Sync AnyList from <a href=\"/settings\">Settings</a> \
                 or <a href=\"/recipes/new\">add a recipe</a>.</p>",
            );
        } else {
            body.push_str("<p>No meals planned for this week.</p>");
            body.push_str(&post_button(
                &format!("/this-week/{}/populate", offset),
                "Pick random recipes",
            ));
        }
    } else {
        render_meals(&mut body, offset, &resolved);
        body.push_str(&post_button(
            &format!("/this-week/{}/clear", offset),
            "Clear week",
        ));
        let _ = write!(
            body,
            " <a href=\"/this-week/{}/shopping-list.csv\">Download shopping list</a>",
            offset
        );
    }
    body.push_str(" <a href=\"/recipes\">Browse recipes</a>");

    Ok(render::page("This Week", "/this-week", &mut session, &body))
}

pub async fn populate_week(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path(offset): Path<u32>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let (offset, week) = state.week_for_offset(offset);

    let added = populate(&state, &mut session, week).await;
    if added == 0 {
        session.warning("No recipes available to pick from.");
    } else {
        session.success(format!("Added {} random recipes", added));
    }
    Ok(Redirect::to(&week_url(offset)))
}

pub async fn clear_week(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path(offset): Path<u32>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let (offset, week) = state.week_for_offset(offset);

    let removed = planner::clear_week(&mut session.weekly_plans, week);
    let persistence = state.persistence(&mut session).await;
    persistence.save_plans(&mut session, state.current_week()).await;
    session.info(format!("Removed {} meals", removed));
    Ok(Redirect::to(&week_url(offset)))
}

pub async fn remove_meal(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path((offset, index)): Path<(u32, usize)>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;
    let (offset, week) = state.week_for_offset(offset);

    match planner::remove_from_week(&mut session.weekly_plans, week, index) {
        Some(meal) => {
            let persistence = state.persistence(&mut session).await;
            persistence.save_plans(&mut session, state.current_week()).await;
            session.success(format!("Removed {}", meal.recipe_name));
        }
        None => session.warning("That meal is no longer in the plan."),
    }
    Ok(Redirect::to(&week_url(offset)))
}

pub async fn shopping_list(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Path(offset): Path<u32>,
) -> Result<Response> {
    let session = handle.lock().await;
    require_user(&session)?;
    let (_, week) = state.week_for_offset(offset);

    let recipes = library::all_recipes(&session);
    let resolved = planner::resolve_meals(
        planner::recipes_for_week(&session.weekly_plans, week),
        &recipes,
    );
    let planned: Vec<&Recipe> = resolved
        .iter()
        .filter_map(|meal| match meal {
            ResolvedMeal::Found(recipe) => Some(*recipe),
            ResolvedMeal::Missing(_) => None,
        })
        .collect();

    let csv = export::shopping_list_csv(&planned)?;
    let disposition = format!("attachment; filename=\"shopping-list-{}.csv\"", week);
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
