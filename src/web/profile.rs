use crate::utils::error::{AppError, Result};
use crate::web::render::{self, escape};
use crate::web::session::{require_user, SessionHandle};
use crate::web::state::AppState;
use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::{Extension, Form};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

pub const MAX_MEALS_PER_WEEK: usize = 14;

#[derive(Debug, Deserialize)]
pub struct MealsPerWeekForm {
    pub meals_per_week: String,
}

pub fn parse_meals_per_week(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=MAX_MEALS_PER_WEEK).contains(n))
        .ok_or_else(|| AppError::ValidationError {
            message: format!("Meals per week must be between 1 and {}", MAX_MEALS_PER_WEEK),
        })
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Html<String>> {
    let mut session = handle.lock().await;
    let user = require_user(&session)?.clone();

    let mut body = String::from("<div class=\"card\">");
    if let Some(picture) = &user.picture {
        let _ = write!(body, "<img src=\"{}\" alt=\"\" width=\"64\" height=\"64\"> ", escape(picture));
    }
    let _ = write!(
        body,
        "<p><strong>{}</strong><br>{}",
        escape(user.name.as_deref().unwrap_or(user.display_name())),
        escape(&user.email)
    );
    if user.email_verified == Some(true) {
        body.push_str(" <span class=\"badge\">verified</span>");
    }
    body.push_str("</p></div>");

    let _ = write!(
        body,
        "<div class=\"card\"><h2>Planning</h2>\
         <form method=\"post\" action=\"/settings/meals-per-week\">\
         <label>Meals per week <input type=\"number\" name=\"meals_per_week\" min=\"1\" max=\"{}\" value=\"{}\"></label> \
         <button type=\"submit\">Save</button></form></div>",
        MAX_MEALS_PER_WEEK, session.meals_per_week
    );

    let _ = write!(
        body,
        "<div class=\"card\"><h2>Library</h2><p>{} AnyList · {} local · {} default recipes</p>\
         <p>Storage: {}</p></div>",
        session.anylist_recipes.len(),
        session.local_recipes.len(),
        session.default_recipes.len(),
        render::storage_badge(&session.storage)
    );

    let anylist = if state.anylist_credentials(&session).is_some() {
        "connected"
    } else {
        "not connected"
    };
    let _ = write!(
        body,
        "<p>AnyList: {} · <a href=\"/settings\">Manage connections</a></p>\
         <p><a href=\"/logout\"><button>Sign out</button></a></p>",
        anylist
    );

    Ok(render::page("Profile", "/profile", &mut session, &body))
}

pub async fn update_meals_per_week(
    State(state): State<Arc<AppState>>,
    Extension(handle): Extension<SessionHandle>,
    Form(form): Form<MealsPerWeekForm>,
) -> Result<Redirect> {
    let mut session = handle.lock().await;
    require_user(&session)?;

    match parse_meals_per_week(&form.meals_per_week) {
        Ok(count) => {
            session.meals_per_week = count;
            session.success(format!("Planning {} meals per week", count));
            let persistence = state.persistence(&mut session).await;
            persistence.save_settings(&mut session).await;
        }
        Err(e) => session.error(e.user_friendly_message()),
    }
    Ok(Redirect::to("/profile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meals_per_week_bounds() {
        assert_eq!(parse_meals_per_week(" 5 ").unwrap(), 5);
        assert!(parse_meals_per_week("0").is_err());
        assert!(parse_meals_per_week("15").is_err());
        assert!(parse_meals_per_week("many").is_err());
    }
}
