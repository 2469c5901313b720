use crate::core::session::{Notice, SessionState, StorageStatus};
use crate::domain::model::Recipe;
use axum::response::Html;

/// Navigation entries: (path, label).
const NAV: [(&str, &str); 4] = [
    ("/this-week", "This Week"),
    ("/recipes", "Browse Recipes"),
    ("/profile", "Profile"),
    ("/settings", "Settings"),
];

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0;color:#222}\
header{background:#2f6f4f;color:#fff;padding:.6rem 1rem;display:flex;gap:1rem;align-items:center}\
header a{color:#fff;text-decoration:none}header a.active{font-weight:bold;text-decoration:underline}\
main{max-width:960px;margin:1rem auto;padding:0 1rem}\
.notice{padding:.5rem .8rem;border-radius:4px;margin:.4rem 0}\
.info{background:#e7f0fb}.success{background:#e3f5e6}.warning{background:#fff4d6}.error{background:#fbe3e3}\
.card{border:1px solid #ddd;border-radius:6px;padding:.8rem;margin:.6rem 0}\
.tabs a{margin-right:.8rem}.tabs a.active{font-weight:bold}\
.badge{font-size:.8rem;background:#eee;border-radius:3px;padding:0 .3rem;margin-right:.3rem}\
form.inline{display:inline}";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn stars(rating: u8) -> String {
    let rating = rating.min(5) as usize;
    format!("{}{}", "★".repeat(rating), "☆".repeat(5 - rating))
}

pub fn storage_badge(status: &StorageStatus) -> &'static str {
    match status {
        StorageStatus::Drive => "Saved to Google Drive",
        StorageStatus::SessionOnly { .. } => "Session only",
        StorageStatus::NotConnected => "Not connected to Drive",
    }
}

fn render_notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|n| {
            format!(
                "<div class=\"notice {}\">{}</div>",
                n.level.css_class(),
                escape(&n.text)
            )
        })
        .collect()
}

/// Full page with navigation. Drains the session's pending notices.
pub fn page(title: &str, active: &str, session: &mut SessionState, body: &str) -> Html<String> {
    let notices = session.take_notices();
    let nav = match &session.user {
        Some(user) => {
            let links: String = NAV
                .iter()
                .map(|(path, label)| {
                    let class = if *path == active { " class=\"active\"" } else { "" };
                    format!("<a href=\"{}\"{}>{}</a>", path, class, label)
                })
                .collect();
            format!(
                "{}<span style=\"margin-left:auto\"><span class=\"badge\">{}</span>{} · <a href=\"/logout\">Sign out</a></span>",
                links,
                storage_badge(&session.storage),
                escape(user.display_name())
            )
        }
        None => "<strong>Recipe Calendar</strong>".to_string(),
    };

    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{} · Recipe Calendar</title>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><style>{}</style></head>\
         <body><header>{}</header><main>{}<h1>{}</h1>{}</main></body></html>",
        escape(title),
        STYLE,
        nav,
        render_notices(&notices),
        escape(title),
        body
    ))
}

/// Minimal page for errors raised outside a session.
pub fn error_page(title: &str, message: &str, hint: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head>\
         <body><main><h1>{}</h1><div class=\"notice error\">{}</div><p>{}</p><p><a href=\"/\">Back to start</a></p></main></body></html>",
        escape(title),
        STYLE,
        escape(title),
        escape(message),
        escape(hint)
    )
}

/// Name, source, rating and time line used in lists.
pub fn recipe_summary(recipe: &Recipe) -> String {
    let mut parts = vec![
        format!("<span class=\"badge\">{}</span>", recipe.source.label()),
        stars(recipe.rating),
    ];
    let minutes = recipe.total_minutes();
    if minutes > 0 {
        parts.push(format!("{} min", minutes));
    }
    if let Some(servings) = &recipe.servings {
        parts.push(format!("serves {}", escape(servings)));
    }
    format!(
        "<a href=\"/recipes/{}\"><strong>{}</strong></a> {}",
        escape(&recipe.id),
        escape(&recipe.name),
        parts.join(" · ")
    )
}

/// `<option>`s for weeks 0..count, labelled relative to today.
pub fn week_options(labels: &[String], selected: u32) -> String {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let sel = if i as u32 == selected { " selected" } else { "" };
            format!("<option value=\"{}\"{}>{}</option>", i, sel, escape(label))
        })
        .collect()
}

pub fn post_button(action: &str, label: &str) -> String {
    format!(
        "<form class=\"inline\" method=\"post\" action=\"{}\"><button type=\"submit\">{}</button></form>",
        escape(action),
        escape(label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RecipeOrigin;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape("<b>Mac & \"Cheese\"</b>"),
            "&lt;b&gt;Mac &amp; &quot;Cheese&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_stars_clamped() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(9), "★★★★★");
    }

    #[test]
    fn test_page_drains_notices() {
        let mut session = SessionState::default();
        session.success("Saved <now>");
        let Html(html) = page("Home", "/", &mut session, "<p>body</p>");
        assert!(html.contains("Saved &lt;now&gt;"));
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_recipe_summary_links_by_id() {
        let mut recipe = Recipe::new("Chili", RecipeOrigin::AnyList);
        recipe.id = "r1".to_string();
        recipe.cook_time = Some(1800);
        let html = recipe_summary(&recipe);
        assert!(html.contains("href=\"/recipes/r1\""));
        assert!(html.contains("30 min"));
        assert!(html.contains("AnyList"));
    }
}
