use crate::core::session::SessionState;
use crate::domain::model::{Recipe, RecipeOrigin};
use std::collections::BTreeSet;

pub const DEFAULT_RECIPES_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Only(RecipeOrigin),
}

impl SourceFilter {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "All" | "all" => SourceFilter::All,
            other => SourceFilter::Only(RecipeOrigin::from(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceFilter::All => "All",
            SourceFilter::Only(origin) => origin.label(),
        }
    }

    fn accepts(&self, recipe: &Recipe) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Only(origin) => recipe.source == *origin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub search: String,
    pub categories: Vec<String>,
    pub source: SourceFilter,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn matches_search(recipe: &Recipe, needle_lower: &str) -> bool {
    contains_ci(&recipe.name, needle_lower)
        || recipe
            .ingredients
            .iter()
            .any(|i| contains_ci(&i.name, needle_lower))
        || recipe.labels().any(|label| contains_ci(label, needle_lower))
}

/// Every selected category must appear among the recipe's tags or collections.
fn matches_categories(recipe: &Recipe, categories: &[String]) -> bool {
    let owned: BTreeSet<String> = recipe.labels().map(str::to_lowercase).collect();
    categories
        .iter()
        .all(|wanted| owned.contains(&wanted.to_lowercase()))
}

/// Search, category and source filters, then highest rating first.
pub fn filter_recipes<'a>(recipes: &'a [Recipe], filter: &RecipeFilter) -> Vec<&'a Recipe> {
    let needle = filter.search.trim().to_lowercase();
    let categories: Vec<String> = filter
        .categories
        .iter()
        .filter(|c| !c.trim().is_empty())
        .cloned()
        .collect();

    let mut filtered: Vec<&Recipe> = recipes
        .iter()
        .filter(|r| needle.is_empty() || matches_search(r, &needle))
        .filter(|r| categories.is_empty() || matches_categories(r, &categories))
        .filter(|r| filter.source.accepts(r))
        .collect();

    // stable: equal ratings keep library order
    filtered.sort_by(|a, b| b.rating.cmp(&a.rating));
    filtered
}

/// Sorted, de-duplicated collection names.
pub fn all_categories(recipes: &[Recipe]) -> Vec<String> {
    recipes
        .iter()
        .flat_map(|r| r.collections.iter())
        .filter(|c| !c.trim().is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// AnyList, then local, then default recipes.
pub fn all_recipes(session: &SessionState) -> Vec<Recipe> {
    session
        .anylist_recipes
        .iter()
        .chain(session.local_recipes.iter())
        .chain(session.default_recipes.iter())
        .cloned()
        .collect()
}

pub fn find_recipe<'a>(recipes: &'a [Recipe], id: &str) -> Option<&'a Recipe> {
    recipes.iter().find(|r| r.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based, already clamped.
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    /// One-based, inclusive. Both zero when empty.
    pub showing_start: usize,
    pub showing_end: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    if total == 0 {
        return Page {
            items: Vec::new(),
            page: 0,
            total_pages: 0,
            total: 0,
            showing_start: 0,
            showing_end: 0,
        };
    }

    let total_pages = (total - 1) / per_page + 1;
    let page = page.min(total_pages - 1);
    let start = page * per_page;
    let end = (start + per_page).min(total);

    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total,
        showing_start: start + 1,
        showing_end: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Ingredient;

    fn recipe(name: &str, rating: u8, source: RecipeOrigin, collections: &[&str]) -> Recipe {
        let mut r = Recipe::new(name, source);
        r.rating = rating;
        r.collections = collections.iter().map(|c| c.to_string()).collect();
        r
    }

    fn library() -> Vec<Recipe> {
        let mut soup = recipe("Tomato Soup", 3, RecipeOrigin::Local, &["Dinner", "Vegetarian"]);
        soup.ingredients = vec![Ingredient::new("Tomatoes", "6")];
        let mut pancakes = recipe("Pancakes", 5, RecipeOrigin::Builtin, &["Breakfast"]);
        pancakes.tags = vec!["Quick".to_string()];
        let chili = recipe("Chili", 4, RecipeOrigin::AnyList, &["Dinner"]);
        let salad = recipe("Salad", 3, RecipeOrigin::AnyList, &["Vegetarian", " "]);
        vec![soup, pancakes, chili, salad]
    }

    fn names(recipes: &[&Recipe]) -> Vec<String> {
        recipes.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_no_filter_sorts_by_rating() {
        let recipes = library();
        let filtered = filter_recipes(&recipes, &RecipeFilter::default());
        assert_eq!(
            names(&filtered),
            vec!["Pancakes", "Chili", "Tomato Soup", "Salad"]
        );
    }

    #[test]
    fn test_search_covers_ingredients_tags_and_collections() {
        let recipes = library();
        let by_ingredient = RecipeFilter {
            search: "TOMATO".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter_recipes(&recipes, &by_ingredient)), vec!["Tomato Soup"]);

        let by_tag = RecipeFilter {
            search: "quick".to_string(),
            ..Default::default()
        };
        assert_eq!(names(&filter_recipes(&recipes, &by_tag)), vec!["Pancakes"]);

        let by_collection = RecipeFilter {
            search: "dinn".to_string(),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_recipes(&recipes, &by_collection)),
            vec!["Chili", "Tomato Soup"]
        );
    }

    #[test]
    fn test_categories_use_and_logic() {
        let recipes = library();
        let filter = RecipeFilter {
            categories: vec!["dinner".to_string(), "Vegetarian".to_string()],
            ..Default::default()
        };
        assert_eq!(names(&filter_recipes(&recipes, &filter)), vec!["Tomato Soup"]);
    }

    #[test]
    fn test_source_filter() {
        let recipes = library();
        let filter = RecipeFilter {
            source: SourceFilter::parse("AnyList"),
            ..Default::default()
        };
        assert_eq!(names(&filter_recipes(&recipes, &filter)), vec!["Chili", "Salad"]);
        assert_eq!(SourceFilter::parse("All"), SourceFilter::All);
        assert_eq!(
            SourceFilter::parse("Default"),
            SourceFilter::Only(RecipeOrigin::Builtin)
        );
    }

    #[test]
    fn test_all_categories_sorted_and_unique() {
        assert_eq!(
            all_categories(&library()),
            vec!["Breakfast", "Dinner", "Vegetarian"]
        );
    }

    #[test]
    fn test_paginate_clamps_page() {
        let items: Vec<usize> = (0..23).collect();

        let first = paginate(&items, 0, 10);
        assert_eq!(first.items.len(), 10);
        assert_eq!((first.showing_start, first.showing_end), (1, 10));
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let past_end = paginate(&items, 9, 10);
        assert_eq!(past_end.page, 2);
        assert_eq!(past_end.items, vec![20, 21, 22]);
        assert_eq!((past_end.showing_start, past_end.showing_end), (21, 23));
        assert!(!past_end.has_next());

        let empty = paginate::<usize>(&[], 3, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.items.is_empty());
    }
}
