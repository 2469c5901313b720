use chrono::{Datelike, NaiveDate, Weekday};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub note: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            note: String::new(),
        }
    }
}

/// Where a recipe came from. Serialized as the label shown in the source filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecipeOrigin {
    #[default]
    Local,
    Builtin,
    AnyList,
}

impl RecipeOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            RecipeOrigin::Local => "Local",
            RecipeOrigin::Builtin => "Default",
            RecipeOrigin::AnyList => "AnyList",
        }
    }
}

impl From<String> for RecipeOrigin {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "default" => RecipeOrigin::Builtin,
            "anylist" => RecipeOrigin::AnyList,
            _ => RecipeOrigin::Local,
        }
    }
}

impl From<RecipeOrigin> for String {
    fn from(value: RecipeOrigin) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for RecipeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default = "new_recipe_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Seconds.
    #[serde(default, alias = "prepTime")]
    pub prep_time: Option<u32>,
    /// Seconds.
    #[serde(default, alias = "cookTime")]
    pub cook_time: Option<u32>,
    #[serde(default, deserialize_with = "de_servings")]
    pub servings: Option<String>,
    #[serde(default, deserialize_with = "de_rating")]
    pub rating: u8,
    #[serde(default)]
    pub source: RecipeOrigin,
    #[serde(default, alias = "sourceUrl", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "de_ingredients")]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, alias = "preparationSteps")]
    pub preparation_steps: Vec<String>,
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, deserialize_with = "de_names")]
    pub collections: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn new_recipe_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Recipe {
    pub fn new(name: impl Into<String>, source: RecipeOrigin) -> Self {
        Self {
            id: new_recipe_id(),
            name: name.into(),
            description: String::new(),
            prep_time: None,
            cook_time: None,
            servings: None,
            rating: 0,
            source,
            source_url: None,
            ingredients: Vec::new(),
            preparation_steps: Vec::new(),
            photo_url: None,
            collections: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn total_minutes(&self) -> u32 {
        self.prep_time
            .unwrap_or(0)
            .saturating_add(self.cook_time.unwrap_or(0))
            / 60
    }

    pub fn is_complete(&self) -> bool {
        !self.ingredients.is_empty() && !self.preparation_steps.is_empty()
    }

    /// Tags and collection names, collections first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .chain(self.tags.iter())
            .map(String::as_str)
    }

    /// Id match, or name match for references written before ids existed.
    pub fn matches_reference(&self, meal: &PlannedMeal) -> bool {
        self.id == meal.recipe_id || (!meal.recipe_name.is_empty() && self.name == meal.recipe_name)
    }

    pub fn to_planned_meal(&self) -> PlannedMeal {
        PlannedMeal {
            recipe_id: self.id.clone(),
            recipe_name: self.name.clone(),
            day: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngredientEntry {
    Full(Ingredient),
    Bare(String),
}

/// `{"flour": "2 dl", ...}` in the order it was written.
struct NameQuantityPairs(Vec<(String, String)>);

impl<'de> Deserialize<'de> for NameQuantityPairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = NameQuantityPairs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of ingredient names to quantities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(NameQuantityPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngredientsRepr {
    List(Vec<IngredientEntry>),
    Map(NameQuantityPairs),
    Missing(()),
}

fn de_ingredients<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Ingredient>, D::Error> {
    let repr = IngredientsRepr::deserialize(deserializer)?;
    Ok(match repr {
        IngredientsRepr::List(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                IngredientEntry::Full(ingredient) => ingredient,
                IngredientEntry::Bare(name) => Ingredient::new(name, ""),
            })
            .collect(),
        IngredientsRepr::Map(NameQuantityPairs(pairs)) => pairs
            .into_iter()
            .map(|(name, quantity)| Ingredient::new(name, quantity))
            .collect(),
        IngredientsRepr::Missing(()) => Vec::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NameEntry {
    Plain(String),
    Named { name: String },
}

fn de_names<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let entries: Option<Vec<NameEntry>> = Option::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            NameEntry::Plain(name) | NameEntry::Named { name } => name,
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Servings {
    Text(String),
    Number(f64),
}

fn de_servings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<Servings> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Servings::Text(text)) if text.trim().is_empty() => None,
        Some(Servings::Text(text)) => Some(text),
        Some(Servings::Number(n)) if n.fract() == 0.0 => Some(format!("{}", n as i64)),
        Some(Servings::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

fn de_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.map(|r| r.clamp(0.0, 5.0).round() as u8).unwrap_or(0))
}

/// ISO-8601 week, written as `YYYY-WNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for WeekKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, week) = s
            .split_once("-W")
            .ok_or_else(|| format!("'{}' is not a week key (expected YYYY-WNN)", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in week key '{}'", s))?;
        let week: u32 = week
            .parse()
            .map_err(|_| format!("invalid week number in week key '{}'", s))?;

        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            .map(|_| Self { year, week })
            .ok_or_else(|| format!("week {} does not exist in {}", week, year))
    }
}

impl TryFrom<String> for WeekKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeekKey> for String {
    fn from(value: WeekKey) -> Self {
        value.to_string()
    }
}

/// Reference to a recipe occupying one slot of a weekly plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMeal {
    pub recipe_id: String,
    #[serde(default)]
    pub recipe_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyMealPlan {
    pub week: WeekKey,
    #[serde(default)]
    pub meals: Vec<PlannedMeal>,
}

impl WeeklyMealPlan {
    pub fn new(week: WeekKey) -> Self {
        Self {
            week,
            meals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.given_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("User")
    }
}

/// The JSON files kept in the app folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Recipes,
    WeeklyRecipes,
    MealPlans,
    UserSettings,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Recipes,
        DocumentKind::WeeklyRecipes,
        DocumentKind::MealPlans,
        DocumentKind::UserSettings,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentKind::Recipes => "recipes.json",
            DocumentKind::WeeklyRecipes => "weekly_recipes.json",
            DocumentKind::MealPlans => "meal_plans.json",
            DocumentKind::UserSettings => "user_settings.json",
        }
    }
}

pub trait Document: Serialize + DeserializeOwned + Default + Send + Sync {
    const KIND: DocumentKind;

    fn set_last_updated(&mut self, timestamp: String);
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecipesDocument {
    #[serde(default)]
    pub anylist_recipes: Vec<Recipe>,
    #[serde(default)]
    pub local_recipes: Vec<Recipe>,
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Document for RecipesDocument {
    const KIND: DocumentKind = DocumentKind::Recipes;

    fn set_last_updated(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeeklyRecipesDocument {
    #[serde(default)]
    pub current_week: Vec<PlannedMeal>,
    #[serde(default)]
    pub weekly_plans: BTreeMap<WeekKey, WeeklyMealPlan>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Document for WeeklyRecipesDocument {
    const KIND: DocumentKind = DocumentKind::WeeklyRecipes;

    fn set_last_updated(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MealPlansDocument {
    #[serde(default)]
    pub weekly_plans: BTreeMap<WeekKey, WeeklyMealPlan>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Document for MealPlansDocument {
    const KIND: DocumentKind = DocumentKind::MealPlans;

    fn set_last_updated(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

pub const DEFAULT_MEALS_PER_WEEK: usize = 3;

fn default_meals_per_week() -> usize {
    DEFAULT_MEALS_PER_WEEK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_meals_per_week")]
    pub meals_per_week: usize,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            meals_per_week: DEFAULT_MEALS_PER_WEEK,
            last_updated: None,
        }
    }
}

impl Document for UserSettings {
    const KIND: DocumentKind = DocumentKind::UserSettings;

    fn set_last_updated(&mut self, timestamp: String) {
        self.last_updated = Some(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_recipe() -> Recipe {
        let mut recipe = Recipe::new("Mashed Cauliflower", RecipeOrigin::AnyList);
        recipe.description = "Creamy and light".to_string();
        recipe.prep_time = Some(600);
        recipe.cook_time = Some(1200);
        recipe.servings = Some("4".to_string());
        recipe.rating = 4;
        recipe.ingredients = vec![
            Ingredient::new("cauliflower", "1 head"),
            Ingredient {
                name: "butter".to_string(),
                quantity: "2 ss".to_string(),
                note: "salted".to_string(),
            },
        ];
        recipe.preparation_steps = vec!["Boil".to_string(), "Mash".to_string()];
        recipe.photo_url = Some("https://example.com/cauli.jpg".to_string());
        recipe.collections = vec!["Sides".to_string()];
        recipe
    }

    #[test]
    fn test_recipe_json_round_trip_is_identity() {
        let recipe = sample_recipe();
        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recipe);
    }

    #[test]
    fn test_recipe_accepts_legacy_shapes() {
        let json = r#"{
            "name": "Pancakes",
            "prepTime": 300,
            "servings": 2,
            "rating": null,
            "source": "Default",
            "ingredients": {"flour": "2 dl", "egg": "1"},
            "preparationSteps": ["Mix", "Fry"],
            "image": "https://example.com/p.jpg",
            "collections": [{"name": "Breakfast"}, "Quick"]
        }"#;

        let recipe: Recipe = serde_json::from_str(json).unwrap();

        assert!(!recipe.id.is_empty());
        assert_eq!(recipe.prep_time, Some(300));
        assert_eq!(recipe.servings.as_deref(), Some("2"));
        assert_eq!(recipe.rating, 0);
        assert_eq!(recipe.source, RecipeOrigin::Builtin);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0], Ingredient::new("flour", "2 dl"));
        assert_eq!(recipe.ingredients[1], Ingredient::new("egg", "1"));
        assert_eq!(recipe.preparation_steps, vec!["Mix", "Fry"]);
        assert_eq!(recipe.photo_url.as_deref(), Some("https://example.com/p.jpg"));
        assert_eq!(recipe.collections, vec!["Breakfast", "Quick"]);
    }

    #[test]
    fn test_bare_string_ingredients() {
        let recipe: Recipe =
            serde_json::from_value(json!({"name": "Toast", "ingredients": ["bread", "butter"]}))
                .unwrap();
        assert_eq!(recipe.ingredients[1].name, "butter");
        assert!(recipe.ingredients[1].quantity.is_empty());
    }

    #[test]
    fn test_unknown_origin_reads_as_local() {
        let recipe: Recipe =
            serde_json::from_value(json!({"name": "Soup", "source": "Grandma"})).unwrap();
        assert_eq!(recipe.source, RecipeOrigin::Local);
    }

    #[test]
    fn test_total_minutes() {
        assert_eq!(sample_recipe().total_minutes(), 30);
        assert_eq!(Recipe::new("Empty", RecipeOrigin::Local).total_minutes(), 0);

        let mut huge = Recipe::new("Overnight", RecipeOrigin::AnyList);
        huge.prep_time = Some(u32::MAX);
        huge.cook_time = Some(600);
        assert_eq!(huge.total_minutes(), u32::MAX / 60);
    }

    #[test]
    fn test_week_key_format_and_parse() {
        let key = WeekKey::from_date(NaiveDate::from_ymd_opt(2025, 8, 27).unwrap());
        assert_eq!(key.to_string(), "2025-W35");
        assert_eq!("2025-W35".parse::<WeekKey>().unwrap(), key);
        assert_eq!(key.monday(), NaiveDate::from_ymd_opt(2025, 8, 25));

        assert!("2025-35".parse::<WeekKey>().is_err());
        assert!("2025-W54".parse::<WeekKey>().is_err());
    }

    #[test]
    fn test_week_key_as_map_key() {
        let key: WeekKey = "2026-W01".parse().unwrap();
        let mut doc = MealPlansDocument::default();
        doc.weekly_plans.insert(key, WeeklyMealPlan::new(key));

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["weekly_plans"]["2026-W01"].is_object());

        let back: MealPlansDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_user_settings_defaults() {
        let settings: UserSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.meals_per_week, 3);
    }

    #[test]
    fn test_display_name_prefers_given_name() {
        let profile = UserProfile {
            email: "cook@example.com".to_string(),
            name: Some("Ada Lovelace".to_string()),
            given_name: Some("Ada".to_string()),
            family_name: None,
            picture: None,
            email_verified: Some(true),
        };
        assert_eq!(profile.display_name(), "Ada");
    }
}
