use crate::domain::model::{PlannedMeal, Recipe, WeekKey, WeeklyMealPlan};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

pub type WeeklyPlans = BTreeMap<WeekKey, WeeklyMealPlan>;

pub fn recipes_for_week(plans: &WeeklyPlans, week: WeekKey) -> &[PlannedMeal] {
    plans
        .get(&week)
        .map(|plan| plan.meals.as_slice())
        .unwrap_or(&[])
}

pub fn has_recipes_for_week(plans: &WeeklyPlans, week: WeekKey) -> bool {
    !recipes_for_week(plans, week).is_empty()
}

pub fn add_to_week(plans: &mut WeeklyPlans, week: WeekKey, recipe: &Recipe) {
    plans
        .entry(week)
        .or_insert_with(|| WeeklyMealPlan::new(week))
        .meals
        .push(recipe.to_planned_meal());
    tracing::debug!("Added {} to {}", recipe.name, week);
}

/// Out-of-range indexes leave the plan untouched.
pub fn remove_from_week(plans: &mut WeeklyPlans, week: WeekKey, index: usize) -> Option<PlannedMeal> {
    let plan = plans.get_mut(&week)?;
    if index >= plan.meals.len() {
        return None;
    }
    Some(plan.meals.remove(index))
}

pub fn clear_week(plans: &mut WeeklyPlans, week: WeekKey) -> usize {
    plans
        .get_mut(&week)
        .map(|plan| std::mem::take(&mut plan.meals).len())
        .unwrap_or(0)
}

/// Appends `min(count, available.len())` distinct random recipes. Returns how many were added.
pub fn populate_week_random<R: Rng + ?Sized>(
    plans: &mut WeeklyPlans,
    week: WeekKey,
    available: &[Recipe],
    count: usize,
    rng: &mut R,
) -> usize {
    let picked: Vec<&Recipe> = available.choose_multiple(rng, count).collect();
    for recipe in &picked {
        add_to_week(plans, week, recipe);
    }
    tracing::info!("Added {} random recipes to {}", picked.len(), week);
    picked.len()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedMeal<'a> {
    Found(&'a Recipe),
    /// The referenced recipe is no longer in the library.
    Missing(&'a PlannedMeal),
}

fn resolve<'a>(meal: &'a PlannedMeal, recipes: &'a [Recipe]) -> ResolvedMeal<'a> {
    recipes
        .iter()
        .find(|r| r.id == meal.recipe_id)
        .or_else(|| recipes.iter().find(|r| r.matches_reference(meal)))
        .map(ResolvedMeal::Found)
        .unwrap_or(ResolvedMeal::Missing(meal))
}

pub fn resolve_meals<'a>(meals: &'a [PlannedMeal], recipes: &'a [Recipe]) -> Vec<ResolvedMeal<'a>> {
    meals.iter().map(|meal| resolve(meal, recipes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RecipeOrigin;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn week() -> WeekKey {
        "2025-W35".parse().unwrap()
    }

    fn recipes(n: usize) -> Vec<Recipe> {
        (0..n)
            .map(|i| Recipe::new(format!("Recipe {}", i), RecipeOrigin::Local))
            .collect()
    }

    #[test]
    fn test_add_remove_clear() {
        let library = recipes(3);
        let mut plans = WeeklyPlans::new();

        add_to_week(&mut plans, week(), &library[0]);
        add_to_week(&mut plans, week(), &library[1]);
        assert!(has_recipes_for_week(&plans, week()));

        assert!(remove_from_week(&mut plans, week(), 5).is_none());
        assert_eq!(recipes_for_week(&plans, week()).len(), 2);

        let removed = remove_from_week(&mut plans, week(), 0).unwrap();
        assert_eq!(removed.recipe_id, library[0].id);
        assert_eq!(recipes_for_week(&plans, week())[0].recipe_name, "Recipe 1");

        assert_eq!(clear_week(&mut plans, week()), 1);
        assert!(!has_recipes_for_week(&plans, week()));
        assert_eq!(clear_week(&mut plans, "2030-W01".parse().unwrap()), 0);
    }

    #[test]
    fn test_populate_picks_distinct_recipes() {
        let library = recipes(10);
        let mut plans = WeeklyPlans::new();
        let mut rng = StdRng::seed_from_u64(7);

        let added = populate_week_random(&mut plans, week(), &library, 3, &mut rng);

        assert_eq!(added, 3);
        let ids: HashSet<_> = recipes_for_week(&plans, week())
            .iter()
            .map(|m| m.recipe_id.clone())
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_populate_is_capped_by_library_size() {
        let library = recipes(2);
        let mut plans = WeeklyPlans::new();
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(populate_week_random(&mut plans, week(), &library, 5, &mut rng), 2);
        assert_eq!(populate_week_random(&mut plans, week(), &[], 5, &mut rng), 0);
    }

    #[test]
    fn test_dangling_references_are_reported_missing() {
        let library = recipes(2);
        let mut plans = WeeklyPlans::new();
        add_to_week(&mut plans, week(), &library[0]);
        plans.get_mut(&week()).unwrap().meals.push(PlannedMeal {
            recipe_id: "gone".to_string(),
            recipe_name: "Deleted Dish".to_string(),
            day: None,
        });
        plans.get_mut(&week()).unwrap().meals.push(PlannedMeal {
            recipe_id: "legacy-id".to_string(),
            recipe_name: "Recipe 1".to_string(),
            day: None,
        });

        let resolved = resolve_meals(recipes_for_week(&plans, week()), &library);

        assert_eq!(resolved[0], ResolvedMeal::Found(&library[0]));
        assert!(matches!(resolved[1], ResolvedMeal::Missing(m) if m.recipe_name == "Deleted Dish"));
        assert_eq!(resolved[2], ResolvedMeal::Found(&library[1]));
    }
}
