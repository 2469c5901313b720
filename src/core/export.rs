use crate::domain::model::{DocumentKind, Recipe};
use crate::utils::error::{AppError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// One row per ingredient of each planned recipe.
pub fn shopping_list_csv(recipes: &[&Recipe]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["recipe", "ingredient", "quantity", "note"])?;

    for recipe in recipes {
        for ingredient in &recipe.ingredients {
            writer.write_record([
                recipe.name.as_str(),
                ingredient.name.as_str(),
                ingredient.quantity.as_str(),
                ingredient.note.as_str(),
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| AppError::IoError(e.into_error()))
}

/// ZIP with each document under its Drive file name.
pub fn backup_archive(documents: &[(DocumentKind, Vec<u8>)]) -> Result<Vec<u8>> {
    tracing::debug!("Creating backup archive with {} files", documents.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (kind, data) in documents {
        zip.start_file::<_, ()>(kind.file_name(), FileOptions::default())?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Ingredient, RecipeOrigin};
    use std::io::Read;

    #[test]
    fn test_shopping_list_csv_quotes_fields() {
        let mut chili = Recipe::new("Chili", RecipeOrigin::Local);
        chili.ingredients = vec![
            Ingredient::new("beans", "2 cans"),
            Ingredient {
                name: "tomatoes, crushed".to_string(),
                quantity: "400 g".to_string(),
                note: String::new(),
            },
        ];
        let toast = Recipe::new("Toast", RecipeOrigin::Local);

        let csv = String::from_utf8(shopping_list_csv(&[&chili, &toast]).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "recipe,ingredient,quantity,note");
        assert_eq!(lines[1], "Chili,beans,2 cans,");
        assert_eq!(lines[2], "Chili,\"tomatoes, crushed\",400 g,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_backup_archive_contains_documents() {
        let archive_bytes = backup_archive(&[
            (DocumentKind::Recipes, b"{\"local_recipes\":[]}".to_vec()),
            (DocumentKind::MealPlans, b"{}".to_vec()),
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("recipes.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "{\"local_recipes\":[]}");
        assert!(archive.by_name("meal_plans.json").is_ok());
    }
}
