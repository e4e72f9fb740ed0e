use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{ingredients, recipe_ingredients, recipes};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = ingredients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct Ingredient {
    pub id: i32,
    pub name: String,
    pub size: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ingredients)]
pub(crate) struct NewIngredient<'a> {
    pub name: &'a str,
    pub size: &'a str,
}

/// Partial ingredient update; `None` columns are left untouched.
#[derive(Debug, Default, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = ingredients)]
pub(crate) struct IngredientChanges {
    pub name: Option<String>,
    pub size: Option<String>,
}

impl IngredientChanges {
    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_none() && self.size.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = recipes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct Recipe {
    pub id: i32,
    pub name: String,
    pub instructions: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recipes)]
pub(crate) struct NewRecipe<'a> {
    pub name: &'a str,
    pub instructions: &'a str,
}

#[derive(Debug, Default, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = recipes)]
pub(crate) struct RecipeChanges {
    pub name: Option<String>,
    pub instructions: Option<String>,
}

impl RecipeChanges {
    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_none() && self.instructions.is_none()
    }
}

// junction row: one per (recipe, ingredient) pair
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Identifiable, Associations)]
#[diesel(belongs_to(Recipe))]
#[diesel(belongs_to(Ingredient))]
#[diesel(table_name = recipe_ingredients)]
#[diesel(primary_key(recipe_id, ingredient_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct RecipeIngredient {
    pub recipe_id: i32,     //foreign key
    pub ingredient_id: i32, //foreign key
    pub amount: f64,
}

/// A recipe together with the ingredients it uses, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecipeDetail {
    pub id: i32,
    pub name: String,
    pub instructions: String,
    pub ingredients: Vec<RecipeIngredientDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecipeIngredientDetail {
    pub id: i32,
    pub name: String,
    pub size: String,
    pub amount: f64,
}

impl RecipeDetail {
    pub(crate) fn assemble(recipe: Recipe, links: Vec<(RecipeIngredient, Ingredient)>) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            instructions: recipe.instructions,
            ingredients: links
                .into_iter()
                .map(|(link, ingredient)| RecipeIngredientDetail {
                    id: ingredient.id,
                    name: ingredient.name,
                    size: ingredient.size,
                    amount: link.amount,
                })
                .collect(),
        }
    }
}
