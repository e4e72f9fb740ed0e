use std::collections::HashSet;

use diesel::prelude::*;

use crate::errors::AppError;
use crate::forms::{IngredientInput, IngredientLine, IngredientRef, RecipeInput, RecipeUpdate, ValidationErrors};
use crate::models::{
    Ingredient, IngredientChanges, NewIngredient, NewRecipe, Recipe, RecipeDetail, RecipeIngredient,
};
use crate::schema::{ingredients, recipe_ingredients, recipes};

pub(crate) const RECIPE: &str = "recipe";
pub(crate) const INGREDIENT: &str = "ingredient";

pub(crate) fn insert_ingredient(
    conn: &mut SqliteConnection,
    input: &IngredientInput,
) -> Result<Ingredient, AppError> {
    let ingredient = insert_ingredient_row(conn, &input.name, &input.size)?;
    log::debug!("created ingredient {} ({})", ingredient.id, ingredient.name);
    Ok(ingredient)
}

pub(crate) fn find_all_ingredients(conn: &mut SqliteConnection) -> Result<Vec<Ingredient>, AppError> {
    Ok(ingredients::table
        .order(ingredients::id.asc())
        .select(Ingredient::as_select())
        .load(conn)?)
}

pub(crate) fn find_ingredient(conn: &mut SqliteConnection, ingredient_id: i32) -> Result<Ingredient, AppError> {
    ingredients::table
        .find(ingredient_id)
        .select(Ingredient::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(INGREDIENT, ingredient_id))
}

pub(crate) fn update_ingredient(
    conn: &mut SqliteConnection,
    ingredient_id: i32,
    changes: &IngredientChanges,
) -> Result<Ingredient, AppError> {
    let ingredient = find_ingredient(conn, ingredient_id)?;
    if changes.is_empty() {
        return Ok(ingredient);
    }
    Ok(diesel::update(ingredients::table.find(ingredient_id))
        .set(changes)
        .returning(Ingredient::as_returning())
        .get_result(conn)?)
}

/// Removes the ingredient and every recipe link that uses it.
///
/// Like every read-then-write flow here it runs under `BEGIN IMMEDIATE`, so
/// concurrent writers queue on `busy_timeout` instead of failing the lock upgrade.
pub(crate) fn delete_ingredient(conn: &mut SqliteConnection, ingredient_id: i32) -> Result<(), AppError> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        find_ingredient(conn, ingredient_id)?;
        let links = diesel::delete(
            recipe_ingredients::table.filter(recipe_ingredients::ingredient_id.eq(ingredient_id)),
        )
        .execute(conn)?;
        diesel::delete(ingredients::table.find(ingredient_id)).execute(conn)?;
        log::info!("deleted ingredient {} and {} recipe links", ingredient_id, links);
        Ok(())
    })
}

pub(crate) fn create_recipe(conn: &mut SqliteConnection, input: &RecipeInput) -> Result<RecipeDetail, AppError> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let recipe: Recipe = diesel::insert_into(recipes::table)
            .values(NewRecipe {
                name: &input.name,
                instructions: &input.instructions,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        link_ingredients(conn, recipe.id, &input.ingredients)?;
        log::debug!("created recipe {} ({})", recipe.id, recipe.name);
        recipe_detail(conn, recipe)
    })
}

/// All recipes with their ingredients, both ordered by id.
pub(crate) fn find_all_recipes(conn: &mut SqliteConnection) -> Result<Vec<RecipeDetail>, AppError> {
    let all_recipes = recipes::table
        .order(recipes::id.asc())
        .select(Recipe::as_select())
        .load(conn)?;

    let links: Vec<(RecipeIngredient, Ingredient)> = RecipeIngredient::belonging_to(&all_recipes)
        .inner_join(ingredients::table)
        .order(ingredients::id.asc())
        .select((RecipeIngredient::as_select(), Ingredient::as_select()))
        .load(conn)?;

    Ok(links
        .grouped_by(&all_recipes)
        .into_iter()
        .zip(all_recipes)
        .map(|(links, recipe)| RecipeDetail::assemble(recipe, links))
        .collect())
}

pub(crate) fn find_recipe(conn: &mut SqliteConnection, recipe_id: i32) -> Result<RecipeDetail, AppError> {
    let recipe = recipe_row(conn, recipe_id)?;
    recipe_detail(conn, recipe)
}

/// Applies the provided fields; a provided ingredient list replaces the old one.
pub(crate) fn update_recipe(
    conn: &mut SqliteConnection,
    recipe_id: i32,
    update: &RecipeUpdate,
) -> Result<RecipeDetail, AppError> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        let mut recipe = recipe_row(conn, recipe_id)?;
        if !update.changes.is_empty() {
            recipe = diesel::update(recipes::table.find(recipe_id))
                .set(&update.changes)
                .returning(Recipe::as_returning())
                .get_result(conn)?;
        }
        if let Some(lines) = &update.ingredients {
            let cleared = diesel::delete(
                recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)),
            )
            .execute(conn)?;
            log::debug!("cleared {} ingredient links of recipe {}", cleared, recipe_id);
            link_ingredients(conn, recipe_id, lines)?;
        }
        recipe_detail(conn, recipe)
    })
}

/// Removes the recipe's links, then the recipe. Ingredients are kept.
pub(crate) fn delete_recipe(conn: &mut SqliteConnection, recipe_id: i32) -> Result<(), AppError> {
    conn.immediate_transaction::<_, AppError, _>(|conn| {
        recipe_row(conn, recipe_id)?;
        let links = diesel::delete(
            recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)),
        )
        .execute(conn)?;
        diesel::delete(recipes::table.find(recipe_id)).execute(conn)?;
        log::info!("deleted recipe {} and {} ingredient links", recipe_id, links);
        Ok(())
    })
}

fn recipe_row(conn: &mut SqliteConnection, recipe_id: i32) -> Result<Recipe, AppError> {
    recipes::table
        .find(recipe_id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(RECIPE, recipe_id))
}

fn recipe_detail(conn: &mut SqliteConnection, recipe: Recipe) -> Result<RecipeDetail, AppError> {
    let links = RecipeIngredient::belonging_to(&recipe)
        .inner_join(ingredients::table)
        .order(ingredients::id.asc())
        .select((RecipeIngredient::as_select(), Ingredient::as_select()))
        .load(conn)?;
    Ok(RecipeDetail::assemble(recipe, links))
}

fn insert_ingredient_row(conn: &mut SqliteConnection, name: &str, size: &str) -> Result<Ingredient, AppError> {
    Ok(diesel::insert_into(ingredients::table)
        .values(NewIngredient { name, size })
        .returning(Ingredient::as_returning())
        .get_result(conn)?)
}

fn find_ingredient_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Ingredient>, AppError> {
    Ok(ingredients::table
        .filter(ingredients::name.eq(name))
        .order(ingredients::id.asc())
        .select(Ingredient::as_select())
        .first(conn)
        .optional()?)
}

fn resolve_ingredient(
    conn: &mut SqliteConnection,
    index: usize,
    target: &IngredientRef,
) -> Result<Ingredient, AppError> {
    match target {
        IngredientRef::Id(ingredient_id) => find_ingredient(conn, *ingredient_id),
        IngredientRef::Named { name, size } => {
            if let Some(existing) = find_ingredient_by_name(conn, name)? {
                return Ok(existing);
            }
            let size = size.as_deref().ok_or_else(|| {
                ValidationErrors::field(
                    format!("ingredients[{}].size", index),
                    "This field is required when creating a new ingredient.",
                )
            })?;
            let ingredient = insert_ingredient_row(conn, name, size)?;
            log::debug!("created ingredient {} ({}) for a recipe", ingredient.id, ingredient.name);
            Ok(ingredient)
        }
    }
}

/// Inserts one junction row per line. Callers run this inside a transaction.
fn link_ingredients(
    conn: &mut SqliteConnection,
    recipe_id: i32,
    lines: &[IngredientLine],
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for (index, line) in lines.iter().enumerate() {
        let ingredient = resolve_ingredient(conn, index, &line.target)?;
        if !seen.insert(ingredient.id) {
            return Err(ValidationErrors::field(
                format!("ingredients[{}]", index),
                format!("Ingredient {} is listed more than once.", ingredient.name),
            )
            .into());
        }
        diesel::insert_into(recipe_ingredients::table)
            .values(RecipeIngredient {
                recipe_id,
                ingredient_id: ingredient.id,
                amount: line.amount,
            })
            .execute(conn)?;
    }
    Ok(())
}
