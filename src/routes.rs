use actix_web::http::header;
use actix_web::{web, Either, HttpRequest, HttpResponse, Route};

use crate::db::Storage;
use crate::errors::AppError;
use crate::forms::{IngredientForm, RecipeForm, RecipeFormFields, UpdateIngredientForm, UpdateRecipeForm};
use crate::query::{self, INGREDIENT, RECIPE};
use crate::views;

type Submission<J, F> = Either<web::Json<J>, web::Form<F>>;

fn see_other(location: String) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

async fn show_recipe_form() -> HttpResponse {
    views::recipe_form()
}

async fn create_recipe(
    storage: web::Data<Storage>,
    body: Submission<RecipeForm, RecipeFormFields>,
) -> Result<HttpResponse, AppError> {
    let (input, from_html) = match body {
        Either::Left(json) => (json.into_inner().validate()?, false),
        Either::Right(fields) => (fields.into_inner().validate()?, true),
    };
    let recipe = storage.run(move |conn| query::create_recipe(conn, &input)).await?;
    log::info!("created recipe {} with {} ingredients", recipe.id, recipe.ingredients.len());

    if from_html {
        Ok(see_other(format!("/recipes/{}", recipe.id)))
    } else {
        Ok(HttpResponse::Created().json(recipe))
    }
}

async fn list_recipes(storage: web::Data<Storage>) -> Result<HttpResponse, AppError> {
    let recipes = storage.run(query::find_all_recipes).await?;
    Ok(HttpResponse::Ok().json(recipes))
}

async fn get_recipe(storage: web::Data<Storage>, recipe_id: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    let recipe = storage.run(move |conn| query::find_recipe(conn, recipe_id)).await?;
    Ok(HttpResponse::Ok().json(recipe))
}

async fn update_recipe(
    storage: web::Data<Storage>,
    recipe_id: web::Path<i32>,
    body: web::Json<UpdateRecipeForm>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    let update = body.into_inner().validate()?;
    let recipe = storage
        .run(move |conn| query::update_recipe(conn, recipe_id, &update))
        .await?;
    Ok(HttpResponse::Ok().json(recipe))
}

async fn delete_recipe(storage: web::Data<Storage>, recipe_id: web::Path<i32>) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    storage.run(move |conn| query::delete_recipe(conn, recipe_id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn confirm_delete_recipe(
    storage: web::Data<Storage>,
    recipe_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    storage.run(move |conn| query::find_recipe(conn, recipe_id)).await?;
    Ok(views::delete_form(RECIPE, &format!("/recipe/{}", recipe_id), recipe_id))
}

async fn submit_delete_recipe(
    storage: web::Data<Storage>,
    recipe_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    storage.run(move |conn| query::delete_recipe(conn, recipe_id)).await?;
    Ok(see_other("/recipes".to_string()))
}

async fn show_ingredient_form() -> HttpResponse {
    views::ingredient_form()
}

async fn create_ingredient(
    storage: web::Data<Storage>,
    body: Submission<IngredientForm, IngredientForm>,
) -> Result<HttpResponse, AppError> {
    let (form, from_html) = match body {
        Either::Left(json) => (json.into_inner(), false),
        Either::Right(form) => (form.into_inner(), true),
    };
    let input = form.validate()?;
    let ingredient = storage.run(move |conn| query::insert_ingredient(conn, &input)).await?;

    if from_html {
        Ok(see_other(format!("/ingredients/{}", ingredient.id)))
    } else {
        Ok(HttpResponse::Created().json(ingredient))
    }
}

async fn list_ingredients(storage: web::Data<Storage>) -> Result<HttpResponse, AppError> {
    let ingredients = storage.run(query::find_all_ingredients).await?;
    Ok(HttpResponse::Ok().json(ingredients))
}

async fn get_ingredient(
    storage: web::Data<Storage>,
    ingredient_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = ingredient_id.into_inner();
    let ingredient = storage
        .run(move |conn| query::find_ingredient(conn, ingredient_id))
        .await?;
    Ok(HttpResponse::Ok().json(ingredient))
}

async fn update_ingredient(
    storage: web::Data<Storage>,
    ingredient_id: web::Path<i32>,
    body: web::Json<UpdateIngredientForm>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = ingredient_id.into_inner();
    let changes = body.into_inner().validate()?;
    let ingredient = storage
        .run(move |conn| query::update_ingredient(conn, ingredient_id, &changes))
        .await?;
    Ok(HttpResponse::Ok().json(ingredient))
}

async fn delete_ingredient(
    storage: web::Data<Storage>,
    ingredient_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = ingredient_id.into_inner();
    storage
        .run(move |conn| query::delete_ingredient(conn, ingredient_id))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn confirm_delete_ingredient(
    storage: web::Data<Storage>,
    ingredient_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = ingredient_id.into_inner();
    storage
        .run(move |conn| query::find_ingredient(conn, ingredient_id))
        .await?;
    Ok(views::delete_form(
        INGREDIENT,
        &format!("/ingredient/{}", ingredient_id),
        ingredient_id,
    ))
}

async fn submit_delete_ingredient(
    storage: web::Data<Storage>,
    ingredient_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = ingredient_id.into_inner();
    storage
        .run(move |conn| query::delete_ingredient(conn, ingredient_id))
        .await?;
    Ok(see_other("/ingredients".to_string()))
}

/// Fallback route of a resource, answering 405 with an `Allow` header.
fn method_not_allowed(allowed: &'static str) -> Route {
    web::to(move || async move { Err::<HttpResponse, _>(AppError::MethodNotAllowed(allowed)) })
}

async fn route_not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::RouteNotFound(req.path().to_string()))
}

/// Registers every route plus the body extractor settings.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::FormConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    // "/recipes/create" has to be registered before "/recipes/{id}"
    .service(
        web::resource("/recipes/create")
            .route(web::get().to(show_recipe_form))
            .route(web::post().to(create_recipe))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/recipes")
            .route(web::get().to(list_recipes))
            .default_service(method_not_allowed("GET")),
    )
    .service(
        web::resource("/recipes/{id}")
            .route(web::get().to(get_recipe))
            .route(web::put().to(update_recipe))
            .route(web::delete().to(delete_recipe))
            .default_service(method_not_allowed("GET, PUT, DELETE")),
    )
    .service(
        web::resource("/recipe/{id}")
            .route(web::get().to(confirm_delete_recipe))
            .route(web::post().to(submit_delete_recipe))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/ingredients/create")
            .route(web::get().to(show_ingredient_form))
            .route(web::post().to(create_ingredient))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/ingredients")
            .route(web::get().to(list_ingredients))
            .default_service(method_not_allowed("GET")),
    )
    .service(
        web::resource("/ingredients/{id}")
            .route(web::get().to(get_ingredient))
            .route(web::put().to(update_ingredient))
            .route(web::delete().to(delete_ingredient))
            .default_service(method_not_allowed("GET, PUT, DELETE")),
    )
    .service(
        web::resource("/ingredient/{id}")
            .route(web::get().to(confirm_delete_ingredient))
            .route(web::post().to(submit_delete_ingredient))
            .default_service(method_not_allowed("GET, POST")),
    )
    .default_service(web::to(route_not_found));
}
