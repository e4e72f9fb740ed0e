//! Server-rendered HTML pages.

use actix_web::http::header::ContentType;
use actix_web::HttpResponse;

use crate::forms::{NAME_MAX_LEN, SIZE_MAX_LEN};

fn page(title: &str, body: &str) -> HttpResponse {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    <h1>{title}</h1>
{body}
</body>
</html>
"#
    );
    HttpResponse::Ok().content_type(ContentType::html()).body(html)
}

pub(crate) fn recipe_form() -> HttpResponse {
    let body = format!(
        r#"    <form method="post" action="/recipes/create">
        <p><label>Recipe Name <input type="text" name="name" maxlength="{NAME_MAX_LEN}" required></label></p>
        <p><label>Instructions <textarea name="instructions" rows="8" required></textarea></label></p>
        <p><label>Ingredients, one per line as <code>name, size, amount</code>
            <textarea name="ingredients" rows="6" placeholder="spag, 100g, 1" required></textarea></label></p>
        <p><input type="submit" value="Create Recipe"></p>
    </form>"#
    );
    page("Create Recipe", &body)
}

pub(crate) fn ingredient_form() -> HttpResponse {
    let body = format!(
        r#"    <form method="post" action="/ingredients/create">
        <p><label>Ingredient Name <input type="text" name="name" maxlength="{NAME_MAX_LEN}" required></label></p>
        <p><label>Ingredient Size <input type="text" name="size" maxlength="{SIZE_MAX_LEN}" required></label></p>
        <p><input type="submit" value="Create Ingredient"></p>
    </form>"#
    );
    page("Create Ingredient", &body)
}

/// Confirmation page whose form posts to the delete route at `action`.
pub(crate) fn delete_form(entity: &str, action: &str, id: i32) -> HttpResponse {
    let body = format!(
        r#"    <p>Delete {entity} {id}?</p>
    <form method="post" action="{action}">
        <p><input type="submit" value="Delete"></p>
    </form>"#
    );
    page(&format!("Delete {}", entity), &body)
}
