//! Request forms and their validation.
//!
//! Every form deserializes leniently (all fields optional) so that missing
//! or mistyped values surface as field errors instead of body parse errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{IngredientChanges, RecipeChanges};

pub(crate) const NAME_MAX_LEN: usize = 100;
pub(crate) const SIZE_MAX_LEN: usize = 50;

const REQUIRED: &str = "This field is required.";
const NOT_A_FLOAT: &str = "Not a valid float value.";

/// Field errors of one submission, keyed by field path.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub(crate) fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A scalar that may arrive as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                (n as i64).to_string()
            }
            FieldValue::Number(n) => n.to_string(),
        }
    }

    fn to_float(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max_len: Option<usize>,
) -> Option<String> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(field, format!("Field cannot be longer than {} characters.", max));
            return None;
        }
    }
    Some(value)
}

fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max_len: Option<usize>,
) -> Option<String> {
    // a provided field obeys the same rules as on create
    value.and_then(|v| required_text(errors, field, Some(v), max_len))
}

fn positive_amount(errors: &mut ValidationErrors, field: &str, value: Option<FieldValue>) -> Option<f64> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    match value.to_float() {
        Some(n) if n.is_finite() && n > 0.0 => Some(n),
        Some(_) => {
            errors.add(field, "Amount must be greater than zero.");
            None
        }
        None => {
            errors.add(field, NOT_A_FLOAT);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IngredientInput {
    pub name: String,
    pub size: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct IngredientForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<FieldValue>,
}

impl IngredientForm {
    pub(crate) fn validate(self) -> Result<IngredientInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = required_text(&mut errors, "name", self.name, Some(NAME_MAX_LEN));
        let size = required_text(
            &mut errors,
            "size",
            self.size.map(FieldValue::into_text),
            Some(SIZE_MAX_LEN),
        );
        match (name, size) {
            (Some(name), Some(size)) => errors.into_result(IngredientInput { name, size }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct UpdateIngredientForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<FieldValue>,
}

impl UpdateIngredientForm {
    pub(crate) fn validate(self) -> Result<IngredientChanges, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let changes = IngredientChanges {
            name: optional_text(&mut errors, "name", self.name, Some(NAME_MAX_LEN)),
            size: optional_text(
                &mut errors,
                "size",
                self.size.map(FieldValue::into_text),
                Some(SIZE_MAX_LEN),
            ),
        };
        errors.into_result(changes)
    }
}

/// How a recipe entry points at its ingredient.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IngredientRef {
    Id(i32),
    /// Reused by exact name, or created with `size` when no such row exists.
    Named { name: String, size: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IngredientLine {
    pub target: IngredientRef,
    pub amount: f64,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub(crate) struct IngredientEntry {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<FieldValue>,
    #[serde(default)]
    pub amount: Option<FieldValue>,
}

impl IngredientEntry {
    fn validate(self, index: usize, errors: &mut ValidationErrors) -> Option<IngredientLine> {
        let prefix = format!("ingredients[{}]", index);
        let amount = positive_amount(errors, &format!("{}.amount", prefix), self.amount);

        let target = match (self.id, self.name) {
            (Some(id), _) => Some(IngredientRef::Id(id)),
            (None, name) => {
                let name = required_text(errors, &format!("{}.name", prefix), name, Some(NAME_MAX_LEN));
                let size = optional_text(
                    errors,
                    &format!("{}.size", prefix),
                    self.size.map(FieldValue::into_text),
                    Some(SIZE_MAX_LEN),
                );
                name.map(|name| IngredientRef::Named { name, size })
            }
        };

        Some(IngredientLine {
            target: target?,
            amount: amount?,
        })
    }
}

fn ingredient_lines(
    errors: &mut ValidationErrors,
    entries: Option<Vec<IngredientEntry>>,
) -> Option<Vec<IngredientLine>> {
    let entries = match entries {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            errors.add("ingredients", REQUIRED);
            return None;
        }
    };
    let lines: Vec<_> = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.validate(index, errors))
        .collect();
    lines.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecipeInput {
    pub name: String,
    pub instructions: String,
    pub ingredients: Vec<IngredientLine>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct RecipeForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientEntry>>,
}

impl RecipeForm {
    pub(crate) fn validate(self) -> Result<RecipeInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = required_text(&mut errors, "name", self.name, Some(NAME_MAX_LEN));
        let instructions = required_text(&mut errors, "instructions", self.instructions, None);
        let ingredients = ingredient_lines(&mut errors, self.ingredients);
        match (name, instructions, ingredients) {
            (Some(name), Some(instructions), Some(ingredients)) => errors.into_result(RecipeInput {
                name,
                instructions,
                ingredients,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RecipeUpdate {
    pub changes: RecipeChanges,
    /// `Some` replaces every association of the recipe.
    pub ingredients: Option<Vec<IngredientLine>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct UpdateRecipeForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientEntry>>,
}

impl UpdateRecipeForm {
    pub(crate) fn validate(self) -> Result<RecipeUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let changes = RecipeChanges {
            name: optional_text(&mut errors, "name", self.name, Some(NAME_MAX_LEN)),
            instructions: optional_text(&mut errors, "instructions", self.instructions, None),
        };
        let ingredients = match self.ingredients {
            Some(entries) => ingredient_lines(&mut errors, Some(entries)),
            None => None,
        };
        errors.into_result(RecipeUpdate {
            changes,
            ingredients,
        })
    }
}

/// Urlencoded body of the HTML recipe form.
///
/// The `ingredients` textarea carries one `name, size, amount` entry per line.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct RecipeFormFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
}

impl RecipeFormFields {
    /// Parses the textarea and validates the whole submission, reporting
    /// malformed lines alongside every other field error.
    pub(crate) fn validate(self) -> Result<RecipeInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut entries = Vec::new();
        let text = self.ingredients.unwrap_or_default();

        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [name, size, amount] => entries.push(IngredientEntry {
                    id: None,
                    name: Some(name.to_string()),
                    size: Some(FieldValue::from(*size)),
                    amount: Some(FieldValue::from(*amount)),
                }),
                _ => errors.add(
                    "ingredients",
                    format!("Line {}: expected `name, size, amount`.", number + 1),
                ),
            }
        }

        let form = RecipeForm {
            name: self.name,
            instructions: self.instructions,
            ingredients: Some(entries),
        };
        match form.validate() {
            Ok(input) => errors.into_result(input),
            Err(mut form_errors) => {
                // rejected lines already explain an empty list
                if !errors.is_empty() {
                    form_errors.0.remove("ingredients");
                }
                errors.merge(form_errors);
                Err(errors)
            }
        }
    }
}
