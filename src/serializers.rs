use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FIELD_LEN, MIN_PASSWORD_LEN};
use crate::database::schema::{Attribute, Recipe, User};
use crate::error::ApiError;

// ---- field helpers

/// Lowercases the whole address before any uniqueness check. The entire
/// address is normalized, not just the domain; account identity is defined
/// on the lowercased form.
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::validation("email", "This field may not be blank."));
    }
    if email.chars().count() > MAX_FIELD_LEN {
        return Err(ApiError::validation(
            "email",
            "Ensure this field has no more than 255 characters.",
        ));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email.to_lowercase())
        }
        _ => Err(ApiError::validation("email", "Enter a valid email address.")),
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "password",
            "Ensure this field has at least 5 characters.",
        ));
    }
    Ok(())
}

fn validate_char_field(field: &str, value: &str, required: bool) -> Result<(), ApiError> {
    if required && value.trim().is_empty() {
        return Err(ApiError::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(ApiError::validation(
            field,
            "Ensure this field has no more than 255 characters.",
        ));
    }
    Ok(())
}

/// Comma-separated id list from a query parameter. An empty parameter
/// resolves to an empty list.
pub fn parse_id_list(field: &str, raw: &str) -> Result<Vec<i32>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>().map_err(|_| {
                ApiError::validation(field, "Expected a comma-separated list of numeric ids.")
            })
        })
        .collect()
}

pub fn parse_assigned_only(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw {
        None => Ok(false),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map(|n| n != 0)
            .map_err(|_| ApiError::validation("assigned_only", "A valid integer is required.")),
    }
}

/// Price field tolerating both JSON numbers and numeric strings, the way
/// form-encoded clients submit them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    pub fn resolve(&self) -> Result<f64, ApiError> {
        let value = match self {
            PriceInput::Number(n) => *n,
            PriceInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ApiError::validation("price", "A valid number is required."))?,
        };

        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::validation(
                "price",
                "Ensure this value is greater than or equal to 0.",
            ));
        }

        let cents = value * 100.0;
        if (cents - cents.round()).abs() > 1e-6 {
            return Err(ApiError::validation(
                "price",
                "Ensure that there are no more than 2 decimal places.",
            ));
        }

        Ok(cents.round() / 100.0)
    }
}

// ---- user payloads

#[derive(Debug, Deserialize)]
pub struct RegisterUserPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

impl RegisterUserPayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        normalize_email(&self.email)?;
        validate_password(&self.password)?;
        validate_char_field("name", &self.name, false)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfilePayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UpdateProfilePayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(email) = &self.email {
            normalize_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(name) = &self.name {
            validate_char_field("name", name, false)?;
        }
        Ok(())
    }
}

// ---- tag / ingredient payloads

#[derive(Debug, Deserialize)]
pub struct AttributePayload {
    pub name: String,
}

impl AttributePayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_char_field("name", &self.name, true)
    }
}

// ---- recipe payloads

/// Incoming recipe body for create and update. All fields optional at the
/// parse stage; `into_changes` validates whatever is present and
/// `RecipeChanges::require_complete` enforces the full scalar set for
/// create/PUT. Any owner value a client submits has no field here and is
/// dropped on the floor.
#[derive(Debug, Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<PriceInput>,
    pub link: Option<String>,
    pub tags: Option<Vec<AttributePayload>>,
    pub ingredients: Option<Vec<AttributePayload>>,
}

/// Validated recipe mutation. `None` means "leave untouched"; for the
/// nested name lists, `Some(vec![])` means "clear the association".
#[derive(Debug, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<f64>,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipePayload {
    pub fn into_changes(self) -> Result<RecipeChanges, ApiError> {
        if let Some(title) = &self.title {
            validate_char_field("title", title, true)?;
        }
        if let Some(link) = &self.link {
            validate_char_field("link", link, false)?;
        }

        let time_minutes = match self.time_minutes {
            Some(minutes) if minutes >= 1 && minutes <= i32::MAX as i64 => Some(minutes as i32),
            Some(_) => {
                return Err(ApiError::validation(
                    "time_minutes",
                    "Ensure this value is greater than or equal to 1.",
                ))
            }
            None => None,
        };

        let price = match &self.price {
            Some(price) => Some(price.resolve()?),
            None => None,
        };

        let tags = match self.tags {
            Some(tags) => Some(validate_names("tags", tags)?),
            None => None,
        };
        let ingredients = match self.ingredients {
            Some(ingredients) => Some(validate_names("ingredients", ingredients)?),
            None => None,
        };

        Ok(RecipeChanges {
            title: self.title,
            description: self.description,
            time_minutes,
            price,
            link: self.link,
            tags,
            ingredients,
        })
    }
}

fn validate_names(field: &str, entries: Vec<AttributePayload>) -> Result<Vec<String>, ApiError> {
    entries
        .into_iter()
        .map(|entry| {
            validate_char_field(field, &entry.name, true)?;
            Ok(entry.name)
        })
        .collect()
}

impl RecipeChanges {
    /// Full scalar field set, required on create and PUT.
    pub fn require_complete(&self) -> Result<(), ApiError> {
        if self.title.is_none() {
            return Err(ApiError::validation("title", "This field is required."));
        }
        if self.time_minutes.is_none() {
            return Err(ApiError::validation(
                "time_minutes",
                "This field is required.",
            ));
        }
        if self.price.is_none() {
            return Err(ApiError::validation("price", "This field is required."));
        }
        Ok(())
    }
}

// ---- output shapes

#[derive(Debug, Serialize)]
pub struct UserOut {
    pub email: String,
    pub name: String,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttributeOut {
    pub id: i32,
    pub name: String,
}

impl From<Attribute> for AttributeOut {
    fn from(attribute: Attribute) -> Self {
        Self {
            id: attribute.id,
            name: attribute.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
}

impl From<Recipe> for RecipeListItem {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub description: String,
    pub image: Option<String>,
    pub tags: Vec<AttributeOut>,
    pub ingredients: Vec<AttributeOut>,
}

impl RecipeDetail {
    pub fn from_parts(recipe: Recipe, tags: Vec<Attribute>, ingredients: Vec<Attribute>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            description: recipe.description,
            image: recipe.image,
            tags: tags.into_iter().map(AttributeOut::from).collect(),
            ingredients: ingredients.into_iter().map(AttributeOut::from).collect(),
        }
    }
}
