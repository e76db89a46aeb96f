use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error::Error, form::Form};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl TryFrom<Value> for UserRole {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some("user") => Ok(Self::User),
            Some("admin") => Ok(Self::Admin),
            Some(_) => Err(Error::invalid_request("Invalid variant")),
            None => Err(Error::invalid_request("Failed to parse value as string")),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// Registration payload. `password` arrives in the clear and is hashed before
/// it touches the database.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: String,
}

impl TryFrom<&Form> for NewUser {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            username: form.get_str("username")?,
            email: form.get_str("email")?,
            first_name: form.get_opt_str("first_name"),
            last_name: form.get_opt_str("last_name"),
            password: form.get_str("password")?,
        })
    }
}

/// Public view of a user, as listings and recipe details serialize it.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_subscribed: bool,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientRow {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

/// Abbreviated recipe payload used by favorite/cart responses and
/// subscription listings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeSummary {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// One ingredient line of a recipe detail, joined with its amount entry.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredientRow {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub author: UserProfile,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredientRow>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Reference to an ingredient with the amount a recipe requires of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

impl TryFrom<Value> for IngredientAmount {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let id = value
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::invalid_request("Failed to parse ingredient id"))?;
        let amount = value
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::invalid_request("Failed to parse ingredient amount"))?;

        Ok(Self {
            id: id as Uuid,
            amount: amount as i32,
        })
    }
}

/// Create/update payload for a recipe. Tag and ingredient references are
/// resolved and the amount entries replaced atomically by the recipe actions.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
}

impl TryFrom<&Form> for RecipeInput {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let tags = form
            .get_array::<Value>("tags")?
            .into_iter()
            .map(|value| {
                value
                    .as_i64()
                    .map(|id| id as Uuid)
                    .ok_or_else(|| Error::invalid_request("Failed to parse tag id"))
            })
            .collect::<Result<Vec<Uuid>, Error>>()?;

        Ok(Self {
            name: form.get_str("name")?,
            image: form.get_str("image")?,
            text: form.get_str("text")?,
            cooking_time: form.get_number("cooking_time")?,
            tags,
            ingredients: form.get_array("ingredients")?,
        })
    }
}

/// Filters accepted by the paginated recipe listing.
#[derive(Debug, Clone, Default)]
pub struct RecipeListFilter {
    pub author: Option<Uuid>,
    pub tag_slugs: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

/// Raw (ingredient name, unit, amount) triple reachable through a user's
/// shopping cart. One row per amount entry per cart recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// One consolidated shopping-list line: amounts summed over every cart recipe
/// that shares the (name, unit) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// Subscription payload: the followed author plus their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Form;
    use serde_json::json;

    #[test]
    fn recipe_input_from_form() {
        let data = serde_json::from_value(json!({
            "name": "Pancakes",
            "image": "recipe/pancakes.png",
            "text": "Mix and fry.",
            "cooking_time": 20,
            "tags": [1, 2],
            "ingredients": [
                { "id": 3, "amount": 200 },
                { "id": 4, "amount": 2 },
            ],
        }))
        .unwrap();

        let input = RecipeInput::try_from(&Form::from_data(data)).unwrap();
        assert_eq!(input.name, "Pancakes");
        assert_eq!(input.tags, vec![1, 2]);
        assert_eq!(
            input.ingredients,
            vec![
                IngredientAmount { id: 3, amount: 200 },
                IngredientAmount { id: 4, amount: 2 },
            ]
        );
    }

    #[test]
    fn recipe_input_rejects_malformed_ingredients() {
        let data = serde_json::from_value(json!({
            "name": "Pancakes",
            "image": "recipe/pancakes.png",
            "text": "Mix and fry.",
            "cooking_time": 20,
            "tags": [1],
            "ingredients": [{ "id": "three" }],
        }))
        .unwrap();

        assert!(RecipeInput::try_from(&Form::from_data(data)).is_err());
    }

    #[test]
    fn user_role_from_json_value() {
        assert_eq!(UserRole::try_from(json!("admin")).unwrap(), UserRole::Admin);
        assert!(UserRole::try_from(json!("creator")).is_err());
        assert!(UserRole::try_from(json!(3)).is_err());
    }
}
