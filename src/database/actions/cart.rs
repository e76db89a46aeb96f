use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::Error,
    jwt::SessionData,
    pagination::PageContext,
    schema::{AmountRow, RecipeRow, RecipeSummary, Uuid},
};

use super::recipes;

pub async fn in_cart(id: Uuid, user_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM user_shopping_cart WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

pub async fn fetch_cart(
    user_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let rows: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.*,
            EXISTS(SELECT 1 FROM user_favorites f WHERE f.recipe_id = r.id AND f.user_id = $1) AS is_favorited,
            TRUE AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM user_shopping_cart c
        INNER JOIN recipes r ON r.id = c.recipe_id
        WHERE c.user_id = $1
        ORDER BY r.created_at DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(RECIPE_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);

    Ok(page)
}

pub async fn add_to_cart(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let recipe = recipes::get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;

    let result = sqlx::query(
        "INSERT INTO user_shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request("Recipe is already in shopping cart"));
    }

    Ok(RecipeSummary::from(recipe))
}

pub async fn remove_from_cart(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let result = sqlx::query("DELETE FROM user_shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request("Recipe is not in shopping cart"));
    }

    Ok(())
}

/// Every (ingredient name, unit, amount) triple reachable through the user's
/// cart, one row per amount entry per cart recipe. An amount entry whose
/// ingredient row is missing is a broken foreign key and fails the whole
/// query rather than dropping the row.
pub async fn list_cart_amount_rows(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<AmountRow>, Error> {
    let rows: Vec<(Option<String>, Option<String>, i32)> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, a.amount
        FROM user_shopping_cart c
        INNER JOIN recipe_ingredients a ON a.recipe_id = c.recipe_id
        LEFT JOIN ingredients i ON i.id = a.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(name, measurement_unit, amount)| match (name, measurement_unit) {
            (Some(name), Some(measurement_unit)) => Ok(AmountRow {
                name,
                measurement_unit,
                amount,
            }),
            _ => Err(Error::data_integrity(
                "Cart references an unknown ingredient",
            )),
        })
        .collect()
}
