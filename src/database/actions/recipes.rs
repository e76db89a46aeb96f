use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::{
        COOKING_TIME_MESSAGE, INGREDIENT_AMOUNT_MESSAGE, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT,
        NO_INGREDIENTS_MESSAGE, NO_TAGS_MESSAGE, RECIPE_COUNT_PER_PAGE, RECIPE_NAME_MAX_LENGTH,
    },
    error::Error,
    jwt::SessionData,
    pagination::PageContext,
    schema::{
        IngredientAmount, Recipe, RecipeDetail, RecipeIngredientRow, RecipeInput,
        RecipeListFilter, RecipeRow, RecipeSummary, Uuid,
    },
};

use super::{tags, users};

/// Paginated recipe listing, newest first, with the viewer's favorite and
/// cart flags evaluated per row.
pub async fn fetch_recipes(
    filter: RecipeListFilter,
    offset: i64,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT r.*, ");

    match viewer {
        Some(viewer) => {
            query
                .push("EXISTS(SELECT 1 FROM user_favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(") AS is_favorited, EXISTS(SELECT 1 FROM user_shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(") AS is_in_shopping_cart, ");
        }
        None => {
            query.push("FALSE AS is_favorited, FALSE AS is_in_shopping_cart, ");
        }
    }

    query.push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tag_slugs.is_empty() {
        query
            .push(" AND EXISTS(SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tag_slugs)
            .push("))");
    }
    if let Some(user_id) = filter.favorited_by {
        query
            .push(" AND EXISTS(SELECT 1 FROM user_favorites ff WHERE ff.recipe_id = r.id AND ff.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        query
            .push(" AND EXISTS(SELECT 1 FROM user_shopping_cart cc WHERE cc.recipe_id = r.id AND cc.user_id = ")
            .push_bind(user_id)
            .push(")");
    }

    query
        .push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Full recipe payload: author profile, tags, ingredient lines and the
/// viewer's membership flags.
pub async fn get_recipe_detail(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;

    let author = users::get_profile(recipe.author_id, viewer, pool)
        .await?
        .ok_or_else(|| Error::data_integrity("Recipe references an unknown author"))?;

    let tags = tags::list_recipe_tags(pool, id).await?;

    let ingredients: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, a.amount AS amount
        FROM recipe_ingredients a
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE a.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            is_favorite(id, viewer, pool).await?,
            super::cart::in_cart(id, viewer, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        author,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        created_at: recipe.created_at,
        tags,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
    })
}

/// Resolves a recipe for mutation: authors manage their own recipes, admins
/// manage everything.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::unauthorized(
                        "You don't have permission to perform this action",
                    ))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(Error::not_found("No recipe exists with specified id")),
    }
}

fn validate_recipe_input(input: &RecipeInput) -> Result<(), Error> {
    if input.name.is_empty() || input.name.len() > RECIPE_NAME_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid recipe name length"));
    }
    if input.cooking_time < MIN_COOKING_TIME {
        return Err(Error::invalid_request(COOKING_TIME_MESSAGE));
    }
    if input.ingredients.is_empty() {
        return Err(Error::invalid_request(NO_INGREDIENTS_MESSAGE));
    }
    if input.tags.is_empty() {
        return Err(Error::invalid_request(NO_TAGS_MESSAGE));
    }
    if input
        .ingredients
        .iter()
        .any(|entry| entry.amount < MIN_INGREDIENT_AMOUNT)
    {
        return Err(Error::invalid_request(INGREDIENT_AMOUNT_MESSAGE));
    }

    Ok(())
}

/// Collapses repeated ingredient references into one entry by summing their
/// amounts, preserving first-seen order. Keeps the unique
/// (recipe, ingredient) constraint satisfiable for any input.
fn merge_duplicate_ingredients(ingredients: Vec<IngredientAmount>) -> Vec<IngredientAmount> {
    let mut merged: Vec<IngredientAmount> = Vec::with_capacity(ingredients.len());

    for entry in ingredients {
        match merged.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => existing.amount += entry.amount,
            None => merged.push(entry),
        }
    }

    merged
}

async fn check_references(
    tag_ids: &[Uuid],
    ingredients: &[IngredientAmount],
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(tag_ids)
        .fetch_one(pool)
        .await?;
    if found.0 != tag_ids.len() as i64 {
        return Err(Error::invalid_request("Referenced tag does not exist"));
    }

    let ingredient_ids: Vec<Uuid> = ingredients.iter().map(|entry| entry.id).collect();
    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids)
        .fetch_one(pool)
        .await?;
    if found.0 != ingredient_ids.len() as i64 {
        return Err(Error::invalid_request(
            "Referenced ingredient does not exist",
        ));
    }

    Ok(())
}

async fn insert_tag_links(
    recipe_id: Uuid,
    tag_ids: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tag_ids.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder.build().execute(&mut **tr).await?;

    Ok(())
}

async fn insert_amount_entries(
    recipe_id: Uuid,
    ingredients: &[IngredientAmount],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(ingredients.iter(), |mut b, entry| {
        b.push_bind(recipe_id)
            .push_bind(entry.id)
            .push_bind(entry.amount);
    });

    query_builder.build().execute(&mut **tr).await?;

    Ok(())
}

/// Creates a recipe with its tag links and amount entries in one
/// transaction.
pub async fn create_recipe(
    session: &SessionData,
    input: RecipeInput,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe_input(&input)?;

    let mut tag_ids = input.tags.clone();
    tag_ids.sort_unstable();
    tag_ids.dedup();
    let ingredients = merge_duplicate_ingredients(input.ingredients);
    check_references(&tag_ids, &ingredients, pool).await?;

    let mut tr = pool.begin().await?;

    let recipe: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&input.name)
    .bind(&input.image)
    .bind(&input.text)
    .bind(input.cooking_time)
    .fetch_one(&mut *tr)
    .await?;

    insert_tag_links(recipe.0, &tag_ids, &mut tr).await?;
    insert_amount_entries(recipe.0, &ingredients, &mut tr).await?;

    tr.commit().await?;

    log::info!("User {} created recipe {}", session.user_id, recipe.0);

    Ok(recipe.0)
}

/// Updates recipe fields and atomically replaces its tag links and amount
/// entries: old rows are deleted and the new set inserted in the same
/// transaction.
pub async fn update_recipe(
    id: Uuid,
    session: &SessionData,
    input: RecipeInput,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    validate_recipe_input(&input)?;

    let mut tag_ids = input.tags.clone();
    tag_ids.sort_unstable();
    tag_ids.dedup();
    let ingredients = merge_duplicate_ingredients(input.ingredients);
    check_references(&tag_ids, &ingredients, pool).await?;

    let mut tr = pool.begin().await?;

    sqlx::query("UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5")
        .bind(&input.name)
        .bind(&input.image)
        .bind(&input.text)
        .bind(input.cooking_time)
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    insert_tag_links(recipe.id, &tag_ids, &mut tr).await?;
    insert_amount_entries(recipe.id, &ingredients, &mut tr).await?;

    tr.commit().await?;

    log::info!("User {} updated recipe {}", session.user_id, recipe.id);

    Ok(())
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tr = pool.begin().await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM user_favorites WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM user_shopping_cart WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    tr.commit().await?;

    log::info!("User {} deleted recipe {}", session.user_id, recipe.id);

    Ok(())
}

pub async fn is_favorite(id: Uuid, user_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM user_favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

pub async fn fetch_favorites(
    user_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let rows: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.*,
            TRUE AS is_favorited,
            EXISTS(SELECT 1 FROM user_shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = $1) AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM user_favorites f
        INNER JOIN recipes r ON r.id = f.recipe_id
        WHERE f.user_id = $1
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

pub async fn add_to_favorites(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;

    let result =
        sqlx::query("INSERT INTO user_favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(session.user_id)
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request("Recipe is already in favorites"));
    }

    Ok(RecipeSummary::from(recipe))
}

pub async fn remove_from_favorites(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request("Recipe is not in favorites"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RecipeInput {
        RecipeInput {
            name: String::from("Pancakes"),
            image: String::from("recipe/pancakes.png"),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            tags: vec![1],
            ingredients: vec![
                IngredientAmount { id: 3, amount: 200 },
                IngredientAmount { id: 4, amount: 2 },
            ],
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate_recipe_input(&input()).is_ok());
    }

    #[test]
    fn cooking_time_must_be_at_least_one_minute() {
        let mut input = input();
        input.cooking_time = 0;
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn at_least_one_ingredient_and_tag_required() {
        let mut no_ingredients = input();
        no_ingredients.ingredients.clear();
        assert!(validate_recipe_input(&no_ingredients).is_err());

        let mut no_tags = input();
        no_tags.tags.clear();
        assert!(validate_recipe_input(&no_tags).is_err());
    }

    #[test]
    fn amounts_must_be_at_least_one() {
        let mut input = input();
        input.ingredients[1].amount = 0;
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn duplicate_ingredients_merge_by_summing() {
        let merged = merge_duplicate_ingredients(vec![
            IngredientAmount { id: 3, amount: 200 },
            IngredientAmount { id: 4, amount: 2 },
            IngredientAmount { id: 3, amount: 100 },
        ]);

        assert_eq!(
            merged,
            vec![
                IngredientAmount { id: 3, amount: 300 },
                IngredientAmount { id: 4, amount: 2 },
            ]
        );
    }
}
