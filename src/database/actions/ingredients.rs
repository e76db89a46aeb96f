use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::permissions::ActionType,
    cache::cache::{invalidate_reference_cache, CacheKeyType, CachedValue},
    constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH},
    error::Error,
    jwt::SessionData,
    schema::{Ingredient, Uuid},
};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Cached variant of [`list_ingredients`] for the full reference listing.
pub async fn list_ingredients_cached(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Ingredient>, Error> {
    let pool = pool.clone();
    let cached = CachedValue::get_or_list(
        CacheKeyType::Ingredients.new("all"),
        cache,
        move || async move { list_ingredients(&pool).await },
    )
    .await?;

    Ok(cached.value)
}

/// Name-startswith lookup backing the ingredient picker.
pub async fn fetch_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(format!("{prefix}%"))
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

fn validate_ingredient(name: &str, measurement_unit: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > INGREDIENT_NAME_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid ingredient name length"));
    }
    if measurement_unit.is_empty() || measurement_unit.len() > MEASUREMENT_UNIT_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid measurement unit length"));
    }

    Ok(())
}

pub async fn create_ingredient(
    session: &SessionData,
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Uuid, Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    validate_ingredient(name, measurement_unit)?;

    let id: Option<(Uuid,)> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => {
            invalidate_reference_cache(cache).await?;
            log::info!("User {} created ingredient {name}", session.user_id);
            Ok(id.0)
        }
        None => Err(Error::invalid_request("Ingredient already exists")),
    }
}

/// Bulk load of (name, measurement unit) pairs, the deploy-time import path.
/// Pairs already present are skipped.
pub async fn import_ingredients(
    pairs: &[(String, String)],
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    if !pairs.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(pairs.iter().take(65535 / 2), |mut b, (name, unit)| {
            b.push_bind(name).push_bind(unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        query_builder.build().execute(pool).await?;

        invalidate_reference_cache(cache).await?;
        log::info!("Imported {} ingredients", pairs.len());
    }

    Ok(())
}

/// Parses the `name,unit` line format of the bundled ingredient data. Names
/// may contain commas, units never do, so the split runs from the right.
pub fn parse_ingredient_csv(content: &str) -> Result<Vec<(String, String)>, Error> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (name, unit) = line
                .rsplit_once(',')
                .ok_or_else(|| Error::invalid_request("Malformed ingredient row"))?;

            let name = name.trim().trim_matches('"');
            let unit = unit.trim();
            validate_ingredient(name, unit)?;

            Ok((name.to_string(), unit.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_split_from_the_right() {
        let rows = parse_ingredient_csv("flour,g\n\"apricots, canned\",pcs\n\negg,pcs\n").unwrap();
        assert_eq!(
            rows,
            vec![
                (String::from("flour"), String::from("g")),
                (String::from("apricots, canned"), String::from("pcs")),
                (String::from("egg"), String::from("pcs")),
            ]
        );
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(parse_ingredient_csv("flour g").is_err());
        assert!(parse_ingredient_csv(",g").is_err());
        assert!(parse_ingredient_csv("flour,").is_err());
    }
}
