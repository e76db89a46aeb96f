use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    cache::cache::{invalidate_reference_cache, CacheKeyType, CachedValue},
    constants::{DEFAULT_TAGS, TAG_COLOR_MAX_LENGTH, TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH},
    error::Error,
    jwt::SessionData,
    schema::{Tag, Uuid},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

/// Cached variant of [`list_tags`]. Tags are reference data and only change
/// when an admin creates one, which bumps the cache generation.
pub async fn list_tags_cached(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Tag>, Error> {
    let pool = pool.clone();
    let cached = CachedValue::get_or_list(CacheKeyType::Tags.new("all"), cache, move || async move {
        list_tags(&pool).await
    })
    .await?;

    Ok(cached.value)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|tag| tag.0))
}

fn validate_tag(name: &str, color: &str, slug: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > TAG_NAME_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid tag name length"));
    }
    if color.len() > TAG_COLOR_MAX_LENGTH || !color.starts_with('#') {
        return Err(Error::invalid_request("Color must be a hex literal"));
    }
    if slug.is_empty() || slug.len() > TAG_SLUG_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid tag slug length"));
    }

    Ok(())
}

pub async fn create_tag(
    session: &SessionData,
    name: &str,
    color: &str,
    slug: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Uuid, Error> {
    session.authenticate(ActionType::ManageTags)?;
    validate_tag(name, color, slug)?;

    let id: Option<(Uuid,)> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING id",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => {
            invalidate_reference_cache(cache).await?;
            log::info!("User {} created tag {slug}", session.user_id);
            Ok(id.0)
        }
        None => Err(Error::invalid_request("Tag already exists")),
    }
}

/// Loads the default tag set. Existing tags are left untouched, so the call
/// is safe to repeat on deploy.
pub async fn seed_default_tags(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    for (name, color, slug) in DEFAULT_TAGS {
        sqlx::query("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(name)
            .bind(color)
            .bind(slug)
            .execute(pool)
            .await?;
    }

    invalidate_reference_cache(cache).await?;
    log::info!("Seeded default tags");

    Ok(())
}

pub async fn list_recipe_tags(pool: &Pool<Postgres>, recipe_id: Uuid) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_validation() {
        assert!(validate_tag("Breakfast", "#E26C2D", "breakfast").is_ok());
        assert!(validate_tag("", "#E26C2D", "breakfast").is_err());
        assert!(validate_tag("Breakfast", "E26C2D", "breakfast").is_err());
        assert!(validate_tag("Breakfast", "#E26C2D11", "breakfast").is_err());
        assert!(validate_tag("Breakfast", "#E26C2D", "").is_err());
    }
}
