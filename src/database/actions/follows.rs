use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    constants::{NO_SUBSCRIPTION, SUBSCRIBE_TO_YOURSELF, SUBSCRIPTION_COUNT_PER_PAGE},
    error::Error,
    jwt::SessionData,
    pagination::PageContext,
    schema::{RecipeSummary, Subscription, Uuid},
};

use super::users;

pub async fn is_subscribed(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT author_id FROM user_follows WHERE user_id = $1 AND author_id = $2
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// Assembles the subscription payload for one author: profile fields plus
/// their recipes, newest first.
async fn get_subscription(
    author_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    let author = users::get_user_by_id(pool, author_id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))?;

    let recipes: Vec<RecipeSummary> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time
        FROM recipes
        WHERE author_id = $1
        ORDER BY created_at DESC
    ",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    let is_subscribed = is_subscribed(user_id, author_id, pool).await?;
    let recipes_count = recipes.len() as i64;

    Ok(Subscription {
        id: author.id,
        email: author.email,
        username: author.username,
        first_name: author.first_name,
        last_name: author.last_name,
        is_subscribed,
        recipes,
        recipes_count,
    })
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    if session.user_id == author_id {
        return Err(Error::invalid_request(SUBSCRIBE_TO_YOURSELF));
    }
    if users::get_user_by_id(pool, author_id).await?.is_none() {
        return Err(Error::not_found("No user exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO user_follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request("Already subscribed to this author"));
    }

    log::info!("User {} subscribed to {}", session.user_id, author_id);

    get_subscription(author_id, session.user_id, pool).await
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnMemberships)?;

    let result = sqlx::query("DELETE FROM user_follows WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::invalid_request(NO_SUBSCRIPTION));
    }

    log::info!("User {} unsubscribed from {}", session.user_id, author_id);

    Ok(())
}

pub async fn fetch_subscriptions(
    user_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, Error> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "
        SELECT author_id, COUNT(*) OVER() AS count
        FROM user_follows
        WHERE user_id = $1
        ORDER BY author_id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|p| p.1).unwrap_or(0);

    let mut subscriptions = Vec::with_capacity(rows.len());
    for (author_id, _) in rows {
        subscriptions.push(get_subscription(author_id, user_id, pool).await?);
    }

    let page = PageContext::from_rows(
        subscriptions,
        total_count,
        SUBSCRIPTION_COUNT_PER_PAGE,
        offset,
    );

    Ok(page)
}
