use regex_lite::Regex;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    constants::{
        EMAIL_MAX_LENGTH, FIRST_NAME_MAX_LENGTH, INVALID_CREDENTIALS, LAST_NAME_MAX_LENGTH,
        USERNAME_MAX_LENGTH, USER_COUNT_PER_PAGE,
    },
    error::Error,
    pagination::PageContext,
    schema::{NewUser, User, UserProfile, UserRow, Uuid},
};

use super::follows;

pub fn validate_username(username: &str) -> Result<(), Error> {
    if username.is_empty() || username.len() > USERNAME_MAX_LENGTH {
        return Err(Error::invalid_request("Invalid username length"));
    }

    let pattern = Regex::new(r"^[\w.@+-]+$").map_err(|_| Error::internal("Invalid pattern"))?;
    if !pattern.is_match(username) {
        return Err(Error::invalid_request(
            "Username may only contain letters, digits and .@+-",
        ));
    }

    Ok(())
}

fn validate_new_user(input: &NewUser) -> Result<(), Error> {
    validate_username(&input.username)?;

    if input.email.is_empty() || input.email.len() > EMAIL_MAX_LENGTH || !input.email.contains('@')
    {
        return Err(Error::invalid_request("Invalid email"));
    }
    if input
        .first_name
        .as_deref()
        .is_some_and(|name| name.len() > FIRST_NAME_MAX_LENGTH)
    {
        return Err(Error::invalid_request("Invalid first name length"));
    }
    if input
        .last_name
        .as_deref()
        .is_some_and(|name| name.len() > LAST_NAME_MAX_LENGTH)
    {
        return Err(Error::invalid_request("Invalid last name length"));
    }
    if input.password.is_empty() {
        return Err(Error::invalid_request("Password cannot be empty"));
    }

    Ok(())
}

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Public profile of a user, with the subscription flag evaluated for the
/// viewing user when one is present.
pub async fn get_profile(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserProfile>, Error> {
    let user = get_user_by_id(pool, user_id).await?;

    match user {
        Some(user) => {
            let is_subscribed = match viewer {
                Some(viewer) => follows::is_subscribed(viewer, user.id, pool).await?,
                None => false,
            };

            Ok(Some(UserProfile {
                id: user.id,
                username: user.username,
                email: user.email,
                first_name: user.first_name,
                last_name: user.last_name,
                is_subscribed,
            }))
        }
        None => Ok(None),
    }
}

/// Creates a user account. The password is hashed before insert, and the
/// `on_user_created` hook runs once the row is committed.
pub async fn register_user(input: NewUser, pool: &Pool<Postgres>) -> Result<User, Error> {
    validate_new_user(&input)?;

    let password_hash =
        hash_password(&input.password).map_err(|_| Error::internal("Failed to hash password"))?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, 'user')
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&password_hash)
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) => {
            on_user_created(&user);
            Ok(user)
        }
        None => Err(Error::invalid_request("Username or email already taken")),
    }
}

/// Runs once per freshly created account. Kept as an explicit call so the
/// side effects of registration stay visible at the call site; attach
/// welcome flows here.
pub fn on_user_created(user: &User) {
    log::info!("Created user {} ({})", user.username, user.id);
}

pub async fn login_user(
    username: &str,
    password: &str,
    secret: &[u8],
    ttl_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user(pool, username).await?;
    let user = match user {
        Some(user) => user,
        None => return Err(Error::invalid_request(INVALID_CREDENTIALS)),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| Error::internal("Corrupt password hash"))?;
    if !authenticated {
        return Err(Error::invalid_request(INVALID_CREDENTIALS));
    }

    let session = generate_jwt_session(&user, secret, ttl_hours)?;

    Ok(session)
}

/// Replaces the password after verifying the current one.
pub async fn change_password(
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))?;

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|_| Error::internal("Corrupt password hash"))?;
    if !authenticated {
        return Err(Error::invalid_request(INVALID_CREDENTIALS));
    }
    if new_password.is_empty() {
        return Err(Error::invalid_request("Password cannot be empty"));
    }

    let password_hash =
        hash_password(new_password).map_err(|_| Error::internal("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

    log::info!("User {} changed their password", user_id);

    Ok(())
}

/// Paginated user listing with an optional username/email search and the
/// subscription flag evaluated for the viewer.
pub async fn fetch_users(
    search: Option<String>,
    offset: i64,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserRow>, Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT u.id, u.username, u.email, u.first_name, u.last_name, ");

    match viewer {
        Some(viewer) => {
            query
                .push("EXISTS(SELECT 1 FROM user_follows w WHERE w.user_id = ")
                .push_bind(viewer)
                .push(" AND w.author_id = u.id) AS is_subscribed, ");
        }
        None => {
            query.push("FALSE AS is_subscribed, ");
        }
    }

    query.push("COUNT(*) OVER() AS count FROM users u");

    if let Some(search) = search {
        let pattern = format!("%{search}%");
        query
            .push(" WHERE (u.username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    query
        .push(" ORDER BY u.id LIMIT ")
        .push_bind(USER_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<UserRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, USER_COUNT_PER_PAGE, offset);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_follow_the_character_class() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.lice+test@home-1").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("alice bob").is_err());
        assert!(validate_username("alice#1").is_err());
        assert!(validate_username(&"a".repeat(USERNAME_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn new_user_validation() {
        let input = NewUser {
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            first_name: Some(String::from("Alice")),
            last_name: None,
            password: String::from("hunter2"),
        };
        assert!(validate_new_user(&input).is_ok());

        let mut bad_email = input.clone();
        bad_email.email = String::from("not-an-email");
        assert!(validate_new_user(&bad_email).is_err());

        let mut empty_password = input.clone();
        empty_password.password = String::new();
        assert!(validate_new_user(&empty_password).is_err());
    }
}
