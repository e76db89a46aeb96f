use std::convert::Infallible;

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};

/// Requires a valid `session` cookie without extracting anything.
pub fn with_auth(secret: String) -> impl Filter<Extract = ((),), Error = Rejection> + Clone {
    warp::cookie::<String>("session").and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_jwt_session(session, secret.as_bytes()) {
                Ok(_) => Ok(()),
                Err(e) => Err(Rejection::from(e)),
            }
        }
    })
}

/// Extracts the authenticated session from the `session` cookie.
pub fn with_session(
    secret: String,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>("session").and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_jwt_session(session, secret.as_bytes()) {
                Ok(data) => Ok(SessionData::from(data)),
                Err(e) => Err(Rejection::from(e)),
            }
        }
    })
}

/// Extracts the session when present, `None` for anonymous callers.
pub fn with_possible_session(
    secret: String,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>("session").map(move |session: Option<String>| {
        session
            .and_then(|token| verify_jwt_session(token, secret.as_bytes()).ok())
            .map(SessionData::from)
    })
}

pub fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

pub fn with_cache(
    cache: MultiplexedConnection,
) -> impl Filter<Extract = (MultiplexedConnection,), Error = Infallible> + Clone {
    warp::any().map(move || cache.clone())
}
