use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::Error;

/// Runtime configuration, deserialized from the environment.
///
/// `DATABASE_URL`, `REDIS_URL` and `JWT_SECRET` are required;
/// `SESSION_TTL_HOURS` falls back to 24.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_session_ttl_hours() -> i64 {
    24
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        envy::from_env::<Config>().map_err(|e| Error::Configuration(e.to_string()))
    }

    pub async fn build_pool(&self) -> Result<Pool<Postgres>, Error> {
        log::debug!("Building postgres pool");
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&self.database_url)
            .await?;

        Ok(pool)
    }

    pub async fn build_cache(&self) -> Result<MultiplexedConnection, Error> {
        log::debug!("Opening redis connection");
        let client = redis::Client::open(self.redis_url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(connection)
    }
}

/// Wires `env_logger` for binaries and tests. Calling it twice is a no-op.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_environment() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/foodshare");
        std::env::set_var("REDIS_URL", "redis://localhost");
        std::env::set_var("JWT_SECRET", "test-secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://localhost/foodshare");
        assert_eq!(config.session_ttl_hours, 24);
    }
}
