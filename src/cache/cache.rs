use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// Caching - keys

const REFERENCE_STAMP_KEY: &str = "reference-cache-stamp";

#[derive(Serialize, ToRedisArgs, FromRedisValue, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for String {
    fn from(key: &CacheKey<T>) -> String {
        match key._type {
            CacheKeyType::Tags => format!("tags-{}", key._value.to_string()),
            CacheKeyType::Ingredients => format!("ingredients-{}", key._value.to_string()),
            CacheKeyType::Custom(_) => key._value.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum CacheKeyType {
    Tags,
    Ingredients,
    Custom(String),
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

// Cache - wrappers

/// A cached value stamped with the reference-data generation it was computed
/// from. Bumping the generation invalidates every stamped entry at once.
#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct CachedValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _stamp: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> CachedValue<T> {
    async fn new(value: T, cache: &mut MultiplexedConnection) -> Result<Self, Error> {
        let stamp = current_generation(cache).await?;

        Ok(Self {
            value,
            _stamp: stamp,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, Error> {
        Ok(self._stamp == current_generation(cache).await?)
    }

    pub async fn get_or<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<CachedValue<T>, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'a,
    {
        let value = get_cache_value::<String, CachedValue<T>>((&key).into(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            });

        let value = match value {
            Some(value) => {
                log::trace!("> Found {:?}", key.to_string());
                match value.validate(cache).await? {
                    true => Some(value),
                    false => {
                        log::trace!("> Invalidated {}", key.to_string());
                        None
                    }
                }
            }
            None => None,
        };

        match value {
            Some(value) => Ok(value),
            None => {
                log::trace!("> Fetching {:?}", key.to_string());
                let value = callback().await?;
                let value = CachedValue::new(value, cache).await?;

                if let Err(e) =
                    set_cache_value::<String, CachedValue<T>>((&key).into(), value.clone(), cache)
                        .await
                {
                    log::error!("{e:?}");
                }

                Ok(value)
            }
        }
    }

    pub async fn get_or_list<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<CachedValue<Vec<T>>, Error>
    where
        Vec<T>: serde::Serialize + Send + Sync,
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, Error>> + Send + 'a,
    {
        CachedValue::<Vec<T>>::get_or(key, cache, callback).await
    }
}

/// Reads the current reference-data generation stamp. `None` until the first
/// invalidation.
pub async fn current_generation(
    cache: &mut MultiplexedConnection,
) -> Result<Option<String>, Error> {
    get_cache_value::<&str, String>(REFERENCE_STAMP_KEY, cache).await
}

/// Bumps the generation stamp, invalidating every stamped cache entry.
pub async fn invalidate_reference_cache(cache: &mut MultiplexedConnection) -> Result<(), Error> {
    let stamp = uuid::Uuid::new_v4().to_string();
    log::trace!("> Bumping reference cache generation to {stamp}");
    set_cache_value(REFERENCE_STAMP_KEY, stamp, cache).await
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.set(key, value).await?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.del(key).await?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_with_their_prefix() {
        assert_eq!(CacheKeyType::Tags.new("all").to_string(), "tags-all");
        assert_eq!(
            CacheKeyType::Ingredients.new(7).to_string(),
            "ingredients-7"
        );
        assert_eq!(
            CacheKeyType::Custom(String::from("misc")).new("misc-key").to_string(),
            "misc-key"
        );
    }
}
