use crate::redis_client::RedisClient;

pub mod seats;

pub use seats::seat_cache_ttl;

/// Кеш списка мест в Redis. Только ускоряет чтение: источник правды - хранилище,
/// поэтому любая ошибка Redis означает "идём в БД".
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}
