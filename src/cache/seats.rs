use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::models::{EventId, SeatStatus, SeatView};

/// Максимальное время жизни закешированного списка мест (секунды).
pub const MAX_SEATS_TTL: u64 = 30;

// Поколение списка мест события. Каждая инвалидация его увеличивает,
// а снимок пишется под тем поколением, которое было прочитано до похода в БД.
// Читатель, загрузивший места до коммита брони, пишет в уже мёртвый ключ.
fn generation_key(event_id: EventId) -> String {
    format!("seats:{}:gen", event_id)
}

fn seats_key(event_id: EventId, generation: u64) -> String {
    format!("seats:{}:{}", event_id, generation)
}

/// TTL не дольше, чем до ближайшего истечения брони: иначе кеш показывал бы
/// место занятым после того, как оно логически освободилось.
pub fn seat_cache_ttl(seats: &[SeatView], now: DateTime<Utc>, max: u64) -> u64 {
    seats
        .iter()
        .filter(|s| s.status == SeatStatus::Reserved)
        .filter_map(|s| s.reserved_until)
        .map(|until| (until - now).num_seconds().max(1) as u64)
        .min()
        .unwrap_or(max)
        .min(max)
}

impl CacheService {
    pub async fn seats_generation(&self, event_id: EventId) -> Result<u64, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let generation: Option<u64> = conn.get(generation_key(event_id)).await?;
        Ok(generation.unwrap_or(0))
    }

    pub async fn get_event_seats(
        &self,
        event_id: EventId,
        generation: u64,
    ) -> Result<Option<Vec<SeatView>>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(seats_key(event_id, generation)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let seats: Vec<SeatView> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(Some(seats))
    }

    pub async fn save_event_seats(
        &self,
        event_id: EventId,
        generation: u64,
        seats: &[SeatView],
        now: DateTime<Utc>,
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let ttl = seat_cache_ttl(seats, now, MAX_SEATS_TTL);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(seats_key(event_id, generation), data, ttl).await
    }

    // Инвалидировать кеш мест события: новое поколение, старый снимок удаляем
    pub async fn invalidate_seats(&self, event_id: EventId) {
        let mut conn = self.redis.conn.clone();
        match conn.incr::<_, _, u64>(generation_key(event_id), 1).await {
            Ok(generation) => {
                debug!("Invalidated seats cache for event {} (generation {})", event_id, generation);
                if let Err(e) = conn.del::<_, ()>(seats_key(event_id, generation.saturating_sub(1))).await {
                    debug!("Failed to drop old seats snapshot for event {}: {:?}", event_id, e);
                }
            }
            Err(e) => warn!("Failed to invalidate seats cache for event {}: {:?}", event_id, e),
        }
    }
}
