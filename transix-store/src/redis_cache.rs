use redis::{AsyncCommands, RedisResult};
use tracing::debug;
use uuid::Uuid;

/// Redis cache for per-schedule seat availability.
///
/// The assignments table stays authoritative; this only keeps the derived
/// count warm so search does not pay a COUNT per schedule. Reserve/release
/// adjust the cached value only when the key exists; a miss is re-seeded
/// from the database by the next read.
#[derive(Clone)]
pub struct AvailabilityCache {
    client: redis::Client,
}

impl AvailabilityCache {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(schedule_id: &Uuid) -> String {
        format!("schedule:{}:availability", schedule_id)
    }

    pub async fn get_count(&self, schedule_id: &Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(Self::key(schedule_id)).await
    }

    pub async fn set_count(&self, schedule_id: &Uuid, count: i64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        debug!("availability cache seeded: {} -> {}", schedule_id, count);
        conn.set(Self::key(schedule_id), count).await
    }

    /// DECR only when the key exists, so a cache miss never seeds a bogus
    /// negative count.
    pub async fn decr(&self, schedule_id: &Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            if redis.call("EXISTS", KEYS[1]) == 1 then
                return redis.call("DECR", KEYS[1])
            else
                return nil
            end
        "#,
        );
        script.key(Self::key(schedule_id)).invoke_async(&mut conn).await
    }

    /// INCR counterpart of `decr`, used when a seat is released.
    pub async fn incr(&self, schedule_id: &Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            if redis.call("EXISTS", KEYS[1]) == 1 then
                return redis.call("INCR", KEYS[1])
            else
                return nil
            end
        "#,
        );
        script.key(Self::key(schedule_id)).invoke_async(&mut conn).await
    }

    pub async fn invalidate(&self, schedule_id: &Uuid) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(Self::key(schedule_id)).await
    }
}
