use crate::progress::{ProgressError, ProgressRecord, ProgressStore};
use async_trait::async_trait;
use lazy_static::lazy_static;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

/// Redis key semantics for player progress
/// Keeps the API and any future background job agreeing on key names

pub const PROGRESS_PREFIX: &str = "recoder:progress";

/// Progress key for a player
pub fn progress_key(user_id: &Uuid) -> String {
    format!("{}:{}", PROGRESS_PREFIX, user_id)
}

/// Load a player's progress; missing keys are a fresh record
pub async fn get_progress(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &Uuid,
) -> Result<ProgressRecord, ProgressError> {
    let key = progress_key(user_id);
    let payload: Option<String> = conn.get(&key).await?;

    match payload {
        Some(data) => Ok(serde_json::from_str(&data)?),
        None => Ok(ProgressRecord::default()),
    }
}

/// Persist a player's progress. No TTL: streaks are long-lived.
pub async fn store_progress(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &Uuid,
    record: &ProgressRecord,
) -> Result<(), ProgressError> {
    let key = progress_key(user_id);
    let payload = serde_json::to_string(record)?;
    let _: () = conn.set(&key, payload).await?;
    Ok(())
}

/// Retries before a contended update gives up
pub const MAX_UPDATE_ATTEMPTS: usize = 32;

lazy_static! {
    /// KEYS[1] = progress key
    /// ARGV[1] = "1" if the key existed when read, ARGV[2] = payload read,
    /// ARGV[3] = payload to write. Returns 1 when written, 0 on conflict.
    static ref COMPARE_AND_SET: Script = Script::new(
        r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
  if current ~= ARGV[2] then
    return 0
  end
elseif current then
  return 0
end
redis.call('SET', KEYS[1], ARGV[3])
return 1
"#
    );
}

/// Apply `change` to a player's progress atomically. The write only lands
/// if nobody else wrote the key since it was read; otherwise re-read and retry.
pub async fn update_progress(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &Uuid,
    change: &(dyn for<'a> Fn(&'a ProgressRecord) -> ProgressRecord + Send + Sync),
) -> Result<ProgressRecord, ProgressError> {
    let key = progress_key(user_id);

    for _ in 0..MAX_UPDATE_ATTEMPTS {
        let payload: Option<String> = conn.get(&key).await?;
        let current = match &payload {
            Some(data) => serde_json::from_str(data)?,
            None => ProgressRecord::default(),
        };

        let updated = change(&current);
        if updated == current {
            return Ok(updated);
        }

        let written: i32 = COMPARE_AND_SET
            .key(&key)
            .arg(if payload.is_some() { "1" } else { "0" })
            .arg(payload.as_deref().unwrap_or(""))
            .arg(serde_json::to_string(&updated)?)
            .invoke_async(conn)
            .await?;
        if written == 1 {
            return Ok(updated);
        }
    }

    Err(ProgressError::Contention(MAX_UPDATE_ATTEMPTS))
}

/// `ProgressStore` bound to one player
#[derive(Clone)]
pub struct RedisProgressStore {
    conn: redis::aio::ConnectionManager,
    user_id: Uuid,
}

impl RedisProgressStore {
    pub fn new(conn: redis::aio::ConnectionManager, user_id: Uuid) -> Self {
        Self { conn, user_id }
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn load(&self) -> Result<ProgressRecord, ProgressError> {
        // ConnectionManager is a cheap handle; clone to get a mutable one
        let mut conn = self.conn.clone();
        get_progress(&mut conn, &self.user_id).await
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        let mut conn = self.conn.clone();
        store_progress(&mut conn, &self.user_id, record).await
    }

    async fn update(
        &self,
        change: &(dyn for<'a> Fn(&'a ProgressRecord) -> ProgressRecord + Send + Sync),
    ) -> Result<ProgressRecord, ProgressError> {
        let mut conn = self.conn.clone();
        update_progress(&mut conn, &self.user_id, change).await
    }
}
