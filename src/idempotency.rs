use crate::models::SubmitResponse;
use redis::AsyncCommands;

// Replay cache for the final create-or-update: an Idempotency-Key that was
// already answered returns the stored receipt instead of re-submitting.

pub async fn redis_get(client: &redis::Client, key: &str) -> Option<SubmitResponse> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(_) => return None,
    };
    let stored: Option<String> = conn.get(key).await.ok();
    stored.and_then(|value| serde_json::from_str(&value).ok())
}

pub async fn redis_set(client: &redis::Client, key: &str, value: &SubmitResponse, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}
