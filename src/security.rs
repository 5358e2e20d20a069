use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode, header::HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AuthState {
    keys: Arc<HashMap<String, AuthContext>>,
    limiter: Arc<RateLimiter>,
}

/// Per-request identity attached as an extension once the key checks out.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub org_id: String,
    pub api_key_id: String,
}

impl AuthState {
    pub fn from_env() -> Self {
        Self {
            keys: Arc::new(load_keys_from_env()),
            limiter: Arc::new(RateLimiter::from_env()),
        }
    }
}

pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(presented) = extract_api_key(request.headers()) else {
        return Ok(error_response(
            StatusCode::UNAUTHORIZED,
            "missing_api_key",
            "Provide X-Mercury-Key or Bearer token",
        ));
    };

    let Some(context) = state.keys.get(&presented).cloned() else {
        return Ok(error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_api_key",
            "Key not recognized",
        ));
    };

    match state.limiter.consume(&context.org_id).await {
        Ok(remaining) => {
            request.extensions_mut().insert(context);
            let mut response = next.run(request).await;
            apply_rate_headers(response.headers_mut(), state.limiter.capacity, remaining, 0);
            Ok(response)
        }
        Err(retry_after) => {
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests",
            );
            apply_rate_headers(response.headers_mut(), state.limiter.capacity, 0.0, retry_after);
            Ok(response)
        }
    }
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get("X-Mercury-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ApiError::new(code, message))).into_response()
}

fn apply_rate_headers(
    headers: &mut http::HeaderMap,
    capacity: f64,
    remaining: f64,
    retry_after_secs: u64,
) {
    let set = |headers: &mut http::HeaderMap, name: &'static str, value: u64| {
        headers.insert(
            name,
            HeaderValue::from_str(&value.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
    };
    set(headers, "X-RateLimit-Limit", capacity as u64);
    set(headers, "X-RateLimit-Remaining", remaining.max(0.0).floor() as u64);
    if retry_after_secs > 0 {
        set(headers, "Retry-After", retry_after_secs);
    }
}

/// `MERCURY_API_KEYS` is `org:key,org:key`; malformed entries are skipped
/// with a warning, an empty table falls back to demo credentials.
fn load_keys_from_env() -> HashMap<String, AuthContext> {
    let raw = env::var("MERCURY_API_KEYS").unwrap_or_else(|_| "demo-org:demo-key".to_string());
    let mut entries = HashMap::new();
    for (idx, token) in raw.split(',').enumerate() {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.split_once(':') {
            Some((org, secret)) if !org.trim().is_empty() && !secret.trim().is_empty() => {
                entries.insert(
                    secret.trim().to_string(),
                    AuthContext {
                        org_id: org.trim().to_string(),
                        api_key_id: format!("key-{:02}", idx + 1),
                    },
                );
            }
            _ => warn!(
                target = "mercury.api",
                "ignored malformed MERCURY_API_KEYS entry: {trimmed}"
            ),
        }
    }

    if entries.is_empty() {
        warn!(
            target = "mercury.api",
            "MERCURY_API_KEYS produced no keys; falling back to demo credentials"
        );
        entries.insert(
            "demo-key".to_string(),
            AuthContext {
                org_id: "demo-org".to_string(),
                api_key_id: "key-01".to_string(),
            },
        );
    } else {
        info!(
            target = "mercury.api",
            key_count = entries.len(),
            "loaded API keys from env"
        );
    }

    entries
}

/// Token bucket per org id. Refill happens lazily on consume.
struct RateLimiter {
    rate_per_sec: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    fn from_env() -> Self {
        Self {
            rate_per_sec: env_f64("RATE_LIMIT_PER_SEC", 5.0, |v| v > 0.0),
            capacity: env_f64("RATE_LIMIT_CAPACITY", 10.0, |v| v >= 1.0),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// `Ok(remaining)` when a token was available, `Err(retry_after_secs)`
    /// otherwise.
    async fn consume(&self, org_id: &str) -> Result<f64, u64> {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets.entry(org_id.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
            bucket.last_refill = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(bucket.tokens)
        } else {
            let retry = ((1.0 - bucket.tokens) / self.rate_per_sec).ceil().max(1.0);
            Err(retry as u64)
        }
    }
}

fn env_f64(key: &str, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| valid(*value))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_drains_and_rejects() {
        let limiter = RateLimiter {
            rate_per_sec: 1.0,
            capacity: 2.0,
            buckets: Mutex::new(HashMap::new()),
        };
        assert!(limiter.consume("org").await.is_ok());
        assert!(limiter.consume("org").await.is_ok());
        assert!(limiter.consume("org").await.is_err());
        // a different org has its own bucket
        assert!(limiter.consume("other").await.is_ok());
    }
}
