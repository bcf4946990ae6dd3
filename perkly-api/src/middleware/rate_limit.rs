use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::state::AppState;

const IDLE_EVICTION: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

struct Buckets {
    by_client: HashMap<String, Bucket>,
    last_sweep: Instant,
}

/// Per-client token bucket: `capacity` requests per `window`, refilled continuously.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(requests: u32, window: Duration) -> Self {
        let capacity = f64::from(requests.max(1));
        let window = window.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            refill_per_sec: capacity / window,
            buckets: Mutex::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Takes one token for `client`; `false` means the request should be refused.
    pub async fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        if now.duration_since(buckets.last_sweep) >= SWEEP_INTERVAL {
            buckets
                .by_client
                .retain(|_, b| now.duration_since(b.last_refill) < IDLE_EVICTION);
            buckets.last_sweep = now;
        }

        let bucket = buckets
            .by_client
            .entry(client.to_string())
            .or_insert(Bucket {
                tokens: self.capacity,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.by_client.len()
    }
}

/// First `X-Forwarded-For` hop, then the peer address, then a shared bucket.
fn client_key(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(req).await;
    };

    let client = client_key(&req);
    if limiter.check(&client).await {
        next.run(req).await
    } else {
        tracing::warn!("Rate limit exceeded for {}", client);
        AppError::RateLimited.into_response()
    }
}
