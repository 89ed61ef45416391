use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info};

use crate::api::error::ErrorKind;
use crate::api::handler_utils::error_response;
use crate::api::server::AppState;

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimit {
    pub window_secs: u64,
    pub max_requests: u32,
}

/// Per-route request budgets. Composition routes are expensive external
/// calls, so their budgets sit far below the asset-listing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    routes: Vec<(String, RouteLimit)>,
    default: RouteLimit,
}

impl RateLimitConfig {
    pub fn new(routes: Vec<(String, RouteLimit)>, default: RouteLimit) -> Self {
        Self { routes, default }
    }

    pub fn limit_for(&self, path: &str) -> RouteLimit {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, limit)| *limit)
            .unwrap_or(self.default)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(
            vec![
                (
                    String::from("/api/assets"),
                    RouteLimit {
                        window_secs: 60,
                        max_requests: 120,
                    },
                ),
                (
                    String::from("/api/generate"),
                    RouteLimit {
                        window_secs: 60,
                        max_requests: 20,
                    },
                ),
                (
                    String::from("/api/preview-effects"),
                    RouteLimit {
                        window_secs: 60,
                        max_requests: 30,
                    },
                ),
            ],
            RouteLimit {
                window_secs: 60,
                max_requests: 100,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowState {
    count: u32,
    window_start: u64,
    window_secs: u64,
}

/// Fixed-window counter keyed by `(client, route)`. Advisory abuse
/// protection only: state is in-process and not linearizable across
/// instances, so a multi-process deployment needs a shared counter
/// instead. `admit` never fails; unknown clients share one bucket.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn admit(&self, client: &str, path: &str) -> Admission {
        self.admit_at(client, path, now_unix_secs())
    }

    fn admit_at(&self, client: &str, path: &str, now: u64) -> Admission {
        let limit = self.config.limit_for(path);
        let key = format!("{client}:{path}");
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");

        let state = windows.entry(key).or_insert(WindowState {
            count: 0,
            window_start: now,
            window_secs: limit.window_secs,
        });

        if now.saturating_sub(state.window_start) > limit.window_secs {
            *state = WindowState {
                count: 1,
                window_start: now,
                window_secs: limit.window_secs,
            };
            return Admission::Admitted;
        }

        if state.count >= limit.max_requests {
            return Admission::Limited {
                retry_after_secs: limit.window_secs,
            };
        }

        state.count += 1;
        Admission::Admitted
    }

    /// Drops windows that expired more than one full window ago; they can
    /// never influence an admission decision again.
    pub fn purge_stale(&self) {
        self.purge_stale_at(now_unix_secs());
    }

    fn purge_stale_at(&self, now: u64) {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let before = windows.len();
        windows
            .retain(|_, state| now.saturating_sub(state.window_start) <= state.window_secs * 2);
        let dropped = before - windows.len();
        if dropped > 0 {
            debug!(dropped, remaining = windows.len(), "purged stale rate windows");
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .expect("rate limiter mutex poisoned")
            .len()
    }
}

/// Detached sweeper keeping the window map from growing unbounded.
pub fn spawn_purge_task(limiter: Arc<RateLimiter>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.purge_stale();
        }
    });
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string();
    let path = request.uri().path().to_string();

    match state.rate_limiter.admit(client.as_str(), path.as_str()) {
        Admission::Admitted => next.run(request).await,
        Admission::Limited { retry_after_secs } => {
            info!(client = %client, path = %path, "rate limit exceeded");
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::RateLimit,
                "Rate limit exceeded",
                None,
            );
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
