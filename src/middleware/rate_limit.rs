use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::middleware::auth::PUBLIC_PATHS;
use crate::state::AppState;

/// Caps the number of API requests in flight. Requests over the cap are
/// rejected immediately rather than queued.
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Semaphore,
    capacity: usize,
    total: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LimiterMetrics {
    pub capacity: usize,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub available_permits: usize,
}

impl LimiterMetrics {
    pub fn rejection_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.rejected_requests as f64 / self.total_requests as f64 * 100.0).round() / 100.0
    }
}

impl RequestLimiter {
    pub fn new(capacity: usize) -> Self {
        info!(max_concurrent_requests = capacity, "Initializing request limiter");
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            total: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn try_admit(&self) -> Result<SemaphorePermit<'_>, AppError> {
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        self.semaphore.try_acquire().map_err(|_| {
            let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                total_requests = total,
                rejected_requests = rejected,
                "Rate limit exceeded - too many concurrent requests"
            );
            AppError::RateLimitExceeded
        })
    }

    pub fn metrics(&self) -> LimiterMetrics {
        LimiterMetrics {
            capacity: self.capacity,
            total_requests: self.total.load(Ordering::Relaxed),
            rejected_requests: self.rejected.load(Ordering::Relaxed),
            available_permits: self.semaphore.available_permits(),
        }
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();

    if PUBLIC_PATHS.contains(&path.as_str()) {
        return Ok(next.run(request).await);
    }

    let _permit = state.limiter.try_admit()?;

    debug!(
        path = %path,
        available_permits = state.limiter.metrics().available_permits,
        "Request permit acquired"
    );

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_capacity_is_used() {
        let limiter = RequestLimiter::new(1);
        let held = limiter.try_admit().unwrap();
        assert!(matches!(limiter.try_admit(), Err(AppError::RateLimitExceeded)));

        drop(held);
        assert!(limiter.try_admit().is_ok());

        let metrics = limiter.metrics();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.rejected_requests, 1);
        assert_eq!(metrics.available_permits, 1);
    }
}
