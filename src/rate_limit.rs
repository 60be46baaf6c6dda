/// Rate Limiting System
///
/// Two global token buckets: one for requests carrying a bearer token and a
/// stricter one for anonymous traffic.
use crate::{
    auth::extract_bearer_token,
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
    metrics,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Which quota a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Authenticated,
    Anonymous,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Authenticated => "authenticated",
            Tier::Anonymous => "anonymous",
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    anonymous: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(per_minute(
                config.authenticated_requests_per_minute,
                600,
            ))),
            anonymous: Arc::new(GovernorLimiter::direct(per_minute(
                config.anonymous_requests_per_minute,
                120,
            ))),
        }
    }

    /// Charge one request against the tier's quota
    pub fn check(&self, tier: Tier) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match tier {
            Tier::Authenticated => &self.authenticated,
            Tier::Anonymous => &self.anonymous,
        };

        limiter.check().map_err(|not_until| {
            metrics::record_rate_limit_rejection(tier.as_str());
            AppError::RateLimitExceeded {
                retry_after: not_until.wait_time_from(DefaultClock::default().now()),
            }
        })
    }
}

fn per_minute(requests: u32, fallback: u32) -> Quota {
    let requests = NonZeroU32::new(requests)
        .or_else(|| NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN);
    Quota::per_minute(requests)
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    let tier = if extract_bearer_token(request.headers()).is_some() {
        Tier::Authenticated
    } else {
        Tier::Anonymous
    };

    match ctx.rate_limiter.check(tier) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(tier = tier.as_str(), path = %request.uri().path(), "Rate limit exceeded");
            let retry_after = match &err {
                AppError::RateLimitExceeded { retry_after } => *retry_after,
                _ => Duration::from_secs(1),
            };

            let mut response = err.into_response();
            let seconds = retry_after.as_secs().max(1).to_string();
            if let Ok(value) = HeaderValue::from_str(&seconds) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, authenticated: u32, anonymous: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled,
            authenticated_requests_per_minute: authenticated,
            anonymous_requests_per_minute: anonymous,
        }
    }

    #[test]
    fn test_tiers_have_separate_quotas() {
        let limiter = RateLimiter::new(&config(true, 5, 2));

        assert!(limiter.check(Tier::Anonymous).is_ok());
        assert!(limiter.check(Tier::Anonymous).is_ok());
        assert!(matches!(
            limiter.check(Tier::Anonymous),
            Err(AppError::RateLimitExceeded { .. })
        ));

        for _ in 0..5 {
            assert!(limiter.check(Tier::Authenticated).is_ok());
        }
        assert!(limiter.check(Tier::Authenticated).is_err());
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(&config(false, 1, 1));
        for _ in 0..20 {
            assert!(limiter.check(Tier::Anonymous).is_ok());
        }
    }
}
