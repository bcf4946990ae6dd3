use std::sync::Arc;
use std::time::Duration;

use perkly_offer::EligibilityService;
use perkly_store::app_config::Config;

use crate::middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EligibilityService>,
    /// `None` disables rate limiting.
    pub limiter: Option<Arc<RateLimiter>>,
    pub max_body_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(service: EligibilityService) -> Self {
        Self {
            service: Arc::new(service),
            limiter: None,
            max_body_bytes: 10 * 1024 * 1024,
            allowed_origins: vec!["*".to_string()],
        }
    }

    pub fn from_config(service: EligibilityService, config: &Config) -> Self {
        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(RateLimiter::new(
                config.rate_limit.requests,
                Duration::from_secs(config.rate_limit.window_seconds),
            ))
        });

        Self {
            service: Arc::new(service),
            limiter,
            max_body_bytes: config.server.max_body_bytes,
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }
}
