use std::sync::Arc;
use crate::rate_limit::RateLimitStore;
use crate::store::ContentStore;
// app's shared state

pub struct AppState {
    pub rate_limiter: Arc<dyn RateLimitStore>, // per-client admission control
    pub store: Arc<dyn ContentStore>,          // holds the write token
}

impl AppState {
    pub fn new(rate_limiter: Arc<dyn RateLimitStore>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            rate_limiter,
            store,
        }
    }
}
