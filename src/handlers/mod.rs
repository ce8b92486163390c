mod health;
mod metrics;
mod write;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use write::write_handler;
