use clap::Parser;
use std::fmt;
use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use crate::rate_limit::RateLimitRule;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "sanity-write-proxy")]
#[command(about = "Rate limited write proxy for Sanity documents")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "SANITY_PROJECT_ID")]
    pub sanity_project_id: String,

    #[arg(long, env = "SANITY_DATASET", default_value = "production")]
    pub sanity_dataset: String,

    #[arg(long, env = "SANITY_API_VERSION", default_value = "2024-01-01")]
    pub sanity_api_version: String,

    // Write scoped token, never exposed to callers
    #[arg(long, env = "SANITY_API_WRITE_TOKEN", hide_env_values = true)]
    pub sanity_write_token: SecretToken,

    // Overrides https://{project}.api.sanity.io
    #[arg(long, env = "SANITY_API_HOST")]
    pub sanity_api_host: Option<String>,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_window: u64,

    // Shared rate limit store; in-process map when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    // How often expired in-memory windows are dropped
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value_t = 60)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn rate_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.rate_limit, Duration::from_secs(self.rate_window))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}

/// API token that redacts itself in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for SecretToken {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(value.trim()))
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}
