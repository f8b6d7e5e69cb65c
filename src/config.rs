use envconfig::Envconfig;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL (credentials go in the URL)
    #[envconfig(from = "REDIS_URL", default = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Upper bound on concurrent in-flight store operations. Saturation
    /// shows up as a bounded wait inside the operation timeout, never an
    /// unbounded queue.
    #[envconfig(from = "REDIS_POOL_SIZE", default = "100")]
    pub redis_pool_size: u32,

    /// Per-operation store timeout in milliseconds. This is the fail-open
    /// dial: anything slower than this is treated as an outage and the
    /// check is allowed through.
    #[envconfig(from = "REDIS_TIMEOUT_MS", default = "2")]
    pub redis_timeout_ms: u64,

    /// Log level for the service's own spans and events
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }
}
