pub mod algorithms;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod scripts;
pub mod server;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use limiter::{Algorithm, CheckRequest, CheckResult, Limiter};
pub use metrics::Metrics;
pub use server::create_app;
pub use store::{AtomicScript, AtomicStore, RedisStore, StoreError};
