use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, ErrorKind, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Config;
use crate::scripts;

/// The two server-side decision routines. Every rate-limit check maps to
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicScript {
    TokenBucket,
    SlidingWindow,
}

/// Store failures, partitioned by how callers must react.
///
/// `Unavailable` means the store is down or too slow and the caller fails
/// open. Everything else is `Other` and must propagate: silently allowing
/// on a malformed script or reply would mask real bugs as outages.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Channel to run one of the atomic decision scripts against shared state.
///
/// This is the concurrency backbone of the service: the whole
/// read-modify-write decision happens inside `execute`, so no process-level
/// locking exists anywhere. Tests substitute an in-memory implementation.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Run `script` against `key` with positional `args`, returning the
    /// script's raw integer reply (expected shape: `[allowed, remaining]`).
    async fn execute(
        &self,
        script: AtomicScript,
        key: &str,
        args: &[String],
    ) -> Result<Vec<i64>, StoreError>;

    /// Connectivity probe used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Redis-backed implementation of [`AtomicStore`].
///
/// All in-flight checks share one multiplexed, auto-reconnecting
/// connection; a semaphore sized by `REDIS_POOL_SIZE` bounds how many
/// operations may be in flight at once, so saturation surfaces as a
/// bounded wait inside the per-operation timeout instead of an unbounded
/// queue.
pub struct RedisStore {
    client: Client,
    conn: OnceCell<ConnectionManager>,
    permits: Arc<Semaphore>,
    op_timeout: Duration,
    token_bucket: Script,
    sliding_window: Script,
}

/// Health probes get a more generous deadline than the hot path; the
/// per-check timeout is meant to stay in the single-digit milliseconds.
const PING_TIMEOUT: Duration = Duration::from_secs(1);

impl RedisStore {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| StoreError::Other(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            permits: Arc::new(Semaphore::new(config.redis_pool_size as usize)),
            op_timeout: config.redis_timeout(),
            token_bucket: Script::new(scripts::TOKEN_BUCKET),
            sliding_window: Script::new(scripts::SLIDING_WINDOW),
        })
    }

    /// Establish the shared connection up front and verify it with a PING.
    /// Failure here is not fatal to the service: the connection is retried
    /// lazily on the next operation, and checks fail open in the meantime.
    pub async fn connect(&self) -> Result<(), StoreError> {
        self.ping().await?;
        info!("redis connection established");
        Ok(())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!("opening redis connection");
                let manager_config = ConnectionManagerConfig::new()
                    .set_connection_timeout(Duration::from_secs(2))
                    .set_response_timeout(self.op_timeout);
                ConnectionManager::new_with_config(self.client.clone(), manager_config).await
            })
            .await
            .map_err(classify)?;
        Ok(conn.clone())
    }

    fn script(&self, script: AtomicScript) -> &Script {
        match script {
            AtomicScript::TokenBucket => &self.token_bucket,
            AtomicScript::SlidingWindow => &self.sliding_window,
        }
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn execute(
        &self,
        script: AtomicScript,
        key: &str,
        args: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        let op = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| StoreError::Other("store client shut down".to_string()))?;
            let mut conn = self.connection().await?;

            let script = self.script(script);
            let mut invocation = script.prepare_invoke();
            invocation.key(key);
            for arg in args {
                invocation.arg(arg);
            }

            let reply: Vec<i64> = invocation.invoke_async(&mut conn).await.map_err(classify)?;
            Ok(reply)
        };

        match timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "operation exceeded {}ms deadline",
                self.op_timeout.as_millis()
            ))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let op = async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(classify)?;
            Ok(())
        };

        match timeout(PING_TIMEOUT, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable("ping timed out".to_string())),
        }
    }
}

/// Partition a redis error into fail-open (`Unavailable`) vs propagate
/// (`Other`) using the client's structured error kinds. Timeouts and broken
/// transport mean the store is down or slow; script errors, type errors and
/// the like must surface to the caller.
fn classify(err: RedisError) -> StoreError {
    if err.is_timeout()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.kind() == ErrorKind::IoError
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Other(err.to_string())
    }
}
