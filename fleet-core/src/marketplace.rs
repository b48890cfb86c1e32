//! Contract between the core fleet logic and the marketplace RPC endpoint.
//!
//! The concrete client (signing, transport, wire encoding) is an external
//! collaborator; this module only pins down the shape every node and the
//! reconciler depend on, plus the retry policy wrapping each call.

use crate::error::MarketplaceError;
use crate::util::AsyncSleeping;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, MarketplaceError>;

/// A resource bundle as transmitted on the wire: memory/storage/network
/// already scaled to bytes, GPU hashrate to hashes/second.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBundle {
    pub ram_bytes: u64,
    pub storage_bytes: u64,
    pub cpu_cores: u32,
    pub cpu_sysbench_single: u32,
    pub cpu_sysbench_multi: u32,
    pub net_download_bytes: u64,
    pub net_upload_bytes: u64,
    pub overlay: bool,
    pub incoming: bool,
    pub gpu_count: u32,
    pub gpu_mem_bytes: u64,
    pub eth_hashrate_hs: u64,
}

/// A buy order ready to be submitted to `order.create`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    pub duration_nanoseconds: u64,
    pub price_wei_per_second: u128,
    pub identity: u8,
    pub tag: String,
    pub resources: ResourceBundle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderListEntry {
    pub id: u64,
    pub tag: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatus {
    pub order_status: i32,
    pub tag: String,
    pub deal_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DealStatus {
    pub status: i32,
    pub bid_id: u64,
    pub price: String,
    pub running: Option<Vec<u64>>,
    pub worker_offline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub status: i32,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Balance {
    pub live_balance: Option<f64>,
    pub side_balance: Option<f64>,
    pub live_eth_balance: Option<f64>,
}

impl Balance {
    /// Formats a single field to 4 decimals, or `"n/a"` when unavailable.
    pub fn format_field(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.4}", v),
            None => "n/a".to_owned(),
        }
    }
}

/// Status codes reported by `task.status`.
pub mod task_status {
    pub const UNKNOWN: i32 = 0;
    pub const SPOOLING: i32 = 1;
    pub const SPAWNING: i32 = 2;
    pub const RUNNING: i32 = 3;
    pub const FINISHED: i32 = 4;
    pub const BROKEN: i32 = 5;
}

/// Status codes reported by `deal.status`.
pub mod deal_status {
    pub const OPENED: i32 = 1;
    pub const CLOSED: i32 = 2;
}

/// Status codes reported by `order.status`.
pub mod order_status {
    pub const ACTIVE: i32 = 1;
}

/// Everything the core fleet logic needs from the marketplace node daemon.
/// Implementations are responsible for applying the client-side retry
/// policy (see [`with_retry`]) and translating wire errors into
/// [`MarketplaceError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Our own consumer address, used to filter deal/order listings.
    fn address(&self) -> &str;

    async fn order_create(&self, bid: &Bid) -> Result<u64>;
    async fn order_list(&self, limit: u32) -> Result<Vec<OrderListEntry>>;
    async fn order_status(&self, order_id: u64) -> Result<OrderStatus>;
    async fn order_cancel(&self, order_id: u64) -> Result<()>;

    async fn deal_list(&self, limit: u32) -> Result<Vec<u64>>;
    async fn deal_status(&self, deal_id: u64) -> Result<DealStatus>;
    async fn deal_close(&self, deal_id: u64, blacklist: bool) -> Result<()>;

    async fn task_start(&self, deal_id: u64, task_spec: &str, timeout: Duration) -> Result<u64>;
    async fn task_status(&self, deal_id: u64, task_id: u64) -> Result<TaskStatus>;
    async fn task_logs(&self, deal_id: u64, task_id: u64, tail_lines: u64, out_file: &str) -> Result<()>;

    async fn predict(&self, resources: &ResourceBundle) -> Result<u128>;
    async fn token_balance(&self) -> Result<Balance>;
}

/// Per-endpoint retry policy: how many attempts and how long to sleep
/// between them. `attempts = 1` means no retry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy { attempts, delay }
    }

    /// Default policy used by most marketplace endpoints: 3 attempts, 3s apart.
    pub const DEFAULT: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(3));

    /// `task.status` is polled aggressively and tolerates more retries.
    pub const TASK_STATUS: RetryPolicy = RetryPolicy::new(10, Duration::from_secs(10));

    /// `task.start` must not be retried: a retried start could double-spawn
    /// the workload on the remote worker.
    pub const TASK_START: RetryPolicy = RetryPolicy::new(1, Duration::from_secs(0));
}

/// Runs `operation` up to `policy.attempts` times, sleeping `policy.delay`
/// between attempts, returning the first success or the last error.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn AsyncSleeping,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.attempts {
                    return Err(error);
                }
                attempt += 1;
                sleeper.sleep(policy.delay).await;
            }
        }
    }
}
