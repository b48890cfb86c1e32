//! The per-node state machine: the lifecycle of a single logical worker
//! from placing an order through to a finished (or abandoned) task.

use crate::bid::{build_bid, TaskConfig};
use crate::config::FleetConfig;
use crate::error::MarketplaceError;
use crate::marketplace::{deal_status, order_status, task_status, MarketplaceClient};
use crate::pricing::{order_price, PriceOracle};
use crate::registry::Registry;
use crate::util::{AsyncSleeping, Now};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Start,
    CreateOrder,
    PlacingOrder,
    AwaitingDeal,
    DealOpened,
    DealDisappeared,
    StartingTask,
    TaskRunning,
    TaskFailed,
    TaskFailedToStart,
    TaskBroken,
    TaskFinished,
    WorkCompleted,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeStatus::Start => "START",
            NodeStatus::CreateOrder => "CREATE_ORDER",
            NodeStatus::PlacingOrder => "PLACING_ORDER",
            NodeStatus::AwaitingDeal => "AWAITING_DEAL",
            NodeStatus::DealOpened => "DEAL_OPENED",
            NodeStatus::DealDisappeared => "DEAL_DISAPPEARED",
            NodeStatus::StartingTask => "STARTING_TASK",
            NodeStatus::TaskRunning => "TASK_RUNNING",
            NodeStatus::TaskFailed => "TASK_FAILED",
            NodeStatus::TaskFailedToStart => "TASK_FAILED_TO_START",
            NodeStatus::TaskBroken => "TASK_BROKEN",
            NodeStatus::TaskFinished => "TASK_FINISHED",
            NodeStatus::WorkCompleted => "WORK_COMPLETED",
        };
        f.write_str(name)
    }
}

/// Runtime state of a single logical worker. Exclusively owned by whichever
/// execution context is currently driving it; the registry only ever holds
/// a snapshot for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: String,
    pub status: NodeStatus,
    pub deal_id: Option<u64>,
    pub task_id: Option<u64>,
    pub bid_id: Option<u64>,
    pub price: Option<f64>,
    pub task_uptime_seconds: u64,
    pub last_heartbeat_at: Instant,
}

impl Node {
    /// An empty node freshly created because its tag appeared in config.
    pub fn empty(tag: impl Into<String>, now: &dyn Now) -> Self {
        Node {
            tag: tag.into(),
            status: NodeStatus::Start,
            deal_id: None,
            task_id: None,
            bid_id: None,
            price: None,
            task_uptime_seconds: 0,
            last_heartbeat_at: now.instant_now(),
        }
    }

    /// Formats `price` the way the status table displays it.
    pub fn formatted_price(&self) -> String {
        match self.price {
            Some(p) => format!("{:.4} USD/h", p),
            None => "n/a".to_owned(),
        }
    }

    /// The task tag this node belongs to, derived by stripping the last
    /// `_<index>` suffix from the node tag.
    pub fn task_tag(&self) -> &str {
        self.tag.rsplit_once('_').map_or(self.tag.as_str(), |(prefix, _)| prefix)
    }
}

/// Drives a single [`Node`] through its lifecycle against a marketplace
/// client, a price oracle and a task config snapshot. One `NodeRunner` is
/// created per node by the supervisor and then driven in its own execution
/// context until the node either completes its work or is torn down.
pub struct NodeRunner {
    client: Arc<dyn MarketplaceClient>,
    pricing: Arc<PriceOracle>,
    sleeper: Arc<dyn AsyncSleeping>,
    now: Arc<dyn Now>,
    config: Arc<RwLock<FleetConfig>>,
    pub keep_working: Arc<AtomicBool>,
    restart_timeout: Duration,
}

impl NodeRunner {
    pub fn new(
        client: Arc<dyn MarketplaceClient>,
        pricing: Arc<PriceOracle>,
        sleeper: Arc<dyn AsyncSleeping>,
        now: Arc<dyn Now>,
        config: Arc<RwLock<FleetConfig>>,
        restart_timeout: Duration,
    ) -> Self {
        NodeRunner {
            client,
            pricing,
            sleeper,
            now,
            config,
            keep_working: Arc::new(AtomicBool::new(true)),
            restart_timeout,
        }
    }

    /// Runs `node` to completion (either `WorkCompleted` or `keep_working`
    /// going false), sleeping between iterations in 1-second increments so
    /// that a stop request is honored within roughly a second. Publishes the
    /// node's state back into `registry` after every step so that readers
    /// (the status dump, the reload scheduler) see live progress rather than
    /// only the final state. A fatal error from `step` (so far, only a
    /// failed order placement) aborts the loop immediately and is returned
    /// to the caller instead of being retried here.
    pub async fn run(
        &self,
        node: &mut Node,
        config: &TaskConfig,
        registry: &Registry,
    ) -> Result<(), MarketplaceError> {
        while self.keep_working.load(Ordering::SeqCst) && node.status != NodeStatus::WorkCompleted
        {
            self.watchdog_reset_if_stalled(node).await;
            let sleep_for = self.step(node, config).await?;
            node.last_heartbeat_at = self.now.instant_now();
            registry.update(node.clone());
            self.cooperative_sleep(sleep_for).await;
        }

        if node.status != NodeStatus::WorkCompleted {
            self.finish_work(node, config).await;
            registry.update(node.clone());
        }
        Ok(())
    }

    /// Sleeps for `total`, but in 1-second slices, checking `keep_working`
    /// between each so a stop request is not blocked behind a long sleep.
    async fn cooperative_sleep(&self, total: Duration) {
        let mut remaining = total;
        let slice = Duration::from_secs(1);
        while remaining > Duration::ZERO && self.keep_working.load(Ordering::SeqCst) {
            let this_slice = remaining.min(slice);
            self.sleeper.sleep(this_slice).await;
            remaining = remaining.saturating_sub(this_slice);
        }
    }

    async fn watchdog_reset_if_stalled(&self, node: &mut Node) {
        let elapsed = self
            .now
            .instant_now()
            .saturating_duration_since(node.last_heartbeat_at);
        if elapsed <= self.restart_timeout {
            return;
        }
        log::warn!(
            "node {} heartbeat stalled for {:?}, resetting",
            node.tag,
            elapsed
        );
        if let Some(deal_id) = node.deal_id {
            let _ = self.client.deal_close(deal_id, false).await;
        }
        if let Some(bid_id) = node.bid_id {
            let _ = self.client.order_cancel(bid_id).await;
        }
        node.deal_id = None;
        node.task_id = None;
        node.bid_id = None;
        node.status = NodeStatus::Start;
        node.last_heartbeat_at = self.now.instant_now();
    }

    /// Executes exactly one state-machine step and returns the duration the
    /// caller should sleep before the next step. A failure to place an order
    /// is the one fatal condition in the whole machine: it is returned
    /// rather than retried in place, so `run` can tear the loop down and let
    /// the supervisor decide whether to resubmit it.
    pub async fn step(
        &self,
        node: &mut Node,
        config: &TaskConfig,
    ) -> Result<Duration, MarketplaceError> {
        match node.status {
            NodeStatus::Start | NodeStatus::CreateOrder | NodeStatus::PlacingOrder => {
                self.create_order(node, config).await
            }
            NodeStatus::AwaitingDeal => Ok(self.poll_order(node).await),
            NodeStatus::DealOpened => Ok(self.start_task(node, config).await),
            NodeStatus::DealDisappeared => {
                node.status = NodeStatus::CreateOrder;
                Ok(Duration::from_secs(1))
            }
            NodeStatus::TaskRunning => Ok(self.poll_task(node, config).await),
            NodeStatus::TaskFailedToStart => Ok(self.close_after_failure(node, true).await),
            NodeStatus::TaskFailed | NodeStatus::TaskBroken => {
                Ok(self.close_after_failure(node, false).await)
            }
            NodeStatus::TaskFinished => Ok(self.close_after_success(node, config).await),
            NodeStatus::StartingTask | NodeStatus::WorkCompleted => Ok(Duration::from_secs(60)),
        }
    }

    /// Re-reads this node's task class from the live config on every pass,
    /// rather than trusting the snapshot it was spawned with, so an operator
    /// edit to price or resources takes effect without a restart. Falls back
    /// to the spawn-time snapshot if the tag has since been dropped from
    /// config entirely.
    async fn create_order(
        &self,
        node: &mut Node,
        config: &TaskConfig,
    ) -> Result<Duration, MarketplaceError> {
        node.status = NodeStatus::PlacingOrder;
        let live_config = self
            .config
            .read()
            .unwrap()
            .task_for_node_tag(&node.tag)
            .cloned()
            .unwrap_or_else(|| config.clone());
        let cached = self.pricing.price_for_tag(&live_config.tag);
        let price = order_price(&live_config, cached);
        let bid = build_bid(&live_config, &node.tag, price);

        let order_id = self.client.order_create(&bid).await.map_err(|error| {
            log::error!("failed to place order for {}: {}", node.tag, error);
            error
        })?;

        node.bid_id = Some(order_id);
        node.price = Some(price);
        node.status = NodeStatus::AwaitingDeal;
        Ok(Duration::from_secs(60))
    }

    async fn poll_order(&self, node: &mut Node) -> Duration {
        let bid_id = match node.bid_id {
            Some(id) => id,
            None => {
                node.status = NodeStatus::CreateOrder;
                return Duration::from_secs(1);
            }
        };

        match self.client.order_status(bid_id).await {
            Ok(status) if status.deal_id != 0 => {
                node.deal_id = Some(status.deal_id);
                node.status = NodeStatus::DealOpened;
                Duration::from_secs(15)
            }
            Ok(status) if status.order_status == order_status::ACTIVE && status.deal_id == 0 => {
                // Still on the books but unmatched this poll: reissue it.
                node.status = NodeStatus::CreateOrder;
                Duration::from_secs(1)
            }
            Ok(_) => {
                // Neither matched nor active: could still settle, keep
                // waiting rather than reissuing.
                Duration::from_secs(60)
            }
            Err(error) => {
                log::warn!("order status check failed for {}: {}", node.tag, error);
                Duration::from_secs(60)
            }
        }
    }

    async fn start_task(&self, node: &mut Node, config: &TaskConfig) -> Duration {
        let deal_id = match node.deal_id {
            Some(id) => id,
            None => {
                node.status = NodeStatus::DealDisappeared;
                return Duration::from_secs(1);
            }
        };

        let timeout = Duration::from_secs(config.task_start_timeout);
        let task_spec = format!("{{\"node_tag\":\"{}\"}}", node.tag);
        match self.client.task_start(deal_id, &task_spec, timeout).await {
            Ok(task_id) => {
                node.task_id = Some(task_id);
                node.status = NodeStatus::TaskRunning;
                Duration::from_secs(60)
            }
            Err(error) => {
                log::error!("failed to start task for {}: {}", node.tag, error);
                node.status = NodeStatus::TaskFailedToStart;
                Duration::from_secs(60)
            }
        }
    }

    async fn poll_task(&self, node: &mut Node, config: &TaskConfig) -> Duration {
        let deal_id = match node.deal_id {
            Some(id) => id,
            None => {
                node.status = NodeStatus::DealDisappeared;
                return Duration::from_secs(1);
            }
        };

        let deal = match self.client.deal_status(deal_id).await {
            Ok(deal) => deal,
            Err(error) => {
                log::warn!("deal status check failed for {}: {}", node.tag, error);
                return Duration::from_secs(60);
            }
        };

        if deal.status == deal_status::CLOSED {
            node.status = NodeStatus::DealDisappeared;
            return Duration::from_secs(1);
        }

        let task_id = match node.task_id {
            Some(id) => id,
            None => return Duration::from_secs(60),
        };

        let task = match self.client.task_status(deal_id, task_id).await {
            Ok(task) => task,
            Err(_) => {
                node.status = NodeStatus::TaskFailed;
                return Duration::from_secs(1);
            }
        };

        node.task_uptime_seconds = task.uptime_seconds;
        match task.status {
            task_status::RUNNING => Duration::from_secs(60),
            task_status::SPOOLING | task_status::SPAWNING => {
                node.status = NodeStatus::StartingTask;
                Duration::from_secs(1)
            }
            task_status::FINISHED => {
                node.status = NodeStatus::TaskFinished;
                Duration::from_secs(1)
            }
            task_status::BROKEN if task.uptime_seconds < config.ets => {
                node.status = NodeStatus::TaskFailedToStart;
                Duration::from_secs(1)
            }
            task_status::BROKEN => {
                node.status = NodeStatus::TaskBroken;
                Duration::from_secs(1)
            }
            _ => Duration::from_secs(60),
        }
    }

    async fn close_after_failure(&self, node: &mut Node, blacklist: bool) -> Duration {
        if let Some(deal_id) = node.deal_id {
            self.capture_logs(node, deal_id, false).await;
            if let Err(error) = self.client.deal_close(deal_id, blacklist).await {
                log::error!("failed to close deal for {}: {}", node.tag, error);
            }
        }
        node.deal_id = None;
        node.task_id = None;
        node.bid_id = None;
        node.status = NodeStatus::CreateOrder;
        Duration::from_secs(1)
    }

    async fn close_after_success(&self, node: &mut Node, _config: &TaskConfig) -> Duration {
        if let Some(deal_id) = node.deal_id {
            self.capture_logs(node, deal_id, true).await;
            if let Err(error) = self.client.deal_close(deal_id, false).await {
                log::error!("failed to close deal for {}: {}", node.tag, error);
            }
        }
        node.status = NodeStatus::WorkCompleted;
        Duration::from_secs(1)
    }

    async fn capture_logs(&self, node: &Node, deal_id: u64, success: bool) {
        let task_id = match node.task_id {
            Some(id) => id,
            None => return,
        };
        let prefix = if success { "success" } else { "fail" };
        let out_file = format!("out/{}_{}-deal-{}.log", prefix, node.tag, deal_id);
        if let Err(error) = self
            .client
            .task_logs(deal_id, task_id, 1_000_000, &out_file)
            .await
        {
            log::warn!("failed to capture logs for {}: {}", node.tag, error);
        }
    }

    /// Performs the minimal outbound action to tear a node down gracefully:
    /// cancel the order if still awaiting a deal, or close the deal from any
    /// post-deal state. Used both for config removal and process shutdown.
    pub async fn finish_work(&self, node: &mut Node, config: &TaskConfig) {
        self.keep_working.store(false, Ordering::SeqCst);

        match node.status {
            NodeStatus::AwaitingDeal | NodeStatus::PlacingOrder => {
                if let Some(bid_id) = node.bid_id {
                    let _ = self.client.order_cancel(bid_id).await;
                }
            }
            NodeStatus::DealOpened
            | NodeStatus::StartingTask
            | NodeStatus::TaskRunning
            | NodeStatus::TaskFailed
            | NodeStatus::TaskFailedToStart
            | NodeStatus::TaskBroken
            | NodeStatus::TaskFinished => {
                if let Some(deal_id) = node.deal_id {
                    let success = node.status == NodeStatus::TaskFinished;
                    self.capture_logs(node, deal_id, success).await;
                    let _ = self.client.deal_close(deal_id, false).await;
                }
            }
            NodeStatus::Start
            | NodeStatus::CreateOrder
            | NodeStatus::DealDisappeared
            | NodeStatus::WorkCompleted => {}
        }

        let _ = config;
        node.status = NodeStatus::WorkCompleted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid::{Identity, ResourceConfig};
    use crate::config::{BaseConfig, EthereumConfig};
    use crate::marketplace::{DealStatus, MockMarketplaceClient, OrderStatus, TaskStatus};
    use crate::util::{AsyncSleep, MockNow};
    use mockall::predicate::*;
    use mockall::Sequence;

    fn config(ets: u64) -> TaskConfig {
        TaskConfig {
            tag: "miner".to_owned(),
            number_of_nodes: 1,
            max_price_usd_per_hour: 0.20,
            price_coefficient_percent: 10,
            ets,
            task_start_timeout: 60,
            template_file: "miner.yaml".to_owned(),
            duration_seconds: 3600,
            counterparty: None,
            identity: Identity::Anonymous,
            resources: ResourceConfig {
                ram_mib: 1024,
                storage_gib: 10,
                cpu_cores: 4,
                cpu_sysbench_single: 1000,
                cpu_sysbench_multi: 4000,
                net_download_mib: 100,
                net_upload_mib: 50,
                overlay: false,
                incoming: true,
                gpu_count: 0,
                gpu_mem_mib: 0,
                eth_hashrate_mhs: 0,
            },
        }
    }

    fn fleet_config(task: TaskConfig) -> Arc<RwLock<FleetConfig>> {
        Arc::new(RwLock::new(FleetConfig {
            base: BaseConfig {
                node_address: "0x0000000000000000000000000000000000000001".to_owned(),
                ethereum: EthereumConfig {
                    key_path: "/keys".to_owned(),
                    password: "secret".to_owned(),
                },
                timeout: 60,
                restart_timeout: 600,
            },
            tasks: vec![task],
        }))
    }

    fn runner(client: MockMarketplaceClient) -> (NodeRunner, Node) {
        let mut now = MockNow::new();
        now.expect_instant_now().returning(Instant::now);
        let node = Node::empty("miner_1", &now);
        let runner = NodeRunner::new(
            Arc::new(client),
            Arc::new(PriceOracle::new()),
            Arc::new(AsyncSleep),
            Arc::new(now),
            fleet_config(config(300)),
            Duration::from_secs(600),
        );
        (runner, node)
    }

    #[test]
    fn create_order_transitions_to_awaiting_deal() {
        let mut client = MockMarketplaceClient::new();
        client.expect_order_create().returning(|_| Ok(99));
        let (runner, mut node) = runner(client);
        let cfg = config(300);

        futures::executor::block_on(runner.step(&mut node, &cfg)).unwrap();

        assert_eq!(node.status, NodeStatus::AwaitingDeal);
        assert_eq!(node.bid_id, Some(99));
    }

    #[test]
    fn create_order_failure_propagates_as_a_fatal_error() {
        let mut client = MockMarketplaceClient::new();
        client
            .expect_order_create()
            .returning(|_| Err(MarketplaceError::BadStatus("insufficient funds".to_owned())));
        let (runner, mut node) = runner(client);
        let cfg = config(300);

        let result = futures::executor::block_on(runner.step(&mut node, &cfg));

        assert!(result.is_err());
    }

    #[test]
    fn run_aborts_and_returns_err_on_a_create_order_failure() {
        let mut client = MockMarketplaceClient::new();
        client
            .expect_order_create()
            .returning(|_| Err(MarketplaceError::BadStatus("insufficient funds".to_owned())));
        let (runner, mut node) = runner(client);
        let cfg = config(300);
        let registry = Registry::new();

        let result = futures::executor::block_on(runner.run(&mut node, &cfg, &registry));

        assert!(result.is_err());
        assert_ne!(node.status, NodeStatus::WorkCompleted);
    }

    #[test]
    fn order_cancelled_remotely_restarts_order_creation() {
        let mut client = MockMarketplaceClient::new();
        client.expect_order_status().returning(|_| {
            Ok(OrderStatus {
                order_status: order_status::ACTIVE,
                tag: "miner_1".to_owned(),
                deal_id: 0,
            })
        });
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::AwaitingDeal;
        node.bid_id = Some(1);

        futures::executor::block_on(runner.poll_order(&mut node));

        assert_eq!(node.status, NodeStatus::CreateOrder);
    }

    #[test]
    fn order_still_unmatched_keeps_waiting() {
        let mut client = MockMarketplaceClient::new();
        client.expect_order_status().returning(|_| {
            Ok(OrderStatus {
                order_status: 0,
                tag: "miner_1".to_owned(),
                deal_id: 0,
            })
        });
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::AwaitingDeal;
        node.bid_id = Some(1);

        futures::executor::block_on(runner.poll_order(&mut node));

        assert_eq!(node.status, NodeStatus::AwaitingDeal);
    }

    #[test]
    fn broken_before_ets_blacklists_and_fails_to_start() {
        let mut client = MockMarketplaceClient::new();
        client.expect_deal_status().returning(|_| {
            Ok(DealStatus {
                status: deal_status::OPENED,
                bid_id: 1,
                price: "0.11".to_owned(),
                running: Some(vec![7]),
                worker_offline: false,
            })
        });
        client.expect_task_status().returning(|_, _| {
            Ok(TaskStatus {
                status: task_status::BROKEN,
                uptime_seconds: 120,
            })
        });
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::TaskRunning;
        node.deal_id = Some(1);
        node.task_id = Some(7);
        let cfg = config(300);

        futures::executor::block_on(runner.poll_task(&mut node, &cfg));

        assert_eq!(node.status, NodeStatus::TaskFailedToStart);
    }

    #[test]
    fn broken_after_ets_does_not_blacklist() {
        let mut client = MockMarketplaceClient::new();
        client.expect_deal_status().returning(|_| {
            Ok(DealStatus {
                status: deal_status::OPENED,
                bid_id: 1,
                price: "0.11".to_owned(),
                running: Some(vec![7]),
                worker_offline: false,
            })
        });
        client.expect_task_status().returning(|_, _| {
            Ok(TaskStatus {
                status: task_status::BROKEN,
                uptime_seconds: 600,
            })
        });
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::TaskRunning;
        node.deal_id = Some(1);
        node.task_id = Some(7);
        let cfg = config(300);

        futures::executor::block_on(runner.poll_task(&mut node, &cfg));

        assert_eq!(node.status, NodeStatus::TaskBroken);
    }

    #[test]
    fn close_after_failure_uses_requested_blacklist_flag() {
        let mut client = MockMarketplaceClient::new();
        client
            .expect_deal_close()
            .with(eq(1u64), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::TaskFailedToStart;
        node.deal_id = Some(1);

        futures::executor::block_on(runner.close_after_failure(&mut node, true));

        assert_eq!(node.status, NodeStatus::CreateOrder);
        assert_eq!(node.deal_id, None);
    }

    #[test]
    fn close_after_failure_captures_logs_before_closing_the_deal() {
        let mut client = MockMarketplaceClient::new();
        let mut sequence = Sequence::new();
        client
            .expect_task_logs()
            .withf(|_, _, _, out_file| out_file.contains("fail_"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));
        client
            .expect_deal_close()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::TaskFailedToStart;
        node.deal_id = Some(1);
        node.task_id = Some(7);

        futures::executor::block_on(runner.close_after_failure(&mut node, true));
    }

    #[test]
    fn close_after_success_captures_logs_before_closing_the_deal() {
        let mut client = MockMarketplaceClient::new();
        let mut sequence = Sequence::new();
        client
            .expect_task_logs()
            .withf(|_, _, _, out_file| out_file.contains("success_"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _, _| Ok(()));
        client
            .expect_deal_close()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::TaskFinished;
        node.deal_id = Some(1);
        node.task_id = Some(7);
        let cfg = config(300);

        futures::executor::block_on(runner.close_after_success(&mut node, &cfg));

        assert_eq!(node.status, NodeStatus::WorkCompleted);
    }

    #[test]
    fn finish_work_cancels_order_when_awaiting_deal() {
        let mut client = MockMarketplaceClient::new();
        client
            .expect_order_cancel()
            .with(eq(5u64))
            .times(1)
            .returning(|_| Ok(()));
        let (runner, mut node) = runner(client);
        node.status = NodeStatus::AwaitingDeal;
        node.bid_id = Some(5);
        let cfg = config(300);

        futures::executor::block_on(runner.finish_work(&mut node, &cfg));

        assert_eq!(node.status, NodeStatus::WorkCompleted);
        assert!(!runner.keep_working.load(Ordering::SeqCst));
    }

    #[test]
    fn task_tag_strips_trailing_index() {
        let mut now = MockNow::new();
        now.expect_instant_now().returning(Instant::now);
        let node = Node::empty("miner_12", &now);
        assert_eq!(node.task_tag(), "miner");
    }
}
