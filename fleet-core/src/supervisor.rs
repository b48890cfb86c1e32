//! Runs one state machine per live node concurrently, reacts to config
//! reloads by adding/removing nodes, and schedules the periodic maintenance
//! jobs (status dump, config reload, balance refresh).

use crate::bid::{resource_bundle, TaskConfig};
use crate::config::FleetConfig;
use crate::error::MarketplaceError;
use crate::marketplace::MarketplaceClient;
use crate::node::{Node, NodeRunner};
use crate::pricing::PriceOracle;
use crate::registry::Registry;
use crate::util::{AsyncSleeping, Now};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

const STAGGER_INTERVAL: Duration = Duration::from_secs(1);
const STATUS_DUMP_INTERVAL: Duration = Duration::from_secs(60);
const CONFIG_RELOAD_INTERVAL: Duration = Duration::from_secs(60);
const BALANCE_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Process-wide state threaded through every component, replacing what the
/// source keeps as module-level singletons.
pub struct AppState {
    pub client: Arc<dyn MarketplaceClient>,
    pub pricing: Arc<PriceOracle>,
    pub registry: Arc<Registry>,
    pub sleeper: Arc<dyn AsyncSleeping>,
    pub now: Arc<dyn Now>,
    pub config: Arc<RwLock<FleetConfig>>,
    pub restart_timeout: Duration,
}

struct RunningNode {
    keep_working: Arc<AtomicBool>,
    handle: JoinHandle<Result<(), MarketplaceError>>,
}

/// Drives the fleet: one execution context per node, plus the periodic
/// maintenance jobs. `tick` performs one second's worth of bookkeeping; the
/// binary is expected to call it in a loop.
pub struct Supervisor {
    state: Arc<AppState>,
    running: HashMap<String, RunningNode>,
    last_status_dump: std::time::Instant,
    last_config_reload: std::time::Instant,
    last_balance_refresh: std::time::Instant,
}

impl Supervisor {
    pub fn new(state: Arc<AppState>) -> Self {
        let now = state.now.instant_now();
        Supervisor {
            state,
            running: HashMap::new(),
            last_status_dump: now,
            last_config_reload: now,
            last_balance_refresh: now,
        }
    }

    /// Performs one tick: submits newly-added nodes, reaps completed ones,
    /// tears down nodes whose tag disappeared from config, and adds empty
    /// nodes for newly-added tags. Should be called roughly once a second.
    pub async fn tick(&mut self) {
        self.reap_completed();

        let config_tags: Vec<String> = {
            let config = self.state.config.read().unwrap();
            config.all_node_tags()
        };

        self.teardown_removed_nodes(&config_tags);
        self.add_missing_nodes(&config_tags);
        self.submit_unstarted_nodes().await;
        self.run_periodic_jobs().await;
    }

    /// Polls every running node's join handle without blocking, removing
    /// and logging any that have finished, panicked, or returned a fatal
    /// error. Either outcome clears the tag from `running` so the next tick
    /// of `submit_unstarted_nodes` resubmits it from whatever state the
    /// registry last recorded.
    fn reap_completed(&mut self) {
        let mut finished = Vec::new();
        for (tag, running) in self.running.iter_mut() {
            let outcome = match (&mut running.handle).now_or_never() {
                Some(outcome) => outcome,
                None => continue,
            };
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    log::error!("node {} terminated with a fatal error: {}", tag, error)
                }
                Err(join_error) => log::error!("node {} task panicked: {}", tag, join_error),
            }
            finished.push(tag.clone());
        }
        for tag in finished {
            self.running.remove(&tag);
        }
    }

    fn teardown_removed_nodes(&mut self, config_tags: &[String]) {
        for tag in self.state.registry.keys() {
            if config_tags.iter().any(|t| t == &tag) {
                continue;
            }
            if let Some(running) = self.running.get(&tag) {
                running
                    .keep_working
                    .store(false, std::sync::atomic::Ordering::SeqCst);
            } else {
                self.state.registry.remove(&tag);
            }
        }
    }

    fn add_missing_nodes(&mut self, config_tags: &[String]) {
        for tag in config_tags {
            if !self.state.registry.contains(tag) {
                self.state.registry.add(Node::empty(tag.clone(), self.state.now.as_ref()));
            }
        }
    }

    async fn submit_unstarted_nodes(&mut self) {
        let tags = self.state.registry.keys();
        for tag in tags {
            if self.running.contains_key(&tag) {
                continue;
            }
            let task_config = {
                let config = self.state.config.read().unwrap();
                config.task_for_node_tag(&tag).cloned()
            };
            let task_config = match task_config {
                Some(c) => c,
                None => continue,
            };
            let node = match self.state.registry.get(&tag) {
                Some(n) => n,
                None => continue,
            };

            self.spawn_node(tag.clone(), node, task_config);
            self.state.sleeper.sleep(STAGGER_INTERVAL).await;
        }
    }

    fn spawn_node(&mut self, tag: String, mut node: Node, task_config: TaskConfig) {
        let runner = NodeRunner::new(
            self.state.client.clone(),
            self.state.pricing.clone(),
            self.state.sleeper.clone(),
            self.state.now.clone(),
            self.state.config.clone(),
            self.state.restart_timeout,
        );
        let keep_working = runner.keep_working.clone();
        let registry = self.state.registry.clone();

        let handle =
            tokio::spawn(async move { runner.run(&mut node, &task_config, &registry).await });

        self.running.insert(tag, RunningNode { keep_working, handle });
    }

    async fn run_periodic_jobs(&mut self) {
        let now = self.state.now.instant_now();

        if now.saturating_duration_since(self.last_status_dump) >= STATUS_DUMP_INTERVAL {
            self.dump_status();
            self.last_status_dump = now;
        }

        if now.saturating_duration_since(self.last_config_reload) >= CONFIG_RELOAD_INTERVAL {
            self.refresh_prices().await;
            self.last_config_reload = now;
        }

        if now.saturating_duration_since(self.last_balance_refresh) >= BALANCE_REFRESH_INTERVAL {
            self.refresh_balance().await;
            self.last_balance_refresh = now;
        }
    }

    fn dump_status(&self) {
        for node in self.state.registry.values() {
            log::info!(
                "{:<16} {:<20} deal={:<8} task={:<8} price={}",
                node.tag,
                node.status,
                node.deal_id.map(|d| d.to_string()).unwrap_or_else(|| "-".to_owned()),
                node.task_id.map(|t| t.to_string()).unwrap_or_else(|| "-".to_owned()),
                node.formatted_price(),
            );
        }
    }

    async fn refresh_prices(&self) {
        let tasks: Vec<TaskConfig> = self.state.config.read().unwrap().tasks.clone();
        for task in &tasks {
            let bundle = resource_bundle(&task.resources);
            self.state
                .pricing
                .predict(self.state.client.as_ref(), &task.tag, &bundle)
                .await;
        }
    }

    async fn refresh_balance(&self) {
        match self.state.client.token_balance().await {
            Ok(balance) => log::info!(
                "balance: live={} side={} eth={}",
                crate::marketplace::Balance::format_field(balance.live_balance),
                crate::marketplace::Balance::format_field(balance.side_balance),
                crate::marketplace::Balance::format_field(balance.live_eth_balance),
            ),
            Err(error) => log::warn!("failed to refresh balance: {}", error),
        }
    }

    /// Signals every running node to stop, for use during process shutdown.
    /// Does not wait for the nodes to finish tearing down.
    pub fn shut_down(&self) {
        for running in self.running.values() {
            running
                .keep_working
                .store(false, std::sync::atomic::Ordering::SeqCst);
        }
    }
}
