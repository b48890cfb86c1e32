//! Rebuilds node state from the marketplace's own record of deals and
//! orders, so that a restarted process adopts what it already owns instead
//! of placing duplicate orders.

use crate::config::FleetConfig;
use crate::marketplace::MarketplaceClient;
use crate::node::{Node, NodeStatus};
use crate::registry::Registry;
use crate::util::Now;
use base64::decode as base64_decode;

/// Strips Base64 padding NULs and decodes a wire tag back into its original
/// string form. Used for both deal and order tag fields, which the
/// marketplace transports as fixed-width, NUL-padded, Base64-encoded bytes.
pub fn parse_tag(encoded: &str) -> Option<String> {
    let bytes = base64_decode(encoded).ok()?;
    let trimmed: Vec<u8> = bytes.into_iter().take_while(|&b| b != 0).collect();
    String::from_utf8(trimmed).ok()
}

/// Runs the full reconciliation pass: queries remote deals and orders,
/// matches them against configured node-tags, seeds matching nodes into the
/// registry in their reconstructed state, then fills in an empty `Start`
/// node for every configured tag that had no remote counterpart.
pub async fn reconcile(
    client: &dyn MarketplaceClient,
    config: &FleetConfig,
    registry: &Registry,
    now: &dyn Now,
) {
    let configured_tags = config.all_node_tags();
    let limit = configured_tags.len() as u32;

    reconcile_deals(client, &configured_tags, registry, now).await;
    reconcile_orders(client, &configured_tags, registry, limit, now).await;

    for tag in &configured_tags {
        if !registry.contains(tag) {
            registry.add(Node::empty(tag.clone(), now));
        }
    }
}

async fn reconcile_deals(
    client: &dyn MarketplaceClient,
    configured_tags: &[String],
    registry: &Registry,
    now: &dyn Now,
) {
    let limit = configured_tags.len() as u32;
    let deal_ids = match client.deal_list(limit).await {
        Ok(ids) => ids,
        Err(error) => {
            log::warn!("reconciliation: failed to list deals: {}", error);
            return;
        }
    };

    for deal_id in deal_ids {
        let deal = match client.deal_status(deal_id).await {
            Ok(deal) => deal,
            Err(error) => {
                log::warn!("reconciliation: failed to fetch deal {}: {}", deal_id, error);
                continue;
            }
        };
        let order = match client.order_status(deal.bid_id).await {
            Ok(order) => order,
            Err(error) => {
                log::warn!(
                    "reconciliation: failed to fetch order {} for deal {}: {}",
                    deal.bid_id,
                    deal_id,
                    error
                );
                continue;
            }
        };

        let tag = match parse_tag(&order.tag) {
            Some(tag) => tag,
            None => continue,
        };
        if !configured_tags.iter().any(|t| t == &tag) {
            continue;
        }

        let mut node = Node::empty(tag, now);
        node.deal_id = Some(deal_id);
        node.bid_id = Some(deal.bid_id);
        node.price = deal.price.parse().ok();

        node.status = if deal.worker_offline {
            NodeStatus::TaskFailed
        } else if let Some(running) = &deal.running {
            if let Some(&task_id) = running.first() {
                node.task_id = Some(task_id);
                NodeStatus::TaskRunning
            } else {
                NodeStatus::DealOpened
            }
        } else {
            NodeStatus::DealOpened
        };

        registry.add(node);
    }
}

async fn reconcile_orders(
    client: &dyn MarketplaceClient,
    configured_tags: &[String],
    registry: &Registry,
    limit: u32,
    now: &dyn Now,
) {
    let orders = match client.order_list(limit).await {
        Ok(orders) => orders,
        Err(error) => {
            log::warn!("reconciliation: failed to list orders: {}", error);
            return;
        }
    };

    for order in orders {
        let tag = match parse_tag(&order.tag) {
            Some(tag) => tag,
            None => continue,
        };
        if !configured_tags.iter().any(|t| t == &tag) {
            continue;
        }
        if registry.contains(&tag) {
            // Already seeded as DEAL_OPENED/TASK_RUNNING by reconcile_deals.
            continue;
        }

        let mut node = Node::empty(tag, now);
        node.bid_id = Some(order.id);
        node.price = order.price.parse().ok();
        node.status = NodeStatus::AwaitingDeal;
        registry.add(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid::{Identity, ResourceConfig, TaskConfig};
    use crate::config::{BaseConfig, EthereumConfig};
    use crate::marketplace::{deal_status as deal_status_codes, DealStatus, MockMarketplaceClient, OrderListEntry, OrderStatus};
    use crate::util::default_now;
    use base64::encode as base64_encode;

    fn fleet_config() -> FleetConfig {
        FleetConfig {
            base: BaseConfig {
                node_address: "0x0000000000000000000000000000000000000001".to_owned(),
                ethereum: EthereumConfig {
                    key_path: "/keys".to_owned(),
                    password: "secret".to_owned(),
                },
                timeout: 60,
                restart_timeout: 600,
            },
            tasks: vec![TaskConfig {
                tag: "miner".to_owned(),
                number_of_nodes: 2,
                max_price_usd_per_hour: 0.20,
                price_coefficient_percent: 10,
                ets: 300,
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
            }],
        }
    }

    fn wire_tag(tag: &str) -> String {
        let mut padded = tag.as_bytes().to_vec();
        padded.resize(64, 0);
        base64_encode(&padded)
    }

    #[test]
    fn tag_round_trips_through_base64_with_nul_padding() {
        let wire = wire_tag("miner_1");
        assert_eq!(parse_tag(&wire).as_deref(), Some("miner_1"));
    }

    #[test]
    fn adopts_open_deal_with_running_task() {
        let config = fleet_config();
        let registry = Registry::new();
        let now = default_now();

        let mut client = MockMarketplaceClient::new();
        client.expect_deal_list().returning(|_| Ok(vec![42]));
        client.expect_deal_status().returning(|_| {
            Ok(DealStatus {
                status: deal_status_codes::OPENED,
                bid_id: 7,
                price: "0.11".to_owned(),
                running: Some(vec![99]),
                worker_offline: false,
            })
        });
        client.expect_order_status().returning(move |_| {
            Ok(OrderStatus {
                order_status: 1,
                tag: wire_tag("miner_1"),
                deal_id: 42,
            })
        });
        client.expect_order_list().returning(|_| Ok(Vec::new()));

        futures::executor::block_on(reconcile(&client, &config, &registry, &now));

        let node = registry.get("miner_1").unwrap();
        assert_eq!(node.status, NodeStatus::TaskRunning);
        assert_eq!(node.deal_id, Some(42));
        assert_eq!(node.bid_id, Some(7));
        assert_eq!(node.task_id, Some(99));

        // Every configured tag exists afterwards, including the unmatched one.
        assert!(registry.contains("miner_2"));
        assert_eq!(registry.get("miner_2").unwrap().status, NodeStatus::Start);
    }

    #[test]
    fn adopts_pending_order_without_a_deal() {
        let config = fleet_config();
        let registry = Registry::new();
        let now = default_now();

        let mut client = MockMarketplaceClient::new();
        client.expect_deal_list().returning(|_| Ok(Vec::new()));
        client.expect_order_list().returning(move |_| {
            Ok(vec![OrderListEntry {
                id: 5,
                tag: wire_tag("miner_2"),
                price: "0.15".to_owned(),
            }])
        });

        futures::executor::block_on(reconcile(&client, &config, &registry, &now));

        let node = registry.get("miner_2").unwrap();
        assert_eq!(node.status, NodeStatus::AwaitingDeal);
        assert_eq!(node.bid_id, Some(5));
    }

    #[test]
    fn unmatched_remote_tags_are_ignored() {
        let config = fleet_config();
        let registry = Registry::new();
        let now = default_now();

        let mut client = MockMarketplaceClient::new();
        client.expect_deal_list().returning(|_| Ok(Vec::new()));
        client.expect_order_list().returning(|_| {
            Ok(vec![OrderListEntry {
                id: 1,
                tag: wire_tag("someone_elses_tag_1"),
                price: "0.15".to_owned(),
            }])
        });

        futures::executor::block_on(reconcile(&client, &config, &registry, &now));

        assert!(!registry.contains("someone_elses_tag_1"));
        assert_eq!(registry.len(), 2);
    }
}
