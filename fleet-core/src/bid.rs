//! Per-task-class configuration and the derivation of a wire [`Bid`] from it.

use crate::marketplace::{Bid, ResourceBundle};
use crate::util::usd_per_hour_to_wei_per_second;
use serde::Deserialize;
use std::time::Duration;

/// Marketplace identity levels a counterparty worker must have reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Unknown,
    Anonymous,
    Registered,
    Identified,
    Professional,
}

impl Identity {
    pub fn as_wire_value(self) -> u8 {
        match self {
            Identity::Unknown => 0,
            Identity::Anonymous => 1,
            Identity::Registered => 2,
            Identity::Identified => 3,
            Identity::Professional => 4,
        }
    }
}

/// The resource bundle as configured (human units: MiB, GiB, MHz, cores).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceConfig {
    #[serde(rename = "ramsize")]
    pub ram_mib: u64,
    #[serde(rename = "storagesize")]
    pub storage_gib: u64,
    #[serde(rename = "cpucores")]
    pub cpu_cores: u32,
    #[serde(rename = "sysbenchsingle")]
    pub cpu_sysbench_single: u32,
    #[serde(rename = "sysbenchmulti")]
    pub cpu_sysbench_multi: u32,
    #[serde(rename = "netdownload")]
    pub net_download_mib: u64,
    #[serde(rename = "netupload")]
    pub net_upload_mib: u64,
    pub overlay: bool,
    pub incoming: bool,
    #[serde(rename = "gpucount")]
    pub gpu_count: u32,
    #[serde(rename = "gpumem")]
    pub gpu_mem_mib: u64,
    #[serde(rename = "ethhashrate")]
    pub eth_hashrate_mhs: u64,
}

/// Configuration for a single task class, keyed by `tag` in the fleet config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    pub tag: String,
    #[serde(rename = "numberofnodes")]
    pub number_of_nodes: u32,
    #[serde(rename = "max_price", deserialize_with = "crate::config::deserialize_price")]
    pub max_price_usd_per_hour: f64,
    #[serde(rename = "price_coefficient")]
    pub price_coefficient_percent: i32,
    pub ets: u64,
    pub task_start_timeout: u64,
    pub template_file: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub counterparty: Option<String>,
    pub identity: Identity,
    #[serde(flatten)]
    pub resources: ResourceConfig,
}

impl TaskConfig {
    /// All node-tags this task class expects to own, `"<tag>_<i>"` for
    /// `i` in `1..=number_of_nodes`.
    pub fn node_tags(&self) -> Vec<String> {
        (1..=self.number_of_nodes)
            .map(|i| format!("{}_{}", self.tag, i))
            .collect()
    }
}

/// Builds the wire resource bundle, applying the GPU zero-elision rule: a
/// task with no GPUs configured must never carry GPU memory or hashrate in
/// the bid, regardless of what was configured for those fields.
pub fn resource_bundle(config: &ResourceConfig) -> ResourceBundle {
    let (gpu_mem_bytes, eth_hashrate_hs) = if config.gpu_count == 0 {
        (0, 0)
    } else {
        (
            config.gpu_mem_mib * 1024 * 1024,
            config.eth_hashrate_mhs * 1_000_000,
        )
    };

    ResourceBundle {
        ram_bytes: config.ram_mib * 1024 * 1024,
        storage_bytes: config.storage_gib * 1024 * 1024 * 1024,
        cpu_cores: config.cpu_cores,
        cpu_sysbench_single: config.cpu_sysbench_single,
        cpu_sysbench_multi: config.cpu_sysbench_multi,
        net_download_bytes: config.net_download_mib * 1024 * 1024,
        net_upload_bytes: config.net_upload_mib * 1024 * 1024,
        overlay: config.overlay,
        incoming: config.incoming,
        gpu_count: config.gpu_count,
        gpu_mem_bytes,
        eth_hashrate_hs,
    }
}

/// Builds a bid ready for `order.create` for `node_tag` at `price_usd_per_hour`.
pub fn build_bid(config: &TaskConfig, node_tag: &str, price_usd_per_hour: f64) -> Bid {
    Bid {
        duration_nanoseconds: Duration::from_secs(config.duration_seconds).as_nanos() as u64,
        price_wei_per_second: usd_per_hour_to_wei_per_second(price_usd_per_hour),
        identity: config.identity.as_wire_value(),
        tag: node_tag.to_owned(),
        resources: resource_bundle(&config.resources),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_resources() -> ResourceConfig {
        ResourceConfig {
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
            gpu_mem_mib: 8192,
            eth_hashrate_mhs: 30,
        }
    }

    #[test]
    fn gpu_fields_are_zeroed_when_no_gpu_configured() {
        let bundle = resource_bundle(&base_resources());
        assert_eq!(bundle.gpu_mem_bytes, 0);
        assert_eq!(bundle.eth_hashrate_hs, 0);
    }

    #[test]
    fn gpu_fields_pass_through_when_gpu_configured() {
        let mut config = base_resources();
        config.gpu_count = 2;
        let bundle = resource_bundle(&config);
        assert_eq!(bundle.gpu_mem_bytes, 8192 * 1024 * 1024);
        assert_eq!(bundle.eth_hashrate_hs, 30_000_000);
    }

    #[test]
    fn node_tags_are_one_indexed() {
        let config = TaskConfig {
            tag: "miner".to_owned(),
            number_of_nodes: 3,
            max_price_usd_per_hour: 0.2,
            price_coefficient_percent: 10,
            ets: 300,
            task_start_timeout: 60,
            template_file: "miner.yaml".to_owned(),
            duration_seconds: 3600,
            counterparty: None,
            identity: Identity::Anonymous,
            resources: base_resources(),
        };
        assert_eq!(config.node_tags(), vec!["miner_1", "miner_2", "miner_3"]);
    }
}
