//! A REST-backed [`MarketplaceClient`], talking to the node daemon's HTTP
//! API the way the reference marketplace SDK does: JSON request/response
//! bodies, a `status_code` field on every response, and Base64 NUL-padded
//! tag fields.
//!
//! Key material handling (signing, account setup) is an external
//! collaborator's concern; this client only implements the RPC contract the
//! core logic depends on.

use crate::error::MarketplaceError;
use crate::http::HttpClient;
use crate::marketplace::{
    Balance, Bid, DealStatus, MarketplaceClient, OrderListEntry, OrderStatus, RetryPolicy,
    TaskStatus,
};
use crate::util::AsyncSleeping;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Envelope {
    status_code: u16,
    #[serde(flatten)]
    body: serde_json::Value,
}

pub struct HttpMarketplaceClient {
    http: HttpClient,
    base_url: String,
    address: String,
    sleeper: std::sync::Arc<dyn AsyncSleeping>,
}

impl HttpMarketplaceClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        address: impl Into<String>,
        sleeper: std::sync::Arc<dyn AsyncSleeping>,
    ) -> Self {
        HttpMarketplaceClient {
            http,
            base_url: base_url.into(),
            address: address.into(),
            sleeper,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, payload: serde_json::Value) -> Result<serde_json::Value, MarketplaceError> {
        let body = self
            .http
            .post_raw_json_async(self.url(path), payload.to_string())
            .await
            .map_err(MarketplaceError::Transport)?;
        let envelope: Envelope =
            serde_json::from_str(&body).context("malformed marketplace response")?;
        if envelope.status_code != 200 {
            return Err(MarketplaceError::BadStatus(format!(
                "{}: {}",
                envelope.status_code, envelope.body
            )));
        }
        Ok(envelope.body)
    }

    async fn with_retry<T, F, Fut>(&self, policy: RetryPolicy, operation: F) -> Result<T, MarketplaceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, MarketplaceError>>,
    {
        crate::marketplace::with_retry(policy, self.sleeper.as_ref(), operation).await
    }
}

#[async_trait]
impl MarketplaceClient for HttpMarketplaceClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn order_create(&self, bid: &Bid) -> Result<u64, MarketplaceError> {
        self.with_retry(RetryPolicy::DEFAULT, || async {
            let payload = json!({
                "duration": {"nanoseconds": bid.duration_nanoseconds},
                "price": {"perSecond": bid.price_wei_per_second.to_string()},
                "identity": bid.identity,
                "tag": bid.tag,
            });
            let body = self.post("order/create", payload).await?;
            body.get("id")
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse::<u64>().ok())))
                .ok_or_else(|| MarketplaceError::BadStatus("missing order id".to_owned()))
        })
        .await
    }

    async fn order_list(&self, limit: u32) -> Result<Vec<OrderListEntry>, MarketplaceError> {
        let body = self
            .post("order/list", json!({"owner": self.address, "limit": limit}))
            .await?;
        let orders = body
            .get("orders")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(orders
            .into_iter()
            .filter_map(|entry| {
                let order = entry.get("order")?;
                Some(OrderListEntry {
                    id: order.get("id")?.as_u64()?,
                    tag: order.get("tag")?.as_str()?.to_owned(),
                    price: order.get("price")?.as_str()?.to_owned(),
                })
            })
            .collect())
    }

    async fn order_status(&self, order_id: u64) -> Result<OrderStatus, MarketplaceError> {
        let body = self
            .post("order/status", json!({"id": order_id}))
            .await?;
        Ok(OrderStatus {
            order_status: body.get("orderStatus").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
            tag: body
                .get("tag")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            deal_id: body.get("dealID").and_then(|v| v.as_u64()).unwrap_or(0),
        })
    }

    async fn order_cancel(&self, order_id: u64) -> Result<(), MarketplaceError> {
        self.post("order/cancel", json!({"ids": [order_id]})).await?;
        Ok(())
    }

    async fn deal_list(&self, limit: u32) -> Result<Vec<u64>, MarketplaceError> {
        let body = self
            .post(
                "deal/list",
                json!({"status": 1, "consumerID": self.address, "limit": limit}),
            )
            .await?;
        let deals = body
            .get("deals")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(deals
            .into_iter()
            .filter_map(|entry| entry.get("deal")?.get("id")?.as_u64())
            .collect())
    }

    async fn deal_status(&self, deal_id: u64) -> Result<DealStatus, MarketplaceError> {
        let body = self.post("deal/status", json!({"id": deal_id})).await?;
        let deal = body.get("deal").cloned().unwrap_or(body);
        Ok(DealStatus {
            status: deal.get("status").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
            bid_id: deal.get("bidID").and_then(|v| v.as_u64()).unwrap_or(0),
            price: deal
                .get("price")
                .and_then(|v| v.as_str())
                .unwrap_or("0")
                .to_owned(),
            running: deal.get("running").and_then(|v| v.as_array()).map(|arr| {
                arr.iter().filter_map(|v| v.as_u64()).collect()
            }),
            worker_offline: deal.get("resources").is_none(),
        })
    }

    async fn deal_close(&self, deal_id: u64, blacklist: bool) -> Result<(), MarketplaceError> {
        self.post("deal/close", json!({"id": deal_id, "blacklist": blacklist}))
            .await?;
        Ok(())
    }

    async fn task_start(&self, deal_id: u64, task_spec: &str, timeout: Duration) -> Result<u64, MarketplaceError> {
        self.with_retry(RetryPolicy::TASK_START, || async {
            let payload = json!({
                "dealID": deal_id,
                "spec": task_spec,
                "timeoutSeconds": timeout.as_secs(),
            });
            let body = self.post("task/start", payload).await?;
            body.get("id")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| MarketplaceError::BadStatus("missing task id".to_owned()))
        })
        .await
    }

    async fn task_status(&self, deal_id: u64, task_id: u64) -> Result<TaskStatus, MarketplaceError> {
        self.with_retry(RetryPolicy::TASK_STATUS, || async {
            let body = self
                .post("task/status", json!({"dealID": deal_id, "taskID": task_id}))
                .await?;
            let uptime_nanoseconds = body.get("uptime").and_then(|v| v.as_u64()).unwrap_or(0);
            Ok(TaskStatus {
                status: body.get("status").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
                uptime_seconds: uptime_nanoseconds / 1_000_000_000,
            })
        })
        .await
    }

    async fn task_logs(&self, deal_id: u64, task_id: u64, tail_lines: u64, out_file: &str) -> Result<(), MarketplaceError> {
        // Out of scope: the reference implementation shells out to a
        // separate CLI binary to fetch and save logs. We only record the
        // request; the actual log capture is an external collaborator.
        log::debug!(
            "would capture {} lines of logs for deal {} task {} to {}",
            tail_lines,
            deal_id,
            task_id,
            out_file
        );
        Ok(())
    }

    async fn predict(&self, resources: &crate::marketplace::ResourceBundle) -> Result<u128, MarketplaceError> {
        let payload = json!({
            "ram": resources.ram_bytes,
            "storage": resources.storage_bytes,
            "cpuCores": resources.cpu_cores,
            "cpuSysbenchSingle": resources.cpu_sysbench_single,
            "cpuSysbenchMulti": resources.cpu_sysbench_multi,
            "netDownload": resources.net_download_bytes,
            "netUpload": resources.net_upload_bytes,
            "overlay": resources.overlay,
            "incoming": resources.incoming,
            "gpuCount": resources.gpu_count,
            "gpuMem": resources.gpu_mem_bytes,
            "ethHashrate": resources.eth_hashrate_hs,
        });
        let body = self.post("predictor/predict", payload).await?;
        body.get("perSecond")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| MarketplaceError::BadStatus("missing perSecond".to_owned()))
    }

    async fn token_balance(&self) -> Result<Balance, MarketplaceError> {
        let body = self.post("token/balance", json!({})).await?;
        Ok(Balance {
            live_balance: body.get("liveBalance").and_then(|v| v.as_f64()),
            side_balance: body.get("sideBalance").and_then(|v| v.as_f64()),
            live_eth_balance: body.get("liveEthBalance").and_then(|v| v.as_f64()),
        })
    }
}
