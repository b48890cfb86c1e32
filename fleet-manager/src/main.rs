use anyhow::{anyhow, Context, Result};
use fleet_core::config::FleetConfig;
use fleet_core::logging;
use fleet_core::pricing::PriceOracle;
use fleet_core::registry::Registry;
use fleet_core::reconciler::reconcile;
use fleet_core::rest_client::HttpMarketplaceClient;
use fleet_core::supervisor::{AppState, Supervisor};
use fleet_core::util::{default_now, AsyncSleep};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "fleet-manager", rename_all = "kebab")]
struct Options {
    /// The log filter to use, following the `slog-envlogger`/`RUST_LOG` syntax
    /// (e.g. 'info,fleet_manager=debug').
    #[structopt(long, env = "LOG_FILTER", default_value = "info")]
    log_filter: String,

    /// Path to the fleet YAML configuration file.
    #[structopt(long, env = "CONFIG_PATH", default_value = "config.yaml")]
    config_path: PathBuf,

    /// Base URL of the marketplace node daemon's REST API.
    #[structopt(long, env = "MARKETPLACE_ENDPOINT")]
    marketplace_endpoint: String,

    /// Default timeout, in seconds, for marketplace RPC calls.
    #[structopt(long, env = "RPC_TIMEOUT", default_value = "60")]
    rpc_timeout_seconds: u64,
}

fn first_key_file(dir: &Path) -> Result<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read key storage directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    entries
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("key storage directory {} contains no files", dir.display()))
}

fn load_config(path: &Path) -> Result<FleetConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    fleet_core::config::load_str(&contents)
        .map_err(|e| anyhow!("invalid configuration in {}: {}", path.display(), e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::from_args();
    logging::init().map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let config = load_config(&options.config_path)?;
    // The key-store selection policy is preserved purely as an interface
    // requirement: whichever file sorts first in the directory is used.
    // Key loading and signing themselves are an external collaborator.
    let _key_file = first_key_file(Path::new(&config.base.ethereum.key_path))?;

    let http_factory = fleet_core::http::HttpFactory::new(Duration::from_secs(
        options.rpc_timeout_seconds.max(config.base.timeout),
    ));
    let http_client = http_factory.create()?;
    let sleeper = Arc::new(AsyncSleep);
    let client = Arc::new(HttpMarketplaceClient::new(
        http_client,
        options.marketplace_endpoint.clone(),
        config.base.node_address.clone(),
        sleeper.clone(),
    ));

    let registry = Arc::new(Registry::new());
    let now = Arc::new(default_now());
    let restart_timeout = Duration::from_secs(config.base.restart_timeout);

    log::info!(
        "reconciling fleet state against {}",
        options.marketplace_endpoint
    );
    reconcile(client.as_ref(), &config, registry.as_ref(), now.as_ref()).await;

    let state = Arc::new(AppState {
        client,
        pricing: Arc::new(PriceOracle::new()),
        registry,
        sleeper,
        now,
        config: Arc::new(RwLock::new(config)),
        restart_timeout,
    });

    let mut supervisor = Supervisor::new(state);
    log::info!("fleet manager started with filter '{}'", options.log_filter);

    loop {
        supervisor.tick().await;
        tokio::time::delay_for(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleet-manager-test-{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn first_key_file_picks_the_alphabetically_first_entry() {
        let dir = scratch_dir("picks-first");
        std::fs::write(dir.join("b.key"), b"").unwrap();
        std::fs::write(dir.join("a.key"), b"").unwrap();

        let picked = first_key_file(&dir).unwrap();

        assert_eq!(picked.file_name().unwrap(), "a.key");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn first_key_file_ignores_subdirectories() {
        let dir = scratch_dir("ignores-subdirs");
        std::fs::create_dir(dir.join("aaa_not_a_file")).unwrap();
        std::fs::write(dir.join("z.key"), b"").unwrap();

        let picked = first_key_file(&dir).unwrap();

        assert_eq!(picked.file_name().unwrap(), "z.key");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn first_key_file_errors_on_an_empty_directory() {
        let dir = scratch_dir("empty");
        assert!(first_key_file(&dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
