//! Loading and validating the fleet's YAML configuration file.
//!
//! Validation intentionally does not stop at the first missing key: an
//! operator fixing a config file one error at a time is a bad experience,
//! so every missing key is collected and reported together.

use crate::bid::TaskConfig;
use crate::error::{ConfigError, ParseErrorKind};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::collections::HashSet;

const TOP_LEVEL_KEYS: &[&str] = &["node_address", "ethereum", "tasks"];
const ETHEREUM_KEYS: &[&str] = &["key_path", "password"];
const TASK_KEYS: &[&str] = &[
    "numberofnodes",
    "tag",
    "price_coefficient",
    "max_price",
    "ets",
    "task_start_timeout",
    "template_file",
    "duration",
    "counterparty",
    "identity",
    "ramsize",
    "storagesize",
    "cpucores",
    "sysbenchsingle",
    "sysbenchmulti",
    "netdownload",
    "netupload",
    "overlay",
    "incoming",
    "gpucount",
    "gpumem",
    "ethhashrate",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EthereumConfig {
    pub key_path: String,
    pub password: String,
}

/// Base process configuration: everything that is not per-task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BaseConfig {
    pub node_address: String,
    pub ethereum: EthereumConfig,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout: u64,
}

fn default_timeout() -> u64 {
    60
}

fn default_restart_timeout() -> u64 {
    600
}

/// The full fleet configuration: base settings plus every task class.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    pub base: BaseConfig,
    pub tasks: Vec<TaskConfig>,
}

impl FleetConfig {
    /// All node-tags across every configured task class.
    pub fn all_node_tags(&self) -> Vec<String> {
        self.tasks.iter().flat_map(TaskConfig::node_tags).collect()
    }

    /// Finds the task class owning `node_tag`, by stripping the trailing
    /// `_<index>` suffix and matching the remainder against a task tag.
    pub fn task_for_node_tag(&self, node_tag: &str) -> Option<&TaskConfig> {
        let task_tag = node_tag.rsplit_once('_').map(|(prefix, _)| prefix)?;
        self.tasks.iter().find(|t| t.tag == task_tag)
    }
}

/// Parses and validates `contents` (the raw YAML document), returning every
/// missing required key at once rather than failing on the first one.
pub fn load_str(contents: &str) -> Result<FleetConfig, ConfigError> {
    let document: Value = serde_yaml::from_str(contents)
        .map_err(|e| ConfigError::Parse {
            path: "<config>".to_owned(),
            source: ParseErrorKind::from(e),
        })?;

    let mut missing = Vec::new();
    check_keys(&document, TOP_LEVEL_KEYS, "", &mut missing);
    if let Some(ethereum) = document.get("ethereum") {
        check_keys(ethereum, ETHEREUM_KEYS, "ethereum.", &mut missing);
    }

    let mut seen_tags = HashSet::new();
    if let Some(Value::Sequence(tasks)) = document.get("tasks") {
        for (i, task) in tasks.iter().enumerate() {
            check_keys(task, TASK_KEYS, &format!("tasks[{}].", i), &mut missing);
            if let Some(Value::String(tag)) = task.get("tag") {
                if !seen_tags.insert(tag.clone()) {
                    missing.push(format!("tasks[{}].tag (duplicate '{}')", i, tag));
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingKeys(missing));
    }

    let base: BaseConfig = serde_yaml::from_value(document.clone()).map_err(|e| ConfigError::Parse {
        path: "<config>".to_owned(),
        source: ParseErrorKind::from(e),
    })?;

    let tasks: Vec<TaskConfig> = match document.get("tasks") {
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::Parse {
            path: "<config>".to_owned(),
            source: ParseErrorKind::from(e),
        })?,
        None => Vec::new(),
    };

    Ok(FleetConfig { base, tasks })
}

fn check_keys(value: &Value, keys: &[&str], prefix: &str, missing: &mut Vec<String>) {
    for key in keys {
        if value.get(key).is_none() {
            missing.push(format!("{}{}", prefix, key));
        }
    }
}

/// Parses a configured price string such as `"0.20 USD/h"` or `"0.001 USD/s"`
/// into USD/hour. Fails on any unit other than `USD/h` or `USD/s`.
pub fn parse_price(raw: &str) -> Result<f64, ConfigError> {
    let raw = raw.trim();
    if let Some(amount) = raw.strip_suffix("USD/h") {
        amount
            .trim()
            .parse::<f64>()
            .map_err(|e| ConfigError::InvalidPrice(raw.to_owned(), e.to_string()))
    } else if let Some(amount) = raw.strip_suffix("USD/s") {
        amount
            .trim()
            .parse::<f64>()
            .map(|per_second| per_second * 3600.0)
            .map_err(|e| ConfigError::InvalidPrice(raw.to_owned(), e.to_string()))
    } else {
        Err(ConfigError::InvalidPrice(
            raw.to_owned(),
            "price must end with 'USD/h' or 'USD/s'".to_owned(),
        ))
    }
}

/// `serde` helper for fields that are stored as `"0.20 USD/h"`-style
/// strings in the config file but used as plain USD/hour floats everywhere
/// else in the crate.
pub fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_price(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
node_address: "0x0000000000000000000000000000000000000001"
ethereum:
  key_path: /keys
  password: secret
tasks:
  - tag: miner
    numberofnodes: 1
    price_coefficient: 10
    max_price: "0.20 USD/h"
    ets: 300
    task_start_timeout: 60
    template_file: miner.yaml
    duration: 3600
    counterparty: null
    identity: anonymous
    ramsize: 1024
    storagesize: 10
    cpucores: 4
    sysbenchsingle: 1000
    sysbenchmulti: 4000
    netdownload: 100
    netupload: 50
    overlay: false
    incoming: true
    gpucount: 0
    gpumem: 0
    ethhashrate: 0
"#;

    #[test]
    fn parses_a_valid_document() {
        let config = load_str(VALID).unwrap();
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].tag, "miner");
        assert_eq!(config.base.timeout, 60);
        assert_eq!(config.base.restart_timeout, 600);
    }

    #[test]
    fn reports_every_missing_top_level_key() {
        let err = load_str("node_address: \"0x1\"\n").unwrap_err();
        match err {
            ConfigError::MissingKeys(keys) => {
                assert!(keys.contains(&"ethereum".to_owned()));
                assert!(keys.contains(&"tasks".to_owned()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn rejects_duplicate_task_tags() {
        let doc = VALID.replace("tasks:\n  - tag: miner", "tasks:\n  - tag: miner\n  - tag: miner");
        // Not quite valid YAML duplication syntax-wise in this naive replace,
        // so build it more directly instead.
        let _ = doc;
        let duplicated = format!("{}\n  - tag: miner\n    numberofnodes: 1\n    price_coefficient: 10\n    max_price: \"0.20 USD/h\"\n    ets: 300\n    task_start_timeout: 60\n    template_file: miner.yaml\n    duration: 3600\n    counterparty: null\n    identity: anonymous\n    ramsize: 1024\n    storagesize: 10\n    cpucores: 4\n    sysbenchsingle: 1000\n    sysbenchmulti: 4000\n    netdownload: 100\n    netupload: 50\n    overlay: false\n    incoming: true\n    gpucount: 0\n    gpumem: 0\n    ethhashrate: 0\n", VALID);
        let err = load_str(&duplicated).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKeys(_)));
    }

    #[test]
    fn parses_prices_in_both_units() {
        assert_approx_eq::assert_approx_eq!(parse_price("0.20 USD/h").unwrap(), 0.20, 1e-9);
        assert_approx_eq::assert_approx_eq!(parse_price("0.001 USD/s").unwrap(), 3.6, 1e-9);
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_price("0.20 EUR/h").is_err());
    }

    #[test]
    fn task_for_node_tag_strips_trailing_index() {
        let config = load_str(VALID).unwrap();
        let task = config.task_for_node_tag("miner_3").unwrap();
        assert_eq!(task.tag, "miner");
        assert!(config.task_for_node_tag("unknown_1").is_none());
    }
}
