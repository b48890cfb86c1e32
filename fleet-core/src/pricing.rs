//! Translates predicted market prices into the price an order should be
//! placed at, applying the operator's coefficient and cap.

use crate::bid::TaskConfig;
use crate::marketplace::{MarketplaceClient, ResourceBundle};
use crate::util::wei_per_second_to_usd_per_hour;
use std::collections::HashMap;
use std::sync::RwLock;

/// Caches the last successful prediction per task tag and derives the price
/// an order should actually be placed at.
pub struct PriceOracle {
    cache: RwLock<HashMap<String, f64>>,
}

impl PriceOracle {
    pub fn new() -> Self {
        PriceOracle {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Queries the remote predictor for `tag`'s resource bundle. On success
    /// the result is cached under `tag` and returned; on failure the
    /// previous cached value (if any) is left untouched and `None` is
    /// returned.
    pub async fn predict(
        &self,
        client: &dyn MarketplaceClient,
        tag: &str,
        resources: &ResourceBundle,
    ) -> Option<f64> {
        match client.predict(resources).await {
            Ok(wei_per_second) => {
                let usd_per_hour = wei_per_second_to_usd_per_hour(wei_per_second);
                self.cache
                    .write()
                    .unwrap()
                    .insert(tag.to_owned(), usd_per_hour);
                Some(usd_per_hour)
            }
            Err(error) => {
                log::warn!("price prediction for '{}' failed: {}", tag, error);
                None
            }
        }
    }

    /// Returns the last cached prediction for `tag`, if any.
    pub fn price_for_tag(&self, tag: &str) -> Option<f64> {
        self.cache.read().unwrap().get(tag).copied()
    }
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the USD/hour price an order for `config` should be placed at,
/// given the last cached prediction (or `None` if the predictor has never
/// succeeded). The cap in `config.max_price_usd_per_hour` is a hard ceiling:
/// the returned price never exceeds it.
pub fn order_price(config: &TaskConfig, cached_prediction: Option<f64>) -> f64 {
    let cap = config.max_price_usd_per_hour;
    let prediction = match cached_prediction {
        Some(p) => p,
        None => return cap,
    };

    let adjusted = prediction * (1.0 + config.price_coefficient_percent as f64 / 100.0);
    if adjusted < cap {
        adjusted
    } else {
        cap
    }
}
