// Mockall triggers this warning for every mocked trait. This is fixed in Mockall master but not
// released.
#![cfg_attr(test, allow(clippy::unused_unit))]

pub mod bid;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod marketplace;
pub mod natural_sort;
pub mod node;
pub mod pricing;
pub mod reconciler;
pub mod registry;
pub mod rest_client;
pub mod supervisor;
pub mod util;
