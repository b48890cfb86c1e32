use futures::future::{BoxFuture, FutureExt as _};
use std::{
    future::Future,
    time::{Duration, Instant, SystemTime},
};

/// Convert a USD/hour price into wei-per-second, rounding to the nearest wei.
pub fn usd_per_hour_to_wei_per_second(usd_per_hour: f64) -> u128 {
    (usd_per_hour * 1e18 / 3600.0).round() as u128
}

/// Convert a wei-per-second price back into USD/hour.
pub fn wei_per_second_to_usd_per_hour(wei_per_second: u128) -> f64 {
    wei_per_second as f64 * 3600.0 / 1e18
}

pub trait FutureWaitExt: Future {
    fn wait(self) -> Self::Output;
}

impl<F> FutureWaitExt for F
where
    F: Future,
{
    fn wait(self) -> Self::Output {
        futures::executor::block_on(self)
    }
}

/// Abstraction over sleeping so that node loops can be driven by a mock clock
/// in tests instead of waiting out real wall time.
#[cfg_attr(test, mockall::automock)]
pub trait AsyncSleeping: 'static + Send + Sync {
    #[must_use]
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        async_std::task::sleep(duration).boxed()
    }
}

pub struct AsyncSleep;
impl AsyncSleeping for AsyncSleep {}

#[cfg_attr(test, mockall::automock)]
pub trait Now: 'static + Send + Sync {
    fn system_now(&self) -> SystemTime;
    fn instant_now(&self) -> Instant;
}

pub fn default_now() -> impl Now {
    DefaultNow {}
}

struct DefaultNow;
impl Now for DefaultNow {
    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
    fn instant_now(&self) -> Instant {
        Instant::now()
    }
}
