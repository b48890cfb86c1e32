//! Initializes structured logging for the fleet manager binary and bridges
//! it to the standard `log` facade so that `log::info!` etc. used throughout
//! the crate end up going through `slog`.

use lazy_static::lazy_static;
use log::SetLoggerError;
use slog::{o, Drain, Logger};
use slog_scope::GlobalLoggerGuard;

lazy_static! {
    /// A static instance of a global logger guard. This cannot be dropped or
    /// else the slog scope resets the global logger. The lazy static ensures
    /// the logger only gets initialized once.
    static ref LOGGER_GUARD: Result<GlobalLoggerGuard, SetLoggerError> = init_global_logger();
}

fn build_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

fn init_global_logger() -> Result<GlobalLoggerGuard, SetLoggerError> {
    let logger = build_logger();
    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init()?;
    Ok(guard)
}

/// Initializes and sets the global logger, filtered by the `RUST_LOG`
/// environment variable the same way `env_logger` would be. Returns a
/// handle to the global logger.
pub fn init() -> Result<Logger, &'static SetLoggerError> {
    LOGGER_GUARD.as_ref()?;
    Ok(slog_scope::logger())
}
