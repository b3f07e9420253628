//! Built-in logger.
//!
//! Uses the `env_logger` crate, enabled by the "builtin_env_logger" Cargo
//! feature (on by default). This gives callers a working logger out of the
//! box, configurable via the usual `RUST_LOG` environment variable, while
//! still letting embedders that already run their own `log` frontend
//! disable the feature and register their own.

/// Attempt to initialize the built-in `env_logger`. Does nothing if the
/// "builtin_env_logger" feature is disabled, and is a harmless no-op if a
/// logger is already registered.
pub(crate) fn try_init() {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            let result = env_logger::try_init_from_env(
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            );

            match result {
                Ok(()) => {
                    debug!("restime-planner initialized the logger.");
                }
                Err(e) => {
                    debug!("restime-planner failed to initialize the built-in env_logger: {e}");
                }
            }
        } else {
            debug!("restime-planner didn't initialize the built-in env_logger: the Cargo feature \"builtin_env_logger\" is not enabled.");
        }
    }
}
