use std::io::IsTerminal;

use anyhow::anyhow;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Env var consulted before the verbosity counters.
pub const LOG_ENV_VAR: &str = "RUST_LOG";

/// Maps `-v`/`-q` style counters to a filter directive. Quiet wins.
pub fn default_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 3..) => "trace",
        (0, 2) => "debug",
        (0, 1) => "info",
        (0, 0) => "warn",
    }
}

/// Installs the global fmt subscriber on stderr. `RUST_LOG` overrides the
/// counters. Calling it again keeps the first subscriber.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = default_level(verbose, quiet);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid {LOG_ENV_VAR} / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already installed");
    }

    debug!(level, "calgrid tracing ready");
    Ok(())
}
