//! Diagnostic logging setup.
//!
//! Library code only emits `tracing` events; the binary decides where they
//! go by calling [`init`] once at startup.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "ichat=warn";

/// Filter used when `RUST_LOG` is unset: `ichat=warn`, raised to `debug`
/// by `--verbose`.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "ichat=debug"
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_directive`.
/// Events go to stderr, or are appended to `log_file` when one is given so
/// they do not interleave with streamed replies.
pub fn init(default_directive: &str, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(Arc::new(file)),
                )
                .try_init()?;
        }
        None => {
            registry
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}
