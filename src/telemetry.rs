//! Tracing subscriber setup
//!
//! `RUST_LOG` overrides the default filter when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,hco=debug,kube=info,tower=warn,hyper=warn";

/// Install the global subscriber, emitting JSON lines when `json` is set
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (plain, structured) = if json {
        (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            ),
        )
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(structured)
        .try_init()
}
