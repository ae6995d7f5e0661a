// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Logging
//!
//! Console logging for the command-line programs. The level comes from
//! `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Installs the global tracing subscriber. Calling it twice is harmless.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized");
    }
}
