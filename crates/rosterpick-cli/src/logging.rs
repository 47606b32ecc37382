// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Routes `tracing` output to an append-only file. The terminal belongs to
/// the picker, so nothing is ever written to stderr while it runs.
pub fn init_logging(level: &str, path: &Path) -> Result<()> {
    let filter = log_filter(level, std::env::var("RUST_LOG").ok().as_deref())?;
    let file = open_log_file(path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

/// `RUST_LOG` wins when set; otherwise the configured level applies to
/// every target.
fn log_filter(level: &str, env_override: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = env_override.map(str::trim).filter(|raw| !raw.is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("invalid RUST_LOG {directives:?} -- fix or unset it and retry"));
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path and retry",
                path.display()
            )
        })
}
