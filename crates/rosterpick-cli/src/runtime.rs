// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use rosterpick_app::{BackendSignal, DataProvider, Source};
use rosterpick_db::{Store, is_memory_path};
use rosterpick_tui::{BackendConnector, InternalEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct StoreProvider {
    store: Store,
}

impl StoreProvider {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl DataProvider for StoreProvider {
    fn sources(&self) -> Result<Vec<Source>> {
        self.store.list_sources().context("load roster sources")
    }
}

/// Reports the database as the picker's backend. A file database is
/// watched on a second connection so commits from other writers surface as
/// updates; an in-memory one has no other writer and only becomes ready.
pub struct StoreConnector {
    db_path: PathBuf,
    connect_delay: Duration,
    poll_interval: Duration,
}

impl StoreConnector {
    pub fn new(db_path: PathBuf, connect_delay: Duration, poll_interval: Duration) -> Self {
        Self {
            db_path,
            connect_delay,
            poll_interval,
        }
    }
}

impl BackendConnector for StoreConnector {
    fn connect(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        let db_path = self.db_path.clone();
        let connect_delay = self.connect_delay;
        let poll_interval = self.poll_interval;
        thread::Builder::new()
            .name("rosterpick-backend".to_owned())
            .spawn(move || run_backend(&db_path, connect_delay, poll_interval, &tx))
            .context("spawn backend thread")?;
        Ok(())
    }
}

fn run_backend(
    db_path: &Path,
    connect_delay: Duration,
    poll_interval: Duration,
    tx: &Sender<InternalEvent>,
) {
    thread::sleep(connect_delay);
    if is_memory_path(db_path) {
        if tx
            .send(InternalEvent::Backend(BackendSignal::Ready))
            .is_err()
        {
            debug!("picker closed before the in-memory backend became ready");
        }
        return;
    }

    loop {
        match watch(db_path, poll_interval, tx) {
            Ok(()) => {
                debug!("picker closed; backend watcher stopping");
                return;
            }
            Err(error) => {
                warn!("backend watcher failed: {error:#}");
                if tx
                    .send(InternalEvent::Backend(BackendSignal::Lost))
                    .is_err()
                {
                    return;
                }
                thread::sleep(poll_interval);
            }
        }
    }
}

/// Returns `Ok` once the receiving side is gone and `Err` when the
/// database stops answering.
fn watch(db_path: &Path, poll_interval: Duration, tx: &Sender<InternalEvent>) -> Result<()> {
    let watcher = Store::open(db_path)
        .with_context(|| format!("open watcher connection to {}", db_path.display()))?;
    let mut version = watcher.data_version()?;
    if tx
        .send(InternalEvent::Backend(BackendSignal::Ready))
        .is_err()
    {
        return Ok(());
    }
    info!(path = %db_path.display(), "backend connected");

    loop {
        thread::sleep(poll_interval);
        let current = watcher.data_version()?;
        if current == version {
            continue;
        }
        version = current;
        debug!(version, "database changed by another writer");
        if tx
            .send(InternalEvent::Backend(BackendSignal::Updated))
            .is_err()
        {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConnector, StoreProvider, run_backend};
    use anyhow::Result;
    use rosterpick_app::{BackendSignal, DataProvider, Jid};
    use rosterpick_db::Store;
    use rosterpick_testkit::temp_db_path;
    use rosterpick_tui::{BackendConnector, InternalEvent};
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn store_provider_lists_seeded_sources() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.seed_demo_data()?;

        let provider = StoreProvider::new(store);
        assert_eq!(provider.sources()?.len(), 3);
        Ok(())
    }

    #[test]
    fn memory_database_only_becomes_ready() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut connector =
            StoreConnector::new(PathBuf::from(":memory:"), Duration::ZERO, Duration::ZERO);
        connector.connect(tx)?;

        assert_eq!(
            rx.recv_timeout(WAIT)?,
            InternalEvent::Backend(BackendSignal::Ready)
        );
        assert!(rx.recv_timeout(WAIT).is_err());
        Ok(())
    }

    #[test]
    fn memory_backend_returns_when_picker_already_closed() {
        let (tx, rx) = mpsc::channel::<InternalEvent>();
        drop(rx);
        run_backend(Path::new(":memory:"), Duration::ZERO, Duration::ZERO, &tx);
        assert!(tx.send(InternalEvent::Backend(BackendSignal::Ready)).is_err());
    }

    #[test]
    fn commits_from_other_connections_report_updates() -> Result<()> {
        let (_dir, path) = temp_db_path()?;
        let writer = Store::open(&path)?;
        writer.bootstrap()?;

        let (tx, rx) = mpsc::channel();
        let mut connector =
            StoreConnector::new(path.clone(), Duration::ZERO, Duration::from_millis(10));
        connector.connect(tx)?;
        assert_eq!(
            rx.recv_timeout(WAIT)?,
            InternalEvent::Backend(BackendSignal::Ready)
        );

        writer.create_account(&Jid::parse("me@x")?)?;
        assert_eq!(
            rx.recv_timeout(WAIT)?,
            InternalEvent::Backend(BackendSignal::Updated)
        );
        Ok(())
    }
}
