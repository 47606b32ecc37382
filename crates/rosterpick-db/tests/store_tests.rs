// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use rosterpick_app::{Jid, ListItem, Presence};
use rosterpick_db::{NewContact, Store, is_memory_path, validate_db_path};
use rosterpick_testkit::{RosterFaker, temp_db_path};
use std::path::Path;

fn jid(raw: &str) -> Result<Jid> {
    Ok(Jid::parse(raw)?)
}

fn memory_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("/tmp/rosterpick.db").is_ok());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(is_memory_path(Path::new(":memory:")));
}

#[test]
fn bootstrap_is_idempotent() -> Result<()> {
    let store = memory_store()?;
    store.bootstrap()?;
    assert!(store.list_sources()?.is_empty());
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = memory_store()?;
    store.raw_connection().execute_batch(
        "
            DROP TABLE bookmarks;
            CREATE TABLE bookmarks (
              id INTEGER PRIMARY KEY,
              account_id INTEGER NOT NULL,
              jid TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `bookmarks` is missing required columns"));
    assert!(message.contains("name"));
    Ok(())
}

#[test]
fn list_sources_groups_items_by_account_in_address_order() -> Result<()> {
    let store = memory_store()?;
    let work = store.create_account(&jid("me@work.example")?)?;
    let home = store.create_account(&jid("me@home.example")?)?;

    let mut peer = NewContact::new(jid("peer@work.example")?);
    peer.server_name = Some("Peer".to_owned());
    peer.groups = vec!["Team".to_owned(), "Oncall".to_owned()];
    peer.presence = Presence::Away;
    store.upsert_contact(work, &peer)?;
    store.upsert_contact(home, &NewContact::new(jid("mom@home.example")?))?;
    store.add_bookmark(work, &jid("standup@conference.work.example")?, Some("Standup"))?;

    let sources = store.list_sources()?;
    let accounts: Vec<&str> = sources.iter().map(|source| source.account.as_str()).collect();
    assert_eq!(accounts, vec!["me@home.example", "me@work.example"]);

    let work_source = &sources[1];
    assert_eq!(work_source.account_id, work);
    assert!(work_source.enabled);
    assert_eq!(work_source.items.len(), 2);
    let ListItem::Contact(contact) = &work_source.items[0] else {
        panic!("contacts come before bookmarks");
    };
    assert_eq!(contact.display_name(), "Peer");
    assert_eq!(contact.groups, vec!["Team", "Oncall"]);
    assert_eq!(contact.presence, Presence::Away);
    assert_eq!(contact.account, jid("me@work.example")?);
    assert!(matches!(&work_source.items[1], ListItem::Bookmark(b) if b.display_name() == "Standup"));
    Ok(())
}

#[test]
fn upsert_contact_updates_existing_entry() -> Result<()> {
    let store = memory_store()?;
    let account = store.create_account(&jid("me@x")?)?;

    let mut contact = NewContact::new(jid("bob@x")?);
    let first = store.upsert_contact(account, &contact)?;
    contact.server_name = Some("Robert".to_owned());
    contact.in_roster = false;
    let second = store.upsert_contact(account, &contact)?;
    assert_eq!(first, second);

    let sources = store.list_sources()?;
    assert_eq!(sources[0].items.len(), 1);
    assert_eq!(sources[0].items[0].display_name(), "Robert");
    assert!(!sources[0].items[0].is_visible());
    Ok(())
}

#[test]
fn blocklist_marks_roster_contacts_as_blocked() -> Result<()> {
    let store = memory_store()?;
    let account = store.create_account(&jid("me@x")?)?;
    store.upsert_contact(account, &NewContact::new(jid("spam@x")?))?;
    store.upsert_contact(account, &NewContact::new(jid("friend@x")?))?;
    store.block(account, &jid("spam@x")?)?;
    store.block(account, &jid("spam@x")?)?;
    store.block(account, &jid("stranger@y")?)?;

    let source = store.list_sources()?.remove(0);
    assert_eq!(source.blocklist, vec![jid("spam@x")?, jid("stranger@y")?]);
    let blocked: Vec<&str> = source
        .items
        .iter()
        .filter(|item| item.is_blocked())
        .map(|item| item.identifier().as_str())
        .collect();
    assert_eq!(blocked, vec!["spam@x"]);

    assert!(store.unblock(account, &jid("spam@x")?)?);
    assert!(!store.unblock(account, &jid("spam@x")?)?);
    Ok(())
}

#[test]
fn account_flags_and_sync_time_are_persisted() -> Result<()> {
    let store = memory_store()?;
    let account = store.create_account(&jid("me@x")?)?;
    assert_eq!(store.account_id(&jid("me@x")?)?, Some(account));
    assert_eq!(store.account_id(&jid("other@x")?)?, None);

    store.set_account_enabled(account, false)?;
    store.mark_roster_synced(account)?;
    let source = store.list_sources()?.remove(0);
    assert!(!source.enabled);
    assert!(source.synced_at.is_some());
    Ok(())
}

#[test]
fn account_writes_reject_unknown_ids_and_full_addresses() -> Result<()> {
    let store = memory_store()?;
    let account = store.create_account(&jid("me@x")?)?;
    let missing = rosterpick_app::AccountId::new(account.get() + 100);

    let error = store
        .set_account_enabled(missing, true)
        .expect_err("unknown account");
    assert!(error.to_string().contains("not found"));
    assert!(store.mark_roster_synced(missing).is_err());

    let error = store
        .create_account(&jid("me@y/phone")?)
        .expect_err("accounts are bare");
    assert!(error.to_string().contains("bare address"));
    assert!(store.create_account(&jid("me@x")?).is_err());
    Ok(())
}

#[test]
fn data_version_tracks_commits_from_other_connections() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let writer = Store::open(&path)?;
    writer.bootstrap()?;
    let watcher = Store::open(&path)?;

    let before = watcher.data_version()?;
    assert_eq!(watcher.data_version()?, before);

    writer.create_account(&jid("me@x")?)?;
    assert_ne!(watcher.data_version()?, before);
    assert_eq!(watcher.list_sources()?.len(), 1);
    Ok(())
}

#[test]
fn faker_roster_round_trips_through_store() -> Result<()> {
    let store = memory_store()?;
    let mut faker = RosterFaker::new(11);
    let generated = faker.source(25);
    let account = store.create_account(&generated.account)?;
    for item in &generated.items {
        match item {
            ListItem::Contact(contact) => {
                store.upsert_contact(account, &NewContact::from(contact))?;
            }
            ListItem::Bookmark(bookmark) => {
                store.add_bookmark(account, &bookmark.jid, bookmark.name.as_deref())?;
            }
        }
    }

    let stored = store.list_sources()?.remove(0);
    assert_eq!(stored.items.len(), generated.items.len());
    for item in &generated.items {
        let found = stored
            .items
            .iter()
            .find(|candidate| candidate.identifier() == item.identifier())
            .expect("stored item");
        assert_eq!(found.display_name(), item.display_name());
        assert_eq!(found.tags(), item.tags());
    }
    Ok(())
}

#[test]
fn seed_demo_data_builds_three_accounts() -> Result<()> {
    let store = memory_store()?;
    store.seed_demo_data()?;

    let sources = store.list_sources()?;
    assert_eq!(sources.len(), 3);
    assert_eq!(sources.iter().filter(|source| !source.enabled).count(), 1);
    assert!(sources.iter().any(|source| !source.blocklist.is_empty()));
    assert!(
        sources
            .iter()
            .flat_map(|source| source.items.iter())
            .any(|item| matches!(item, ListItem::Bookmark(_)))
    );
    Ok(())
}
