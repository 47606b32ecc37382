// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use rosterpick_app::{Bookmark, Contact, Jid, ListItem, Presence, Source};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::datetime;

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

const DOMAINS: [&str; 6] = [
    "jabber.example",
    "xmpp.example",
    "chat.example",
    "corp.example",
    "home.example",
    "uni.example",
];

const GROUPS: [&str; 8] = [
    "Friends",
    "Family",
    "Work",
    "Team",
    "Climbing",
    "Book Club",
    "Neighbors",
    "Oncall",
];

const ROOM_NAMES: [&str; 6] = [
    "standup",
    "random",
    "release",
    "support",
    "lounge",
    "planning",
];

const PRESENCES: [Presence; 6] = [
    Presence::Offline,
    Presence::Online,
    Presence::Chat,
    Presence::Away,
    Presence::Xa,
    Presence::Dnd,
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Generates plausible rosters. Addresses carry a running counter so they
/// never collide within one faker.
#[derive(Debug, Clone)]
pub struct RosterFaker {
    rng: DeterministicRng,
    seed: u64,
    serial: u64,
}

impl RosterFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
            serial: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn account(&mut self) -> Jid {
        let domain = self.pick(&DOMAINS);
        let local = format!("me{}", self.next_serial());
        address(&format!("{local}@{domain}"))
    }

    pub fn contact(&mut self, account: &Jid) -> Contact {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&DOMAINS);
        let local = format!(
            "{}.{}{}",
            first.to_lowercase(),
            last.to_lowercase(),
            self.next_serial()
        );

        let mut contact = Contact::new(account.clone(), address(&format!("{local}@{domain}")));
        if self.rng.bool() {
            contact.server_name = Some(format!("{first} {last}"));
        } else if self.rng.bool() {
            contact.presence_name = Some(first.to_owned());
        }
        contact.presence = PRESENCES[self.rng.int_n(PRESENCES.len())];
        let group_count = self.rng.int_n(3);
        for _ in 0..group_count {
            let group = self.pick(&GROUPS).to_owned();
            if !contact.groups.contains(&group) {
                contact.groups.push(group);
            }
        }
        contact
    }

    pub fn bookmark(&mut self, account: &Jid) -> Bookmark {
        let room = self.pick(&ROOM_NAMES);
        let domain = self.pick(&DOMAINS);
        let jid = address(&format!("{room}{}@conference.{domain}", self.next_serial()));
        let mut bookmark = Bookmark::new(account.clone(), jid);
        if self.rng.bool() {
            let mut name = room.to_owned();
            if let Some(first) = name.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            bookmark.name = Some(name);
        }
        bookmark
    }

    /// One enabled account with `contacts` roster entries and a bookmark.
    pub fn source(&mut self, contacts: usize) -> Source {
        let account = self.account();
        let mut source = Source::new(account.clone());
        for _ in 0..contacts {
            let contact = self.contact(&account);
            source.items.push(ListItem::Contact(contact));
        }
        source.items.push(ListItem::Bookmark(self.bookmark(&account)));
        source.synced_at = Some(reference_synced_at());
        source
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }
}

/// A roster contact with a server-provided name, for hand-built fixtures.
pub fn named_contact(account: &str, name: &str, jid: &str) -> Result<ListItem> {
    let account = Jid::parse(account).with_context(|| format!("parse account {account}"))?;
    let jid = Jid::parse(jid).with_context(|| format!("parse contact {jid}"))?;
    Ok(ListItem::Contact(
        Contact::new(account, jid).with_server_name(name),
    ))
}

/// One account holding the given (name, address) contacts.
pub fn roster_source(account: &str, contacts: &[(&str, &str)]) -> Result<Source> {
    let account_jid = Jid::parse(account).with_context(|| format!("parse account {account}"))?;
    let mut source = Source::new(account_jid);
    for (name, jid) in contacts {
        source.items.push(named_contact(account, name, jid)?);
    }
    Ok(source)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("rosterpick.db");
    Ok((dir, db_path))
}

pub fn reference_synced_at() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

fn address(raw: &str) -> Jid {
    Jid::parse(raw).expect("generated address is valid")
}
