// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rosterpick_app::{
    AccountId, Bookmark, BookmarkId, Contact, ContactId, Jid, ListItem, Presence, Source,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "rosterpick";

const GROUP_SEPARATOR: char = '\n';

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "accounts",
        &[
            "id",
            "jid",
            "enabled",
            "roster_synced_at",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "contacts",
        &[
            "id",
            "account_id",
            "jid",
            "system_name",
            "server_name",
            "presence_name",
            "presence",
            "groups",
            "in_roster",
            "created_at",
            "updated_at",
        ],
    ),
    ("blocklist", &["account_id", "jid"]),
    (
        "bookmarks",
        &["id", "account_id", "jid", "name", "created_at"],
    ),
];

/// Lookup indexes as (name, table, column). Created on every bootstrap.
const REQUIRED_INDEXES: &[(&str, &str, &str)] = &[
    ("idx_contacts_account_id", "contacts", "account_id"),
    ("idx_bookmarks_account_id", "bookmarks", "account_id"),
];

/// Roster entry as written by the sync side. Upserted by (account, address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub jid: Jid,
    pub system_name: Option<String>,
    pub server_name: Option<String>,
    pub presence_name: Option<String>,
    pub presence: Presence,
    pub groups: Vec<String>,
    pub in_roster: bool,
}

impl NewContact {
    pub fn new(jid: Jid) -> Self {
        Self {
            jid,
            system_name: None,
            server_name: None,
            presence_name: None,
            presence: Presence::Offline,
            groups: Vec::new(),
            in_roster: true,
        }
    }
}

impl From<&Contact> for NewContact {
    fn from(contact: &Contact) -> Self {
        Self {
            jid: contact.jid.clone(),
            system_name: contact.system_name.clone(),
            server_name: contact.server_name.clone(),
            presence_name: contact.presence_name.clone(),
            presence: contact.presence,
            groups: contact.groups.clone(),
            in_roster: contact.in_roster,
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            debug!("creating roster schema");
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Increments whenever another connection commits to the database.
    pub fn data_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
            .context("read data_version")
    }

    pub fn create_account(&self, jid: &Jid) -> Result<AccountId> {
        if !jid.is_bare() {
            bail!("account address {jid} has a resource -- use the bare address and retry");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO accounts (jid, enabled, created_at, updated_at)
                VALUES (?, 1, ?, ?)
                ",
                params![jid.as_str(), now, now],
            )
            .with_context(|| format!("insert account {jid}"))?;
        Ok(AccountId::new(self.conn.last_insert_rowid()))
    }

    pub fn account_id(&self, jid: &Jid) -> Result<Option<AccountId>> {
        self.conn
            .query_row(
                "SELECT id FROM accounts WHERE jid = ?",
                params![jid.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .with_context(|| format!("look up account {jid}"))
            .map(|id| id.map(AccountId::new))
    }

    pub fn set_account_enabled(&self, account_id: AccountId, enabled: bool) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE accounts SET enabled = ?, updated_at = ? WHERE id = ?",
                params![enabled, now, account_id.get()],
            )
            .context("update account enabled flag")?;
        if rows_affected == 0 {
            bail!("account {account_id} not found -- choose an existing account and retry");
        }
        Ok(())
    }

    pub fn mark_roster_synced(&self, account_id: AccountId) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE accounts SET roster_synced_at = ?, updated_at = ? WHERE id = ?",
                params![now, now, account_id.get()],
            )
            .context("mark roster synced")?;
        if rows_affected == 0 {
            bail!("account {account_id} not found -- choose an existing account and retry");
        }
        Ok(())
    }

    pub fn upsert_contact(&self, account_id: AccountId, contact: &NewContact) -> Result<ContactId> {
        let now = now_rfc3339()?;
        let groups = join_groups(&contact.groups)?;
        let id: i64 = self
            .conn
            .query_row(
                "
                INSERT INTO contacts (
                  account_id, jid, system_name, server_name, presence_name,
                  presence, groups, in_roster, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (account_id, jid) DO UPDATE SET
                  system_name = excluded.system_name,
                  server_name = excluded.server_name,
                  presence_name = excluded.presence_name,
                  presence = excluded.presence,
                  groups = excluded.groups,
                  in_roster = excluded.in_roster,
                  updated_at = excluded.updated_at
                RETURNING id
                ",
                params![
                    account_id.get(),
                    contact.jid.as_str(),
                    contact.system_name,
                    contact.server_name,
                    contact.presence_name,
                    contact.presence.as_str(),
                    groups,
                    contact.in_roster,
                    now,
                    now,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("upsert contact {}", contact.jid))?;
        Ok(ContactId::new(id))
    }

    pub fn block(&self, account_id: AccountId, jid: &Jid) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO blocklist (account_id, jid) VALUES (?, ?)",
                params![account_id.get(), jid.as_str()],
            )
            .with_context(|| format!("block {jid}"))?;
        Ok(())
    }

    /// Returns whether the address was on the blocklist.
    pub fn unblock(&self, account_id: AccountId, jid: &Jid) -> Result<bool> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM blocklist WHERE account_id = ? AND jid = ?",
                params![account_id.get(), jid.as_str()],
            )
            .with_context(|| format!("unblock {jid}"))?;
        Ok(rows_affected > 0)
    }

    pub fn add_bookmark(
        &self,
        account_id: AccountId,
        jid: &Jid,
        name: Option<&str>,
    ) -> Result<BookmarkId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO bookmarks (account_id, jid, name, created_at)
                VALUES (?, ?, ?, ?)
                ",
                params![account_id.get(), jid.as_str(), name, now],
            )
            .with_context(|| format!("insert bookmark {jid}"))?;
        Ok(BookmarkId::new(self.conn.last_insert_rowid()))
    }

    /// Every account with its roster, bookmarks and blocklist, ordered by
    /// account address.
    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, jid, enabled, roster_synced_at
                FROM accounts
                ORDER BY jid ASC, id ASC
                ",
            )
            .context("prepare accounts query")?;
        let rows = stmt
            .query_map([], |row| {
                let jid_raw: String = row.get(1)?;
                let synced_raw: Option<String> = row.get(3)?;
                let mut source = Source::new(parse_jid(&jid_raw)?);
                source.account_id = AccountId::new(row.get(0)?);
                source.enabled = row.get(2)?;
                source.synced_at = synced_raw
                    .as_deref()
                    .map(parse_datetime)
                    .transpose()
                    .map_err(to_sql_error)?;
                Ok(source)
            })
            .context("query accounts")?;
        let mut sources = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect accounts")?;

        for source in &mut sources {
            source.blocklist = self.list_blocklist(source.account_id)?;
            let blocked: BTreeSet<&Jid> = source.blocklist.iter().collect();
            let mut items: Vec<ListItem> = self
                .list_contacts(source.account_id, &source.account)?
                .into_iter()
                .map(|mut contact| {
                    contact.blocked = blocked.contains(&contact.jid);
                    ListItem::Contact(contact)
                })
                .collect();
            items.extend(
                self.list_bookmarks(source.account_id, &source.account)?
                    .into_iter()
                    .map(ListItem::Bookmark),
            );
            source.items = items;
        }
        Ok(sources)
    }

    fn list_contacts(&self, account_id: AccountId, account: &Jid) -> Result<Vec<Contact>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, jid, system_name, server_name, presence_name,
                  presence, groups, in_roster
                FROM contacts
                WHERE account_id = ?
                ORDER BY jid ASC
                ",
            )
            .context("prepare contacts query")?;
        let rows = stmt
            .query_map(params![account_id.get()], |row| {
                let jid_raw: String = row.get(1)?;
                let presence_raw: String = row.get(5)?;
                let groups_raw: String = row.get(6)?;
                let presence = Presence::parse(&presence_raw)
                    .ok_or_else(|| to_sql_error(format!("unknown presence {presence_raw:?}")))?;

                let mut contact = Contact::new(account.clone(), parse_jid(&jid_raw)?);
                contact.id = ContactId::new(row.get(0)?);
                contact.system_name = row.get(2)?;
                contact.server_name = row.get(3)?;
                contact.presence_name = row.get(4)?;
                contact.presence = presence;
                contact.groups = split_groups(&groups_raw);
                contact.in_roster = row.get(7)?;
                Ok(contact)
            })
            .context("query contacts")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect contacts")
    }

    fn list_bookmarks(&self, account_id: AccountId, account: &Jid) -> Result<Vec<Bookmark>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, jid, name
                FROM bookmarks
                WHERE account_id = ?
                ORDER BY jid ASC
                ",
            )
            .context("prepare bookmarks query")?;
        let rows = stmt
            .query_map(params![account_id.get()], |row| {
                let jid_raw: String = row.get(1)?;
                let mut bookmark = Bookmark::new(account.clone(), parse_jid(&jid_raw)?);
                bookmark.id = BookmarkId::new(row.get(0)?);
                bookmark.name = row.get(2)?;
                Ok(bookmark)
            })
            .context("query bookmarks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect bookmarks")
    }

    fn list_blocklist(&self, account_id: AccountId) -> Result<Vec<Jid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT jid FROM blocklist WHERE account_id = ? ORDER BY jid ASC")
            .context("prepare blocklist query")?;
        let rows = stmt
            .query_map(params![account_id.get()], |row| {
                let raw: String = row.get(0)?;
                parse_jid(&raw)
            })
            .context("query blocklist")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect blocklist")
    }

    pub fn seed_demo_data(&self) -> Result<()> {
        let personal = self.create_account(&demo_jid("me@jabber.example")?)?;
        let work = self.create_account(&demo_jid("me@corp.example")?)?;
        let legacy = self.create_account(&demo_jid("me@legacy.example")?)?;
        self.set_account_enabled(legacy, false)?;

        let roster: [(AccountId, &str, Option<&str>, Presence, &[&str]); 9] = [
            (personal, "alice@jabber.example", Some("Alice Liddell"), Presence::Online, &["Friends"]),
            (personal, "bob@jabber.example", Some("Bob"), Presence::Away, &["Friends"]),
            (personal, "carol@xmpp.example", None, Presence::Offline, &["Family"]),
            (personal, "dave@jabber.example", Some("dave"), Presence::Dnd, &[]),
            (personal, "spammer@bad.example", Some("Totally Legit"), Presence::Offline, &[]),
            (work, "boss@corp.example", Some("The Boss"), Presence::Online, &["Management"]),
            (work, "erin@corp.example", Some("Erin"), Presence::Xa, &["Team", "Oncall"]),
            (work, "frank@corp.example", Some("Frank"), Presence::Chat, &["Team"]),
            (legacy, "grace@legacy.example", Some("Grace"), Presence::Offline, &[]),
        ];
        for (account_id, jid, name, presence, groups) in roster {
            let mut contact = NewContact::new(demo_jid(jid)?);
            contact.server_name = name.map(str::to_owned);
            contact.presence = presence;
            contact.groups = groups.iter().map(|group| (*group).to_owned()).collect();
            self.upsert_contact(account_id, &contact)?;
        }

        let mut gone = NewContact::new(demo_jid("mallory@jabber.example")?);
        gone.server_name = Some("Mallory".to_owned());
        gone.in_roster = false;
        self.upsert_contact(personal, &gone)?;

        self.block(personal, &demo_jid("spammer@bad.example")?)?;
        self.block(personal, &demo_jid("troll@bad.example")?)?;
        self.block(work, &demo_jid("recruiter@agency.example")?)?;

        self.add_bookmark(personal, &demo_jid("book-club@muc.jabber.example")?, Some("Book Club"))?;
        self.add_bookmark(work, &demo_jid("standup@conference.corp.example")?, None)?;

        for account_id in [personal, work] {
            self.mark_roster_synced(account_id)?;
        }
        info!("seeded demo roster");
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ROSTERPICK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ROSTERPICK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("rosterpick.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

pub fn is_memory_path(path: &Path) -> bool {
    path.as_os_str() == ":memory:"
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    Ok(!schema_objects(conn, "table")?.is_empty())
}

/// Checks every required table and column at once so one error lists
/// everything a migration has to fix.
fn validate_schema(conn: &Connection) -> Result<()> {
    let tables = schema_objects(conn, "table")?;
    let mut problems = Vec::new();
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !tables.contains(*table) {
            problems.push(format!("missing table `{table}`"));
            continue;
        }
        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            problems.push(format!(
                "table `{table}` is missing required columns: {}",
                missing.join(", ")
            ));
        }
    }

    if !problems.is_empty() {
        bail!(
            "database is not a rosterpick roster store ({}); point [storage].db_path at a rosterpick database",
            problems.join("; ")
        );
    }
    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for (name, table, column) in REQUIRED_INDEXES {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {name} ON {table} ({column});"
        ))
        .with_context(|| format!("create index `{name}` on {table}"))?;
    }

    let indexes = schema_objects(conn, "index")?;
    if let Some((name, _, _)) = REQUIRED_INDEXES
        .iter()
        .find(|(name, _, _)| !indexes.contains(*name))
    {
        bail!("index `{name}` is still missing after bootstrap; check database permissions");
    }
    Ok(())
}

/// Names of user-defined schema objects of one `kind` (`table`, `index`).
fn schema_objects(conn: &Connection, kind: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT name FROM sqlite_schema WHERE type = ?1 AND name NOT LIKE 'sqlite_%'",
        )
        .context("prepare schema lookup")?;
    let names = stmt
        .query_map(params![kind], |row| row.get::<_, String>(0))
        .with_context(|| format!("list {kind} names"))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("read {kind} names"))?;
    Ok(names)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare_cached("SELECT name FROM pragma_table_info(?1)")
        .context("prepare column lookup")?;
    let columns = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))
        .with_context(|| format!("list columns of {table}"))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("read columns of {table}"))?;
    Ok(columns)
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn join_groups(groups: &[String]) -> Result<String> {
    if let Some(group) = groups.iter().find(|group| group.contains(GROUP_SEPARATOR)) {
        bail!("roster group {group:?} contains a line break; rename the group and retry");
    }
    Ok(groups
        .iter()
        .map(|group| group.trim())
        .filter(|group| !group.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn split_groups(raw: &str) -> Vec<String> {
    raw.split(GROUP_SEPARATOR)
        .filter(|group| !group.is_empty())
        .map(str::to_owned)
        .collect()
}

fn demo_jid(raw: &str) -> Result<Jid> {
    Jid::parse(raw).with_context(|| format!("parse demo address {raw}"))
}

fn parse_jid(raw: &str) -> rusqlite::Result<Jid> {
    Jid::parse(raw).map_err(|error| to_sql_error(format!("stored address {raw:?}: {error}")))
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
