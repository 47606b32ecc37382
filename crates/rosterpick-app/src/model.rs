// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;
use crate::jid::Jid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerKind {
    ChooseContact,
    Blocklist,
    Shortcut,
}

impl PickerKind {
    pub const ALL: [Self; 3] = [Self::ChooseContact, Self::Blocklist, Self::Shortcut];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChooseContact => "contacts",
            Self::Blocklist => "blocklist",
            Self::Shortcut => "shortcut",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contacts" => Some(Self::ChooseContact),
            "blocklist" => Some(Self::Blocklist),
            "shortcut" => Some(Self::Shortcut),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ChooseContact => "choose contact",
            Self::Blocklist => "blocked contacts",
            Self::Shortcut => "create shortcut",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Presence {
    #[default]
    Offline,
    Online,
    Chat,
    Away,
    Xa,
    Dnd,
}

impl Presence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Chat => "chat",
            Self::Away => "away",
            Self::Xa => "xa",
            Self::Dnd => "dnd",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "offline" => Some(Self::Offline),
            "online" => Some(Self::Online),
            "chat" => Some(Self::Chat),
            "away" => Some(Self::Away),
            "xa" => Some(Self::Xa),
            "dnd" => Some(Self::Dnd),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Chat => "free for chat",
            Self::Away => "away",
            Self::Xa => "not available",
            Self::Dnd => "busy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub account: Jid,
    pub jid: Jid,
    pub system_name: Option<String>,
    pub server_name: Option<String>,
    pub presence_name: Option<String>,
    pub groups: Vec<String>,
    pub presence: Presence,
    pub in_roster: bool,
    pub blocked: bool,
}

impl Contact {
    pub fn new(account: Jid, jid: Jid) -> Self {
        Self {
            id: ContactId::UNSAVED,
            account,
            jid,
            system_name: None,
            server_name: None,
            presence_name: None,
            groups: Vec::new(),
            presence: Presence::Offline,
            in_roster: true,
            blocked: false,
        }
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        [&self.system_name, &self.server_name, &self.presence_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|name| !name.is_empty())
            .or_else(|| self.jid.local())
            .unwrap_or_else(|| self.jid.domain())
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags = self.groups.clone();
        if self.presence != Presence::Offline {
            tags.push(self.presence.label().to_owned());
        }
        if self.blocked {
            tags.push("blocked".to_owned());
        }
        tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub account: Jid,
    pub jid: Jid,
    pub name: Option<String>,
}

impl Bookmark {
    pub fn new(account: Jid, jid: Jid) -> Self {
        Self {
            id: BookmarkId::UNSAVED,
            account,
            jid,
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| self.jid.local())
            .unwrap_or_else(|| self.jid.domain())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListItem {
    Contact(Contact),
    Bookmark(Bookmark),
}

impl ListItem {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Contact(contact) => contact.display_name(),
            Self::Bookmark(bookmark) => bookmark.display_name(),
        }
    }

    pub fn identifier(&self) -> &Jid {
        match self {
            Self::Contact(contact) => &contact.jid,
            Self::Bookmark(bookmark) => &bookmark.jid,
        }
    }

    pub fn owner_account(&self) -> &Jid {
        match self {
            Self::Contact(contact) => &contact.account,
            Self::Bookmark(bookmark) => &bookmark.account,
        }
    }

    /// Whether the item may appear in a list at all. Contacts outside the
    /// roster (pending removals, strangers known only through the blocklist)
    /// are hidden from the regular pickers.
    pub fn is_visible(&self) -> bool {
        match self {
            Self::Contact(contact) => contact.in_roster,
            Self::Bookmark(_) => true,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Contact(contact) if contact.blocked)
    }

    pub fn tags(&self) -> Vec<String> {
        match self {
            Self::Contact(contact) => contact.tags(),
            Self::Bookmark(_) => Vec::new(),
        }
    }

    /// Every whitespace-separated term of the query must occur in the
    /// identifier, the display name, or one of the tags.
    pub fn matches(&self, query: &SearchQuery) -> bool {
        if query.is_empty() {
            return true;
        }
        let identifier = self.identifier().as_str().to_lowercase();
        let name = self.display_name().to_lowercase();
        let tags: Vec<String> = self.tags().iter().map(|tag| tag.to_lowercase()).collect();
        query.terms().all(|term| {
            identifier.contains(term)
                || name.contains(term)
                || tags.iter().any(|tag| tag.contains(term))
        })
    }
}

impl From<Contact> for ListItem {
    fn from(value: Contact) -> Self {
        Self::Contact(value)
    }
}

impl From<Bookmark> for ListItem {
    fn from(value: Bookmark) -> Self {
        Self::Bookmark(value)
    }
}

/// One account's partition of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub account_id: AccountId,
    pub account: Jid,
    pub enabled: bool,
    pub items: Vec<ListItem>,
    pub blocklist: Vec<Jid>,
    pub synced_at: Option<OffsetDateTime>,
}

impl Source {
    pub fn new(account: Jid) -> Self {
        Self {
            account_id: AccountId::UNSAVED,
            account,
            enabled: true,
            items: Vec::new(),
            blocklist: Vec::new(),
            synced_at: None,
        }
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn contact(&self, jid: &Jid) -> Option<&Contact> {
        self.items.iter().find_map(|item| match item {
            ListItem::Contact(contact) if contact.jid == *jid => Some(contact),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    NotReady,
    Ready,
}

/// Trimmed, case-folded search text. Empty means no filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub query: SearchQuery,
    pub token: u64,
}
