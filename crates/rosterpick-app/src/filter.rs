// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::jid::Jid;
use crate::model::{Contact, ListItem, PickerKind, SearchQuery, Source};
use crate::request::PickerRequest;

/// Keeps the items that are visible and match the query, in the stable
/// (display name, identifier) order. Nothing is cached between calls.
pub fn filter_items<'a, I, P>(items: I, query: &SearchQuery, visible: P) -> Vec<ListItem>
where
    I: IntoIterator<Item = &'a ListItem>,
    P: Fn(&ListItem) -> bool,
{
    let mut kept: Vec<ListItem> = items
        .into_iter()
        .filter(|&item| visible(item) && item.matches(query))
        .cloned()
        .collect();
    kept.sort_by_cached_key(sort_key);
    kept
}

pub fn compare_items(left: &ListItem, right: &ListItem) -> Ordering {
    sort_key(left).cmp(&sort_key(right))
}

fn sort_key(item: &ListItem) -> (String, String, String, String) {
    let identifier = item.identifier().as_str();
    (
        item.display_name().to_lowercase(),
        identifier.to_lowercase(),
        identifier.to_owned(),
        item.owner_account().as_str().to_owned(),
    )
}

/// Rebuilds the full item set a picker draws from. The set is recomputed
/// wholesale from the sources on every refresh.
pub fn collect_items(sources: &[Source], request: &PickerRequest) -> Vec<ListItem> {
    match request.kind {
        PickerKind::ChooseContact => sources
            .iter()
            .filter(|source| source.enabled)
            .flat_map(|source| source.items().iter().cloned())
            .collect(),
        PickerKind::Shortcut => sources
            .iter()
            .filter(|source| source.enabled)
            .flat_map(|source| source.items().iter())
            .filter(|item| matches!(item, ListItem::Contact(_)))
            .cloned()
            .collect(),
        PickerKind::Blocklist => {
            let Some(account) = request.account.as_ref() else {
                return Vec::new();
            };
            sources
                .iter()
                .filter(|source| source.account == *account)
                .flat_map(blocked_contacts)
                .collect()
        }
    }
}

fn blocked_contacts(source: &Source) -> Vec<ListItem> {
    source
        .blocklist
        .iter()
        .map(|jid| {
            let mut contact = source.contact(jid).cloned().unwrap_or_else(|| {
                let mut stranger = Contact::new(source.account.clone(), jid.clone());
                stranger.in_roster = false;
                stranger
            });
            contact.blocked = true;
            ListItem::Contact(contact)
        })
        .collect()
}

/// The eligibility rule of one picker, applied on top of the query match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    kind: PickerKind,
    excluded: Vec<Jid>,
}

impl Visibility {
    pub fn for_request(request: &PickerRequest) -> Self {
        let mut excluded: Vec<Jid> = request.excluded.iter().map(Jid::bare).collect();
        excluded.sort();
        excluded.dedup();
        Self {
            kind: request.kind,
            excluded,
        }
    }

    pub fn admits(&self, item: &ListItem) -> bool {
        match self.kind {
            PickerKind::ChooseContact => {
                item.is_visible()
                    && self
                        .excluded
                        .binary_search(&item.identifier().bare())
                        .is_err()
            }
            PickerKind::Shortcut => item.is_visible(),
            PickerKind::Blocklist => item.is_blocked(),
        }
    }
}
