// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::error::PickerFault;
use crate::jid::Jid;
use crate::model::ListItem;
use crate::request::PickerRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub item_identifier: Jid,
    pub owner_account: Option<Jid>,
    pub originating_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiSelection {
    pub item_identifiers: Vec<Jid>,
    pub owner_account: Option<Jid>,
    pub originating_context: Option<String>,
}

/// What the invoking context contributes to every selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionContext {
    pub account: Option<Jid>,
    pub conversation: Option<String>,
}

impl SelectionContext {
    pub fn from_request(request: &PickerRequest) -> Self {
        Self {
            account: request.account.clone(),
            conversation: request.conversation.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Rendered { revision: u64 },
    Unchanged,
    Stale,
}

/// The sequence currently shown to the user. Positions are resolved against
/// this sequence at the moment of activation, never against an older one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListViewBinding {
    items: Vec<ListItem>,
    applied_token: u64,
    revision: u64,
    cursor: usize,
    checked: BTreeSet<Jid>,
    context: SelectionContext,
}

impl ListViewBinding {
    pub fn new(context: SelectionContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn applied_token(&self) -> u64 {
        self.applied_token
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn apply(&mut self, token: u64, items: Vec<ListItem>) -> ApplyOutcome {
        if token < self.applied_token {
            debug!(token, applied = self.applied_token, "stale filter result dropped");
            return ApplyOutcome::Stale;
        }
        self.applied_token = token;
        if self.items == items {
            return ApplyOutcome::Unchanged;
        }
        self.items = items;
        self.revision += 1;
        self.cursor = self.cursor.min(self.items.len().saturating_sub(1));
        ApplyOutcome::Rendered {
            revision: self.revision,
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let last = self.items.len().saturating_sub(1);
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    pub fn resolve(&self, position: usize) -> Result<&ListItem, PickerFault> {
        self.items
            .get(position)
            .ok_or(PickerFault::ResolutionFailure {
                position,
                len: self.items.len(),
            })
    }

    pub fn select(&self, position: usize) -> Result<Selection, PickerFault> {
        let item = self.resolve(position)?;
        Ok(Selection {
            item_identifier: item.identifier().clone(),
            owner_account: Some(
                self.context
                    .account
                    .clone()
                    .unwrap_or_else(|| item.owner_account().clone()),
            ),
            originating_context: self.context.conversation.clone(),
        })
    }

    /// Returns the address that was toggled and whether it is now checked.
    pub fn toggle_checked(&mut self, position: usize) -> Result<(Jid, bool), PickerFault> {
        let identifier = self.resolve(position)?.identifier().clone();
        let checked = if self.checked.remove(&identifier) {
            false
        } else {
            self.checked.insert(identifier.clone());
            true
        };
        Ok((identifier, checked))
    }

    pub fn is_checked(&self, item: &ListItem) -> bool {
        self.checked.contains(item.identifier())
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    pub fn submit_checked(&self) -> Option<MultiSelection> {
        if self.checked.is_empty() {
            return None;
        }
        Some(MultiSelection {
            item_identifiers: self.checked.iter().cloned().collect(),
            owner_account: self.context.account.clone(),
            originating_context: self.context.conversation.clone(),
        })
    }
}
