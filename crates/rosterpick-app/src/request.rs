// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::jid::Jid;
use crate::model::PickerKind;

/// The invoking context of a picker: which list to show and where the
/// result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerRequest {
    pub kind: PickerKind,
    pub title: Option<String>,
    pub account: Option<Jid>,
    pub conversation: Option<String>,
    pub excluded: Vec<Jid>,
    pub multiple: bool,
    pub start_searching: bool,
}

impl PickerRequest {
    pub fn new(kind: PickerKind) -> Self {
        Self {
            kind,
            title: None,
            account: None,
            conversation: None,
            excluded: Vec::new(),
            multiple: false,
            start_searching: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind == PickerKind::Blocklist && self.account.is_none() {
            bail!("blocklist picker needs an account -- pass --account <jid> and retry");
        }
        if self.kind == PickerKind::Shortcut && self.multiple {
            bail!(
                "{} picker is single-select -- drop --multiple and retry",
                self.kind.as_str()
            );
        }
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            bail!("picker title must not be blank");
        }
        if self.conversation.as_deref().is_some_and(|id| id.trim().is_empty()) {
            bail!("conversation id must not be blank");
        }
        Ok(())
    }

    pub fn title(&self) -> String {
        if let Some(title) = &self.title {
            return title.trim().to_owned();
        }
        match (self.kind, self.multiple) {
            (PickerKind::ChooseContact, true) => "choose contacts".to_owned(),
            (kind, _) => kind.label().to_owned(),
        }
    }
}
