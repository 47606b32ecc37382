// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::binding::{ApplyOutcome, ListViewBinding, MultiSelection, Selection, SelectionContext};
use crate::error::PickerFault;
use crate::filter::{Visibility, collect_items, filter_items};
use crate::gate::{GateOutcome, ReadinessGate};
use crate::jid::Jid;
use crate::model::{FilterRequest, ListItem, Source};
use crate::request::PickerRequest;
use crate::search::{SearchController, SearchEvent, SearchField};

/// Where list items come from. Called on the event loop each time the
/// backend reports ready or updated.
pub trait DataProvider {
    fn sources(&self) -> Result<Vec<Source>>;
}

impl DataProvider for Vec<Source> {
    fn sources(&self) -> Result<Vec<Source>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSignal {
    Ready,
    Updated,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerPhase {
    IdleNotReady,
    IdleReady,
    SearchingNotReady,
    SearchingReady,
}

impl PickerPhase {
    pub const fn is_searching(self) -> bool {
        matches!(self, Self::SearchingNotReady | Self::SearchingReady)
    }

    pub const fn is_ready(self) -> bool {
        matches!(self, Self::IdleReady | Self::SearchingReady)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IdleNotReady | Self::SearchingNotReady => "connecting",
            Self::IdleReady => "ready",
            Self::SearchingReady => "searching",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerCommand {
    Expand,
    Collapse,
    InsertChar(char),
    Backspace,
    SetText(String),
    ClearText,
    /// Editor action on the search field.
    Submit,
    MoveCursor(isize),
    Activate(usize),
    ActivateCursor,
    ToggleChecked(usize),
    ToggleCursor,
    SubmitChecked,
    /// Collapses an expanded search, otherwise cancels the picker.
    Back,
    Backend(BackendSignal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    SearchExpanded,
    SearchCollapsed,
    QueryBuffered {
        token: u64,
        superseded: Option<u64>,
    },
    ListRendered {
        token: u64,
        revision: u64,
        len: usize,
    },
    BackendReady,
    BackendLost,
    CheckedChanged {
        identifier: Jid,
        checked: bool,
    },
    Selected(Selection),
    SelectedMany(MultiSelection),
    Cancelled,
}

pub struct PickerController<P, F> {
    request: PickerRequest,
    visibility: Visibility,
    provider: Option<P>,
    items: Vec<ListItem>,
    search: SearchController<F>,
    gate: ReadinessGate,
    binding: ListViewBinding,
}

impl<P: DataProvider, F: SearchField> PickerController<P, F> {
    pub fn new(request: PickerRequest, field: F) -> Self {
        Self {
            visibility: Visibility::for_request(&request),
            binding: ListViewBinding::new(SelectionContext::from_request(&request)),
            request,
            provider: None,
            items: Vec::new(),
            search: SearchController::new(field),
            gate: ReadinessGate::new(),
        }
    }

    pub fn request(&self) -> &PickerRequest {
        &self.request
    }

    pub fn binding(&self) -> &ListViewBinding {
        &self.binding
    }

    pub fn search(&self) -> &SearchController<F> {
        &self.search
    }

    pub fn field_mut(&mut self) -> &mut F {
        self.search.field_mut()
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn provider_mut(&mut self) -> Option<&mut P> {
        self.provider.as_mut()
    }

    pub fn phase(&self) -> PickerPhase {
        match (self.search.is_expanded(), self.gate.is_ready()) {
            (false, false) => PickerPhase::IdleNotReady,
            (false, true) => PickerPhase::IdleReady,
            (true, false) => PickerPhase::SearchingNotReady,
            (true, true) => PickerPhase::SearchingReady,
        }
    }

    /// Binds the provider. Items are read from it only once the backend
    /// signals ready.
    pub fn attach(&mut self, provider: P) {
        self.provider = Some(provider);
    }

    pub fn detach(&mut self) -> Option<P> {
        self.gate.backend_lost();
        self.items.clear();
        self.provider.take()
    }

    /// Opens the picker. Expands the search right away when the invoking
    /// context asked for it.
    pub fn start(&mut self) -> Vec<PickerEvent> {
        if self.request.start_searching {
            return self.dispatch(PickerCommand::Expand);
        }
        Vec::new()
    }

    pub fn run_deferred(&mut self) -> usize {
        self.search.run_deferred()
    }

    pub fn dispatch(&mut self, command: PickerCommand) -> Vec<PickerEvent> {
        match command {
            PickerCommand::Expand => {
                let events = self.search.expand();
                self.search_events(events)
            }
            PickerCommand::Collapse => {
                let events = self.search.collapse();
                self.search_events(events)
            }
            PickerCommand::InsertChar(ch) => {
                let events = self.search.insert_char(ch);
                self.search_events(events)
            }
            PickerCommand::Backspace => {
                let events = self.search.backspace();
                self.search_events(events)
            }
            PickerCommand::SetText(text) => {
                let events = self.search.set_text(&text);
                self.search_events(events)
            }
            PickerCommand::ClearText => {
                let events = self.search.clear_text();
                self.search_events(events)
            }
            PickerCommand::Submit => self.submit(),
            PickerCommand::MoveCursor(delta) => {
                self.binding.move_cursor(delta);
                Vec::new()
            }
            PickerCommand::Activate(position) => self.activate(position),
            PickerCommand::ActivateCursor => self.activate(self.binding.cursor()),
            PickerCommand::ToggleChecked(position) => self.toggle(position),
            PickerCommand::ToggleCursor => self.toggle(self.binding.cursor()),
            PickerCommand::SubmitChecked => match self.binding.submit_checked() {
                Some(selection) => {
                    info!(count = selection.item_identifiers.len(), "picked items");
                    vec![PickerEvent::SelectedMany(selection)]
                }
                None => {
                    debug!("nothing checked; submit ignored");
                    Vec::new()
                }
            },
            PickerCommand::Back => {
                if self.search.is_expanded() {
                    return self.dispatch(PickerCommand::Collapse);
                }
                info!("picker cancelled");
                vec![PickerEvent::Cancelled]
            }
            PickerCommand::Backend(signal) => self.backend(signal),
        }
    }

    fn search_events(&mut self, events: Vec<SearchEvent>) -> Vec<PickerEvent> {
        let mut out = Vec::new();
        for event in events {
            match event {
                SearchEvent::Expanded => out.push(PickerEvent::SearchExpanded),
                SearchEvent::Collapsed => out.push(PickerEvent::SearchCollapsed),
                SearchEvent::QueryChanged(query) => match self.gate.submit(query) {
                    GateOutcome::Execute(request) => out.extend(self.run(request)),
                    GateOutcome::Buffered { token, superseded } => {
                        out.push(PickerEvent::QueryBuffered { token, superseded });
                    }
                },
            }
        }
        out
    }

    fn backend(&mut self, signal: BackendSignal) -> Vec<PickerEvent> {
        match signal {
            BackendSignal::Ready => {
                let request = self.gate.backend_ready();
                info!(query = request.query.as_str(), "backend ready");
                self.reload();
                let mut events = vec![PickerEvent::BackendReady];
                events.extend(self.run(request));
                events
            }
            BackendSignal::Updated => match self.gate.backend_updated() {
                Some(request) => {
                    self.reload();
                    self.run(request)
                }
                None => {
                    debug!("backend update ignored while not ready");
                    Vec::new()
                }
            },
            BackendSignal::Lost => {
                self.gate.backend_lost();
                info!("backend lost");
                vec![PickerEvent::BackendLost]
            }
        }
    }

    fn reload(&mut self) {
        self.items = match &self.provider {
            None => {
                debug!(fault = %PickerFault::MissingBackend, "rendering empty list");
                Vec::new()
            }
            Some(provider) => match provider.sources() {
                Ok(sources) => collect_items(&sources, &self.request),
                Err(error) => {
                    warn!("data provider failed, rendering empty list: {error:#}");
                    Vec::new()
                }
            },
        };
    }

    fn run(&mut self, request: FilterRequest) -> Vec<PickerEvent> {
        let visibility = &self.visibility;
        let filtered = filter_items(&self.items, &request.query, |item| {
            visibility.admits(item)
        });
        match self.binding.apply(request.token, filtered) {
            ApplyOutcome::Rendered { revision } => vec![PickerEvent::ListRendered {
                token: request.token,
                revision,
                len: self.binding.len(),
            }],
            ApplyOutcome::Unchanged | ApplyOutcome::Stale => Vec::new(),
        }
    }

    fn submit(&mut self) -> Vec<PickerEvent> {
        if self.request.multiple || self.binding.len() != 1 {
            debug!(len = self.binding.len(), "editor action without a single match");
            return Vec::new();
        }
        self.activate(0)
    }

    fn activate(&mut self, position: usize) -> Vec<PickerEvent> {
        if self.request.multiple {
            return self.toggle(position);
        }
        match self.binding.select(position) {
            Ok(selection) => {
                info!(item = %selection.item_identifier, "picked item");
                vec![PickerEvent::Selected(selection)]
            }
            Err(fault) => {
                debug!(%fault, "selection dropped");
                Vec::new()
            }
        }
    }

    fn toggle(&mut self, position: usize) -> Vec<PickerEvent> {
        if !self.request.multiple {
            debug!("toggle ignored in single-select picker");
            return Vec::new();
        }
        match self.binding.toggle_checked(position) {
            Ok((identifier, checked)) => vec![PickerEvent::CheckedChanged {
                identifier,
                checked,
            }],
            Err(fault) => {
                debug!(%fault, "toggle dropped");
                Vec::new()
            }
        }
    }
}
