// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;
use tracing::debug;

use crate::model::SearchQuery;

/// The text input behind the search affordance. Focus can only be taken
/// once the field has been laid out; before that a request does nothing.
pub trait SearchField {
    fn is_attached(&self) -> bool;
    fn request_focus(&mut self) -> bool;
    fn show_keyboard(&mut self);
    fn hide_keyboard(&mut self);
}

/// Plain field state for hosts that draw the input themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldState {
    attached: bool,
    focused: bool,
    keyboard_visible: bool,
}

impl FieldState {
    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn detach(&mut self) {
        *self = Self::default();
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_keyboard_visible(&self) -> bool {
        self.keyboard_visible
    }
}

impl SearchField for FieldState {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn request_focus(&mut self) -> bool {
        if self.attached {
            self.focused = true;
        }
        self.focused
    }

    fn show_keyboard(&mut self) {
        if self.focused {
            self.keyboard_visible = true;
        }
    }

    fn hide_keyboard(&mut self) {
        self.keyboard_visible = false;
    }
}

/// Work deferred to the following event-loop turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTick<T> {
    queue: VecDeque<T>,
}

impl<T> Default for NextTick<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T: PartialEq> NextTick<T> {
    pub fn post(&mut self, task: T) {
        if !self.queue.contains(&task) {
            self.queue.push_back(task);
        }
    }

    pub fn take(&mut self) -> Vec<T> {
        self.queue.drain(..).collect()
    }

    pub fn cancel(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTask {
    FocusAndShowKeyboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Expanded,
    Collapsed,
    QueryChanged(SearchQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchController<F> {
    field: F,
    expanded: bool,
    text: String,
    deferred: NextTick<FieldTask>,
}

impl<F: SearchField> SearchController<F> {
    pub fn new(field: F) -> Self {
        Self {
            field,
            expanded: false,
            text: String::new(),
            deferred: NextTick::default(),
        }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(&self.text)
    }

    pub fn has_deferred_work(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Focus and keyboard are posted for the next turn; the field is not
    /// attached yet while the expand is still in progress.
    pub fn expand(&mut self) -> Vec<SearchEvent> {
        if self.expanded {
            return Vec::new();
        }
        self.expanded = true;
        self.deferred.post(FieldTask::FocusAndShowKeyboard);
        vec![SearchEvent::Expanded, SearchEvent::QueryChanged(self.query())]
    }

    pub fn collapse(&mut self) -> Vec<SearchEvent> {
        if !self.expanded {
            return Vec::new();
        }
        self.expanded = false;
        self.deferred.cancel();
        self.field.hide_keyboard();
        self.text.clear();
        vec![
            SearchEvent::Collapsed,
            SearchEvent::QueryChanged(SearchQuery::empty()),
        ]
    }

    pub fn set_text(&mut self, text: &str) -> Vec<SearchEvent> {
        if !self.expanded {
            debug!("search text ignored while collapsed");
            return Vec::new();
        }
        if self.text == text {
            return Vec::new();
        }
        self.text = text.to_owned();
        vec![SearchEvent::QueryChanged(self.query())]
    }

    pub fn insert_char(&mut self, ch: char) -> Vec<SearchEvent> {
        let mut text = self.text.clone();
        text.push(ch);
        self.set_text(&text)
    }

    pub fn backspace(&mut self) -> Vec<SearchEvent> {
        let mut text = self.text.clone();
        text.pop();
        self.set_text(&text)
    }

    pub fn clear_text(&mut self) -> Vec<SearchEvent> {
        self.set_text("")
    }

    /// Runs the work posted during the previous turn. Returns how many
    /// tasks took effect.
    pub fn run_deferred(&mut self) -> usize {
        let mut applied = 0;
        for task in self.deferred.take() {
            match task {
                FieldTask::FocusAndShowKeyboard => {
                    if !self.expanded {
                        continue;
                    }
                    if self.field.request_focus() {
                        self.field.show_keyboard();
                        applied += 1;
                    } else {
                        debug!("search field not attached; focus request dropped");
                    }
                }
            }
        }
        applied
    }
}
