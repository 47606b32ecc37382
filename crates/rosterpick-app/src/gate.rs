// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

use crate::model::{ConnectionState, FilterRequest, SearchQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Run the request now against the current item set.
    Execute(FilterRequest),
    /// Stored until the backend is ready. `superseded` is the token of the
    /// request it replaced, which will never run.
    Buffered {
        token: u64,
        superseded: Option<u64>,
    },
}

/// Holds filter requests back until the data source is ready, then replays
/// only the most recent one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadinessGate {
    state: ConnectionState,
    pending: Option<FilterRequest>,
    latest: Option<FilterRequest>,
    next_token: u64,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn pending(&self) -> Option<&FilterRequest> {
        self.pending.as_ref()
    }

    /// The query the list currently reflects, or will reflect once replayed.
    pub fn latest_query(&self) -> Option<&SearchQuery> {
        self.pending
            .as_ref()
            .or(self.latest.as_ref())
            .map(|request| &request.query)
    }

    fn issue(&mut self, query: SearchQuery) -> FilterRequest {
        self.next_token += 1;
        FilterRequest {
            query,
            token: self.next_token,
        }
    }

    pub fn submit(&mut self, query: SearchQuery) -> GateOutcome {
        let request = self.issue(query);
        match self.state {
            ConnectionState::Ready => {
                self.latest = Some(request.clone());
                GateOutcome::Execute(request)
            }
            ConnectionState::NotReady => {
                let token = request.token;
                let superseded = self.pending.replace(request).map(|old| old.token);
                if let Some(old) = superseded {
                    debug!(token, superseded = old, "filter request replaced while backend not ready");
                }
                GateOutcome::Buffered { token, superseded }
            }
        }
    }

    /// Transitions to ready and returns the request to run first. A ready
    /// signal while already ready is a full reconnect cycle.
    pub fn backend_ready(&mut self) -> FilterRequest {
        if self.state == ConnectionState::Ready {
            debug!("backend ready while ready; treating as reconnect");
            self.backend_lost();
        }
        self.state = ConnectionState::Ready;
        let request = match self.pending.take() {
            Some(request) => request,
            None => self.issue(SearchQuery::empty()),
        };
        debug!(token = request.token, query = request.query.as_str(), "replaying filter request");
        self.latest = Some(request.clone());
        request
    }

    /// Back to not-ready. The current query stays stored so the next ready
    /// signal restores what the user was looking at.
    pub fn backend_lost(&mut self) {
        self.state = ConnectionState::NotReady;
        if self.pending.is_none()
            && let Some(latest) = self.latest.take()
        {
            let request = self.issue(latest.query);
            self.pending = Some(request);
        }
    }

    /// Re-run the current query against a freshly rebuilt item set. Ignored
    /// until ready, since the replay rebuilds anyway.
    pub fn backend_updated(&mut self) -> Option<FilterRequest> {
        if self.state != ConnectionState::Ready {
            return None;
        }
        let query = self
            .latest
            .as_ref()
            .map_or_else(SearchQuery::empty, |request| request.query.clone());
        let request = self.issue(query);
        self.latest = Some(request.clone());
        Some(request)
    }
}
