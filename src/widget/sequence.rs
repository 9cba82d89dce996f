//! Ordering of overlapping search responses
//!
//! Searches may overlap: a slow response for an older query can complete
//! after a newer one. Every search takes a [`SearchTicket`] when it starts and
//! presents it when its response arrives; the [`ResponseOrdering`] policy
//! decides whether the response is still applied.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Apply every response as it completes; the last one to complete wins,
    /// even if it belongs to an older query.
    #[default]
    CompletionOrder,
    /// Drop responses issued before the most recently applied one.
    LatestIssued,
}

/// Issue number of one search
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchTicket(u64);

impl SearchTicket {
    #[must_use]
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct SearchSequencer {
    ordering: ResponseOrdering,
    issued: u64,
    last_applied: Option<SearchTicket>,
}

impl SearchSequencer {
    #[must_use]
    pub fn new(ordering: ResponseOrdering) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ordering(&self) -> ResponseOrdering {
        self.ordering
    }

    pub fn issue(&mut self) -> SearchTicket {
        self.issued += 1;
        SearchTicket(self.issued)
    }

    /// Whether the response for `ticket` should be shown. Records the
    /// ticket as applied when it is.
    pub fn accept(&mut self, ticket: SearchTicket) -> bool {
        let apply = match self.ordering {
            ResponseOrdering::CompletionOrder => true,
            ResponseOrdering::LatestIssued => self.last_applied.is_none_or(|last| ticket > last),
        };
        if apply {
            self.last_applied = Some(ticket);
        }
        apply
    }

    #[must_use]
    pub fn last_applied(&self) -> Option<SearchTicket> {
        self.last_applied
    }
}
