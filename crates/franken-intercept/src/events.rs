//! Structured dispatch events.
//!
//! Every instantiation and every dispatched operation appends one
//! [`DispatchEvent`].  Records are plain serde data so callers can ship them as
//! JSON lines.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::object_model::ObjectHandle;
use crate::operation::Operation;

pub const COMPONENT: &str = "intercept_dispatcher";

/// Which path produced a dispatch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchRoute {
    /// A derived-class member handled the operation.
    Handler,
    /// No member was bound; the default action ran.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub seq: u64,
    pub trace_id: String,
    pub component: String,
    /// `instantiate`, `dispatch`, or `default_invoked`.
    pub event: String,
    pub outcome: String,
    /// Stable error code, empty on success.
    pub error_code: String,
    pub instance: ObjectHandle,
    pub operation: Option<Operation>,
    pub route: Option<DispatchRoute>,
    /// Resolved handler name, when one was consulted.
    pub handler: Option<String>,
    pub detail: String,
}

/// Bounded event buffer; the oldest records go first.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<DispatchEvent>,
    capacity: usize,
    next_seq: u64,
    dropped: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            next_seq: 0,
            dropped: 0,
        }
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        seq
    }

    pub(crate) fn push(&mut self, event: DispatchEvent) {
        if self.capacity == 0 {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Records evicted (or refused) because of the capacity bound.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &DispatchEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&DispatchEvent> {
        self.events.back()
    }

    pub fn drain(&mut self) -> Vec<DispatchEvent> {
        self.events.drain(..).collect()
    }

    /// One JSON object per line.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}
