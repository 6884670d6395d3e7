// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory buffering of encoded records, grouped by group key.
//!
//! # Grouping
//!
//! Every encoded record lands in the queue of its group (the record's
//! `partnerID`, or [`NO_TAG`](crate::constants::NO_TAG)). Within a group
//! records keep their insertion order; across groups there is no ordering.
//!
//! # Fill level
//!
//! The flush threshold is compared against [`GroupedBuffer::group_count`],
//! the number of groups holding data, not against the number of records.
//! A buffer size of 100 therefore means "100 distinct groups", and a single
//! busy group never triggers a size flush on its own; the periodic scheduler
//! is what ships it.
//!
//! # Locking
//!
//! The buffer is not synchronized itself. The client keeps it together with
//! the client-wide tag list behind a single `Mutex`, so appends, drains and
//! tag reads are linearizable with respect to each other.

use std::collections::HashMap;

use tracing::debug;

/// All data removed from the buffer by one [`GroupedBuffer::drain_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drain {
    /// Encoded records per group, in insertion order. Empty groups are absent.
    pub groups: HashMap<String, Vec<Vec<u8>>>,
}

impl Drain {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of records across all drained groups.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct GroupedBuffer {
    groups: HashMap<String, Vec<Vec<u8>>>,
    tags: Vec<String>,
    records: usize,
}

impl GroupedBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an encoded record to `group` and returns the number of records
    /// queued across all groups.
    pub fn append(&mut self, group: &str, line: Vec<u8>) -> usize {
        match self.groups.get_mut(group) {
            Some(queue) => queue.push(line),
            None => {
                self.groups.insert(group.to_string(), vec![line]);
            }
        }
        self.records += 1;
        debug!(
            "LOGGLY | buffered record in group {group} ({} records, {} groups)",
            self.records,
            self.groups.len()
        );
        self.records
    }

    /// Removes and returns every non-empty group. Tags are kept.
    pub fn drain_all(&mut self) -> Drain {
        let groups = std::mem::take(&mut self.groups);
        self.records = 0;
        Drain { groups }
    }

    /// Number of groups currently holding at least one record.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of records queued across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Records queued in one group.
    #[must_use]
    pub fn group_len(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, Vec::len)
    }

    /// Appends client-wide tags. Tags are never removed.
    pub fn tag<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
