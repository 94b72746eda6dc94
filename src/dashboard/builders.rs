use alloy::primitives::Address;
use std::collections::HashSet;

use crate::ethereum::CheckInEvent;

/// Append-only, duplicate-free list of builder addresses in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderList {
    builders: Vec<Address>,
    seen: HashSet<Address>,
}

impl BuilderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every builder in `batch` that is not yet listed, in batch order.
    ///
    /// Records without a builder are dropped. Returns how many entries were
    /// appended; when that is zero the list is untouched.
    pub fn merge(&mut self, batch: &[CheckInEvent]) -> usize {
        let before = self.builders.len();

        for builder in batch.iter().filter_map(|event| event.builder) {
            if self.seen.insert(builder) {
                self.builders.push(builder);
            }
        }

        self.builders.len() - before
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.builders
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

/// Runs the accumulator if its preconditions hold.
///
/// Nothing happens while events are loading, while the gate is closed, or when
/// there is no batch. Returns the number of builders appended.
pub fn accumulate(
    list: &mut BuilderList,
    batch: Option<&[CheckInEvent]>,
    gate_open: bool,
    events_loading: bool,
) -> usize {
    match batch {
        Some(batch) if gate_open && !events_loading && !batch.is_empty() => list.merge(batch),
        _ => 0,
    }
}
