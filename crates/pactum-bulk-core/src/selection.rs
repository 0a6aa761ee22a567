//! Selection bookkeeping for batch actions.
//!
//! # Design
//! - Members keep insertion order so requests enumerate targets the way the user picked them.
//! - Orchestration only ever reads a snapshot; the owning context performs all mutation.

use std::collections::HashSet;

use indexmap::IndexSet;

use crate::error::{BulkError, BulkResult};

/// Ordered, duplicate-free set of selected resource identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    members: IndexSet<String>,
}

impl SelectionSet {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` when absent, remove it when present. Returns whether it is now selected.
    pub fn toggle(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.members.shift_remove(&id) {
            false
        } else {
            self.members.insert(id);
            true
        }
    }

    /// Replace the selection with every listed resource.
    pub fn select_all<I, S>(&mut self, universe: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.clear();
        self.members.extend(universe.into_iter().map(Into::into));
    }

    /// Deselect everything.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Number of selected resources.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// True when nothing is selected; batch actions are disabled in that case.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of the selection in insertion order.
    #[must_use]
    pub fn to_ordered_list(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    /// Iterate members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Drop members that are no longer part of the current listing.
    pub fn retain_listed<'a, I>(&mut self, universe: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let listed: HashSet<&str> = universe.into_iter().collect();
        self.members.retain(|id| listed.contains(id.as_str()));
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Owns the selection for one listing context and gates submissions on it.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selection: SelectionSet,
    in_flight: bool,
}

impl SelectionController {
    /// Create a controller with an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current selection.
    #[must_use]
    pub const fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Mutable access for toggle/select-all/deselect-all handlers.
    pub const fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    /// Whether a submission is currently running.
    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether batch actions should be offered.
    #[must_use]
    pub fn actions_enabled(&self) -> bool {
        !self.in_flight && !self.selection.is_empty()
    }

    /// Apply a fresh listing, purging members that are no longer listed.
    pub fn relist<'a, I>(&mut self, universe: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.selection.retain_listed(universe);
    }

    /// Mark a submission as started and return the snapshot it should use.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::SubmissionInFlight`] while another submission is
    /// running and [`BulkError::EmptySelection`] when nothing is selected.
    pub fn begin_submission(&mut self) -> BulkResult<SelectionSet> {
        if self.in_flight {
            return Err(BulkError::SubmissionInFlight);
        }
        if self.selection.is_empty() {
            return Err(BulkError::EmptySelection);
        }
        self.in_flight = true;
        Ok(self.selection.clone())
    }

    /// Release the in-flight flag without touching the selection.
    pub const fn release(&mut self) {
        self.in_flight = false;
    }

    /// Finish a submission; the selection is cleared whatever the outcome.
    pub fn finish_submission(&mut self) {
        self.in_flight = false;
        self.selection.clear();
    }
}
