use std::collections::BTreeSet;

/// Record of which parts of a document diverged from the source package since
/// open time. Sheet indices are the 0-based positions sheets had when the
/// package was opened, never their current positions.
///
/// This is an immutable value type: every `mark_*` returns a new ledger and
/// re-marking is a no-op, so callers can thread it through undo stacks or
/// snapshots without defensive copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationLedger {
    modified_sheets: BTreeSet<usize>,
    deleted_sheets: BTreeSet<usize>,
    reordered: bool,
    metadata_changed: bool,
}

impl ModificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing diverged: the writer may take the byte-copy fast path.
    pub fn is_clean(&self) -> bool {
        self.modified_sheets.is_empty()
            && self.deleted_sheets.is_empty()
            && !self.reordered
            && !self.metadata_changed
    }

    pub fn modified_sheets(&self) -> &BTreeSet<usize> {
        &self.modified_sheets
    }

    pub fn deleted_sheets(&self) -> &BTreeSet<usize> {
        &self.deleted_sheets
    }

    pub fn is_reordered(&self) -> bool {
        self.reordered
    }

    pub fn is_metadata_changed(&self) -> bool {
        self.metadata_changed
    }

    /// Mark the sheet at open-time `index` as content-modified.
    ///
    /// Deletion dominates: marking a sheet that is already deleted is a no-op,
    /// since its parts will be omitted from the output regardless.
    #[must_use]
    pub fn mark_sheet_modified(&self, index: usize) -> Self {
        if self.deleted_sheets.contains(&index) {
            return self.clone();
        }
        let mut next = self.clone();
        next.modified_sheets.insert(index);
        next
    }

    /// Mark the sheet at open-time `index` as deleted, clearing any earlier
    /// modified mark for the same index.
    #[must_use]
    pub fn mark_sheet_deleted(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.deleted_sheets.insert(index);
        next.modified_sheets.remove(&index);
        next
    }

    #[must_use]
    pub fn mark_reordered(&self) -> Self {
        let mut next = self.clone();
        next.reordered = true;
        next
    }

    #[must_use]
    pub fn mark_metadata_changed(&self) -> Self {
        let mut next = self.clone();
        next.metadata_changed = true;
        next
    }
}
