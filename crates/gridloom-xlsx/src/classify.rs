use std::collections::{BTreeMap, BTreeSet};

/// How the open path decided to treat one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The engine can parse and regenerate this part.
    Understood {
        owning_sheet: Option<usize>,
        cross_references: BTreeSet<String>,
    },
    /// Preserved byte-for-byte; only ever copied verbatim or omitted wholesale
    /// when its owning sheet is deleted.
    Opaque { owning_sheet: Option<usize> },
}

/// Decides, per part path, whether a part is understood and which sheet owns it.
///
/// The default implementation is built from the package's own relationship
/// graph during open; a custom classifier can widen or narrow the understood
/// set (for example to force conservative verbatim preservation of a part the
/// engine would normally regenerate).
pub trait PartClassifier {
    fn classify(&self, path: &str) -> Classification;
}

/// Table-driven classifier: paths not in the table are opaque and unowned,
/// which is the safe default for anything the open path did not recognize.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier {
    table: BTreeMap<String, Classification>,
}

impl TableClassifier {
    pub fn insert(&mut self, path: String, classification: Classification) {
        self.table.insert(path, classification);
    }
}

impl PartClassifier for TableClassifier {
    fn classify(&self, path: &str) -> Classification {
        self.table
            .get(path)
            .cloned()
            .unwrap_or(Classification::Opaque { owning_sheet: None })
    }
}
