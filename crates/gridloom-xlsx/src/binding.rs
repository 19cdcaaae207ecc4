use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::PartCatalog;
use crate::fingerprint::SourceFingerprint;
use crate::ledger::ModificationLedger;

/// Everything a surgical write needs to know about where a document came from.
///
/// Captured once by [`crate::open`] and carried alongside the in-memory
/// workbook. The binding never holds part bytes; the source archive is
/// re-read at write time after the fingerprint check passes.
#[derive(Debug, Clone)]
pub struct SourceBinding {
    pub source_path: PathBuf,
    pub catalog: PartCatalog,
    pub ledger: ModificationLedger,
    pub fingerprint: SourceFingerprint,
    /// Open-time sheet index -> comment part name.
    ///
    /// Comment parts are numbered sequentially across the workbook
    /// (`xl/comments1.xml`, `xl/comments2.xml`, ...) with no relation to sheet
    /// position, so the association is kept explicit here rather than derived.
    pub comment_part_by_sheet: BTreeMap<usize, String>,
}

impl SourceBinding {
    /// Replace the ledger, keeping everything else. The usual way callers
    /// thread ledger updates through, since both types are immutable values.
    #[must_use]
    pub fn with_ledger(&self, ledger: ModificationLedger) -> Self {
        Self {
            ledger,
            ..self.clone()
        }
    }

    /// Number of sheets the source package had at open time.
    pub fn source_sheet_count(&self) -> usize {
        self.catalog.sheet_count()
    }
}
