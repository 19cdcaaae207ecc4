use std::collections::{BTreeMap, BTreeSet};

/// Archive-level metadata for one ZIP entry, captured so the writer can copy
/// the entry faithfully and diagnostics can report sizes without re-reading
/// the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveEntryMeta {
    /// 0-based position in the source archive's entry order.
    pub index: usize,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub compression: zip::CompressionMethod,
}

/// One catalogued package part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartEntry {
    /// Canonical part name (no leading slash, `/` separators).
    pub path: String,
    /// Whether the engine can parse and regenerate this part. Opaque parts
    /// are only ever copied verbatim or omitted wholesale.
    pub understood: bool,
    /// Open-time index of the sheet this part belongs to, when sheet-scoped.
    pub owning_sheet: Option<usize>,
    /// Relationship ids this part depends on, for consistency checks during
    /// regeneration.
    pub cross_references: BTreeSet<String>,
    pub archive_meta: Option<ArchiveEntryMeta>,
}

impl PartEntry {
    fn placeholder(path: &str) -> Self {
        Self {
            path: path.to_string(),
            understood: false,
            owning_sheet: None,
            cross_references: BTreeSet::new(),
            archive_meta: None,
        }
    }
}

/// Complete inventory of the source package, keyed by canonical part name,
/// preserving the archive's entry order for iteration.
///
/// Built once at open time and immutable afterwards; the surgical writer
/// consults it to decide copy vs regenerate vs omit per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartCatalog {
    entries: BTreeMap<String, PartEntry>,
    order: Vec<String>,
}

impl PartCatalog {
    pub fn builder() -> PartCatalogBuilder {
        PartCatalogBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&PartEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterate entries in source archive order.
    pub fn iter_in_order(&self) -> impl Iterator<Item = &PartEntry> {
        self.order.iter().filter_map(|path| self.entries.get(path))
    }

    /// All parts owned by the sheet at open-time `index`, in archive order.
    pub fn parts_for_sheet(&self, index: usize) -> impl Iterator<Item = &PartEntry> {
        self.iter_in_order()
            .filter(move |entry| entry.owning_sheet == Some(index))
    }

    pub fn opaque_parts(&self) -> impl Iterator<Item = &PartEntry> {
        self.iter_in_order().filter(|entry| !entry.understood)
    }

    pub fn understood_count(&self) -> usize {
        self.entries.values().filter(|e| e.understood).count()
    }

    /// Number of sheets the source package had at open time, derived from the
    /// highest owning-sheet reference.
    pub fn sheet_count(&self) -> usize {
        self.entries
            .values()
            .filter_map(|e| e.owning_sheet)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}

/// Accumulates classifications during open. Upsert-with-merge: recording the
/// same path again merges rather than replaces, the latest understood flag and
/// owning sheet win, and cross-references accumulate.
#[derive(Debug, Default)]
pub struct PartCatalogBuilder {
    entries: BTreeMap<String, PartEntry>,
    order: Vec<String>,
}

impl PartCatalogBuilder {
    fn entry_mut(&mut self, path: &str) -> &mut PartEntry {
        if !self.entries.contains_key(path) {
            self.order.push(path.to_string());
            self.entries
                .insert(path.to_string(), PartEntry::placeholder(path));
        }
        self.entries.get_mut(path).expect("inserted above")
    }

    /// Record a raw archive entry. Every source entry passes through here so
    /// the catalog is a complete inventory even before classification.
    pub fn record_archive_entry(&mut self, path: &str, meta: ArchiveEntryMeta) -> &mut Self {
        self.entry_mut(path).archive_meta = Some(meta);
        self
    }

    pub fn classify_understood(
        &mut self,
        path: &str,
        owning_sheet: Option<usize>,
        cross_references: impl IntoIterator<Item = String>,
    ) -> &mut Self {
        let entry = self.entry_mut(path);
        entry.understood = true;
        if owning_sheet.is_some() {
            entry.owning_sheet = owning_sheet;
        }
        entry.cross_references.extend(cross_references);
        self
    }

    pub fn classify_opaque(&mut self, path: &str, owning_sheet: Option<usize>) -> &mut Self {
        let entry = self.entry_mut(path);
        entry.understood = false;
        if owning_sheet.is_some() {
            entry.owning_sheet = owning_sheet;
        }
        self
    }

    pub fn build(self) -> PartCatalog {
        PartCatalog {
            entries: self.entries,
            order: self.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(index: usize) -> ArchiveEntryMeta {
        ArchiveEntryMeta {
            index,
            compressed_size: 10,
            uncompressed_size: 20,
            crc32: 0,
            compression: zip::CompressionMethod::Deflated,
        }
    }

    #[test]
    fn iteration_preserves_archive_order() {
        let mut builder = PartCatalog::builder();
        builder.record_archive_entry("b.xml", meta(0));
        builder.record_archive_entry("a.xml", meta(1));
        builder.record_archive_entry("c.xml", meta(2));
        let catalog = builder.build();

        let order: Vec<&str> = catalog.iter_in_order().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["b.xml", "a.xml", "c.xml"]);
    }

    #[test]
    fn classification_merges_and_last_flag_wins() {
        let mut builder = PartCatalog::builder();
        builder.record_archive_entry("xl/worksheets/sheet1.xml", meta(0));
        builder.classify_opaque("xl/worksheets/sheet1.xml", Some(0));
        builder.classify_understood(
            "xl/worksheets/sheet1.xml",
            Some(0),
            vec!["rId5".to_string()],
        );
        builder.classify_understood(
            "xl/worksheets/sheet1.xml",
            None,
            vec!["rId7".to_string()],
        );
        let catalog = builder.build();

        let entry = catalog.get("xl/worksheets/sheet1.xml").unwrap();
        assert!(entry.understood);
        assert_eq!(entry.owning_sheet, Some(0));
        assert_eq!(
            entry.cross_references.iter().cloned().collect::<Vec<_>>(),
            vec!["rId5".to_string(), "rId7".to_string()]
        );
        assert!(entry.archive_meta.is_some());
    }

    #[test]
    fn classification_before_archive_entry_still_merges() {
        let mut builder = PartCatalog::builder();
        builder.classify_understood("xl/workbook.xml", None, Vec::new());
        builder.record_archive_entry("xl/workbook.xml", meta(3));
        let catalog = builder.build();

        let entry = catalog.get("xl/workbook.xml").unwrap();
        assert!(entry.understood);
        assert_eq!(entry.archive_meta.map(|m| m.index), Some(3));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn sheet_views_filter_by_owner() {
        let mut builder = PartCatalog::builder();
        builder.record_archive_entry("xl/worksheets/sheet1.xml", meta(0));
        builder.classify_understood("xl/worksheets/sheet1.xml", Some(0), Vec::new());
        builder.record_archive_entry("xl/worksheets/sheet2.xml", meta(1));
        builder.classify_understood("xl/worksheets/sheet2.xml", Some(1), Vec::new());
        builder.record_archive_entry("xl/comments1.xml", meta(2));
        builder.classify_opaque("xl/comments1.xml", Some(1));
        builder.record_archive_entry("xl/media/image1.png", meta(3));
        let catalog = builder.build();

        assert_eq!(catalog.sheet_count(), 2);
        assert_eq!(catalog.parts_for_sheet(0).count(), 1);
        let sheet1_parts: Vec<&str> = catalog
            .parts_for_sheet(1)
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(sheet1_parts, vec!["xl/worksheets/sheet2.xml", "xl/comments1.xml"]);
        assert_eq!(catalog.opaque_parts().count(), 2);
        assert_eq!(catalog.understood_count(), 2);
    }
}
