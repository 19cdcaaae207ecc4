//! Surgical round-trip engine for XLSX packages.
//!
//! Opening a package produces two things: an in-memory [`Workbook`] holding
//! the content the engine understands, and a [`SourceBinding`] that remembers
//! everything else — a [`PartCatalog`] of every archive entry, a
//! [`SourceFingerprint`] of the file on disk, and a [`ModificationLedger`]
//! of what diverged since open. Writing walks the source archive entry by
//! entry: parts the caller never touched are copied byte-for-byte (raw ZIP
//! copy, no recompression), parts that diverged are regenerated, and parts
//! owned by deleted sheets are omitted along with their dependents.
//!
//! ```no_run
//! use std::path::Path;
//! use gridloom_model::{CellRef, CellValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut workbook, binding) = gridloom_xlsx::open(Path::new("report.xlsx"))?;
//! if let Some(sheet) = workbook.sheet_mut(0) {
//!     sheet.set_value(CellRef::new(0, 0), CellValue::Number(42.0));
//! }
//! let binding = binding.with_ledger(binding.ledger.mark_sheet_modified(0));
//! gridloom_xlsx::write(&workbook, &binding, Path::new("report-out.xlsx"))?;
//! # Ok(())
//! # }
//! ```

mod binding;
mod catalog;
mod classify;
mod error;
mod fingerprint;
mod ledger;
mod openxml;
mod read;
mod regen;
mod write;
mod zip_util;

pub use binding::SourceBinding;
pub use catalog::{ArchiveEntryMeta, PartCatalog, PartCatalogBuilder, PartEntry};
pub use classify::{Classification, PartClassifier, TableClassifier};
pub use error::{WriteError, XlsxError};
pub use fingerprint::SourceFingerprint;
pub use ledger::ModificationLedger;
pub use openxml::{
    parse_content_types, parse_relationships, parse_workbook_sheets, rels_part_name,
    resolve_target, ContentTypes, Relationship, SheetRef,
};
pub use read::{open, open_with_classifier, open_with_limits};
pub use regen::{ModelRegenerator, PartIdentity, PartRegenerator, RegenContext, SheetPartPlan};
pub use write::{write, write_with, WriteOptions};
pub use zip_util::PackageLimits;

pub use gridloom_model::Workbook;
