use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while reading or parsing an XLSX package.
#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error(
        "xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// Errors surfaced by the surgical writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The source package on disk no longer matches the fingerprint captured
    /// at open time. The caller should re-open and retry.
    #[error("source package changed since open: {path}")]
    SourceChanged { path: PathBuf },
    /// The part catalog and the in-memory workbook disagree about package
    /// structure (for example a catalogued part owned by a sheet index the
    /// workbook no longer has room for).
    #[error("part catalog out of sync with document at {path}: {detail}")]
    CatalogDesync { path: String, detail: String },
    #[error("sheet index {index} out of range for ledger (source had {sheets} sheets)")]
    SheetOutOfRange { index: usize, sheets: usize },
}
