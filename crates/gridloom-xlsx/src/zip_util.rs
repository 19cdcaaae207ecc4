use std::io::{Read, Seek};

use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::XlsxError;

/// Default maximum uncompressed size permitted for any single ZIP part inflated into memory.
///
/// Guardrail against ZIP bombs (tiny compressed size, huge uncompressed size) and forged ZIP
/// metadata (an incorrect `uncompressed_size` field).
pub(crate) const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Default maximum total uncompressed bytes permitted across all parts inflated by one
/// open or write pass.
pub(crate) const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

/// Size limits enforced when inflating package parts into memory.
#[derive(Debug, Clone, Copy)]
pub struct PackageLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// Shared "total inflated bytes" budget consumed across multi-part reads.
#[derive(Debug, Clone)]
pub(crate) struct InflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl InflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    pub(crate) fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    pub(crate) fn consume(&mut self, bytes: u64) -> Result<(), XlsxError> {
        self.used_bytes = self.used_bytes.checked_add(bytes).unwrap_or(u64::MAX);
        if self.used_bytes > self.max_total_bytes {
            return Err(XlsxError::PackageTooLarge {
                total: self.used_bytes,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

/// Canonicalize a ZIP entry name into an OPC part name key.
///
/// Valid packages should not include a leading `/` or Windows-style `\` separators in
/// entry names, but some producers do. Catalog keys and all internal lookups use the
/// canonical form; the original entry name is preserved on raw copy.
pub(crate) fn canonical_part_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches('/').to_string()
}

/// Read a ZIP entry into memory with an uncompressed size limit and an optional
/// shared total budget.
///
/// This does **not** trust ZIP metadata alone. It:
/// - checks the declared uncompressed size (`ZipFile::size()`) as a fast path;
/// - reads via `Read::take(max + 1)` to guard against forged metadata;
/// - errors deterministically if more than `max_part_bytes` are observed.
pub(crate) fn read_zip_file_bytes_with_limit(
    file: &mut ZipFile<'_>,
    part: &str,
    max_part_bytes: u64,
    mut budget: Option<&mut InflateBudget>,
) -> Result<Vec<u8>, XlsxError> {
    let declared_size = file.size();
    let remaining_total = budget
        .as_ref()
        .map(|b| b.remaining_bytes())
        .unwrap_or(u64::MAX);
    let effective_max = max_part_bytes.min(remaining_total);

    // Fast path: reject based on the declared uncompressed size.
    if declared_size > effective_max {
        return Err(XlsxError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: effective_max,
        });
    }

    let mut buf = Vec::new();
    let read_limit = effective_max.checked_add(1).unwrap_or(u64::MAX);
    let mut reader = file.take(read_limit);
    reader.read_to_end(&mut buf)?;

    let observed = buf.len() as u64;
    if observed > effective_max {
        return Err(XlsxError::PartTooLarge {
            part: part.to_string(),
            size: observed,
            max: effective_max,
        });
    }

    if let Some(budget) = budget.as_mut() {
        budget.consume(observed)?;
    }

    Ok(buf)
}

/// Open a ZIP entry whose canonical part name matches `name`.
///
/// `ZipFile` borrows `ZipArchive`, so this inspects `archive.file_names()` first to decide
/// which entry index to open, then calls `archive.by_index()` exactly once. An exact entry
/// name match wins over a canonical-form match.
pub(crate) fn open_zip_part<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    name: &str,
) -> Result<ZipFile<'a>, ZipError> {
    let mut candidate = None::<usize>;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            candidate = Some(idx);
            break;
        }
        if candidate.is_none() && canonical_part_name(entry) == name {
            candidate = Some(idx);
        }
    }
    match candidate {
        Some(idx) => archive.by_index(idx),
        None => Err(ZipError::FileNotFound),
    }
}

/// Read a ZIP part by canonical name, returning `Ok(None)` when the entry does not exist.
pub(crate) fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_part_bytes: u64,
    budget: &mut InflateBudget,
) -> Result<Option<Vec<u8>>, XlsxError> {
    match open_zip_part(archive, name) {
        Ok(mut file) => {
            if file.is_dir() {
                return Ok(None);
            }
            let buf = read_zip_file_bytes_with_limit(&mut file, name, max_part_bytes, Some(budget))?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Read a ZIP part that must exist.
pub(crate) fn read_zip_part_required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_part_bytes: u64,
    budget: &mut InflateBudget,
) -> Result<Vec<u8>, XlsxError> {
    read_zip_part_optional(archive, name, max_part_bytes, budget)?
        .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
}
