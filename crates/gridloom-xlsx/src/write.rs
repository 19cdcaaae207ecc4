use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use gridloom_model::Workbook;

use crate::binding::SourceBinding;
use crate::error::{WriteError, XlsxError};
use crate::fingerprint::SourceFingerprint;
use crate::openxml::{
    parse_relationships, parse_workbook_sheets, rels_part_name, resolve_target,
    REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_SHARED_STRINGS, REL_TYPE_STYLES,
};
use crate::regen::{ModelRegenerator, PartIdentity, PartRegenerator, RegenContext, SheetPartPlan};
use crate::zip_util::{
    canonical_part_name, read_zip_file_bytes_with_limit, read_zip_part_optional,
    read_zip_part_required, InflateBudget, PackageLimits,
};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const CORE_PROPS_PART: &str = "docProps/core.xml";

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub limits: PackageLimits,
    /// Test hook: compare the on-disk source against this fingerprint instead
    /// of the one captured at open time.
    pub expected_fingerprint: Option<SourceFingerprint>,
}

/// Write the document to `dest` using the default model-backed regenerator.
pub fn write(
    workbook: &Workbook,
    binding: &SourceBinding,
    dest: &Path,
) -> Result<(), WriteError> {
    write_with(workbook, binding, dest, &ModelRegenerator, WriteOptions::default())
}

/// Surgical write: verify the source is unchanged, then produce `dest` by
/// walking the source archive in entry order and, per entry, copying it raw,
/// regenerating it, or omitting it. The output lands via a temp file in the
/// destination directory so `dest` is never observable half-written.
pub fn write_with(
    workbook: &Workbook,
    binding: &SourceBinding,
    dest: &Path,
    regen: &dyn PartRegenerator,
    options: WriteOptions,
) -> Result<(), WriteError> {
    let expected = options.expected_fingerprint.unwrap_or(binding.fingerprint);
    let current = SourceFingerprint::from_path(&binding.source_path)?;
    if !current.matches(&expected) {
        return Err(WriteError::SourceChanged {
            path: binding.source_path.clone(),
        });
    }
    enforce_limits(&binding.catalog, &options.limits)?;

    let ledger = &binding.ledger;
    let source_sheets = binding.catalog.sheet_count();
    for &index in ledger.modified_sheets().iter().chain(ledger.deleted_sheets()) {
        if index >= source_sheets {
            return Err(WriteError::SheetOutOfRange {
                index,
                sheets: source_sheets,
            });
        }
    }
    for entry in binding.catalog.iter_in_order() {
        if entry.owning_sheet.is_some_and(|owner| owner >= source_sheets) {
            return Err(WriteError::CatalogDesync {
                path: entry.path.clone(),
                detail: format!(
                    "owning sheet {} out of range for {source_sheets} source sheets",
                    entry.owning_sheet.unwrap_or(0)
                ),
            });
        }
    }

    let survivors: Vec<usize> =
        (0..source_sheets).filter(|i| !ledger.deleted_sheets().contains(i)).collect();
    if workbook.sheet_count() < survivors.len() {
        return Err(WriteError::CatalogDesync {
            path: binding.source_path.display().to_string(),
            detail: format!(
                "workbook has {} sheets but {} source sheets survive deletion",
                workbook.sheet_count(),
                survivors.len()
            ),
        });
    }

    if ledger.is_clean() && workbook.sheet_count() == source_sheets {
        return clean_copy(binding, dest);
    }

    surgical_write(workbook, binding, dest, regen, options.limits, &survivors)
}

/// Check every catalogued entry's declared uncompressed size, and their sum,
/// against the configured limits. Verbatim copies never inflate an entry, so
/// this is the only point where oversized source parts are caught.
fn enforce_limits(catalog: &crate::catalog::PartCatalog, limits: &PackageLimits) -> Result<(), XlsxError> {
    let mut total = 0u64;
    for entry in catalog.iter_in_order() {
        let Some(meta) = &entry.archive_meta else {
            continue;
        };
        if meta.uncompressed_size > limits.max_part_bytes {
            return Err(XlsxError::PartTooLarge {
                part: entry.path.clone(),
                size: meta.uncompressed_size,
                max: limits.max_part_bytes,
            });
        }
        total = total.saturating_add(meta.uncompressed_size);
    }
    if total > limits.max_total_bytes {
        return Err(XlsxError::PackageTooLarge {
            total,
            max: limits.max_total_bytes,
        });
    }
    Ok(())
}

/// Nothing diverged: the output is a byte copy of the source.
fn clean_copy(binding: &SourceBinding, dest: &Path) -> Result<(), WriteError> {
    let mut tmp = NamedTempFile::new_in(dest_dir(dest))?;
    let mut source = File::open(&binding.source_path)?;
    io::copy(&mut source, &mut tmp)?;
    tmp.persist(dest).map_err(|err| WriteError::Io(err.error))?;
    log::debug!(
        "clean write: copied {} verbatim to {}",
        binding.source_path.display(),
        dest.display()
    );
    Ok(())
}

fn dest_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Per-entry role of understood parts, resolved from the source package's own
/// topology at write time.
enum Role {
    Worksheet(usize),
    SheetRels(usize),
    WorkbookDescriptor,
    WorkbookRels,
    ContentTypes,
    RootRels,
    SharedStrings,
    Styles,
    CoreProperties,
}

fn surgical_write(
    workbook: &Workbook,
    binding: &SourceBinding,
    dest: &Path,
    regen: &dyn PartRegenerator,
    limits: PackageLimits,
    survivors: &[usize],
) -> Result<(), WriteError> {
    let ledger = &binding.ledger;
    let file = File::open(&binding.source_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(XlsxError::from)?;
    let mut budget = InflateBudget::new(limits.max_total_bytes);

    // Re-derive topology from the source. The fingerprint check above
    // guarantees this is the same file the catalog was built from.
    let root_rels = match read_zip_part_optional(
        &mut archive,
        ROOT_RELS_PART,
        limits.max_part_bytes,
        &mut budget,
    )? {
        Some(bytes) => parse_relationships(&bytes)?,
        None => Vec::new(),
    };
    let workbook_part = root_rels
        .iter()
        .find(|rel| rel.type_uri == REL_TYPE_OFFICE_DOCUMENT && !rel.is_external())
        .map(|rel| resolve_target("", &rel.target))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let workbook_rels_part = rels_part_name(&workbook_part);

    let workbook_bytes = read_zip_part_required(
        &mut archive,
        &workbook_part,
        limits.max_part_bytes,
        &mut budget,
    )?;
    let workbook_rels_bytes = read_zip_part_required(
        &mut archive,
        &workbook_rels_part,
        limits.max_part_bytes,
        &mut budget,
    )?;
    let sheet_refs = parse_workbook_sheets(&workbook_bytes)?;
    let workbook_rels = parse_relationships(&workbook_rels_bytes)?;
    let rels_by_id: BTreeMap<&str, &crate::openxml::Relationship> =
        workbook_rels.iter().map(|rel| (rel.id.as_str(), rel)).collect();

    if sheet_refs.len() != binding.catalog.sheet_count() {
        return Err(WriteError::CatalogDesync {
            path: workbook_part,
            detail: format!(
                "source declares {} sheets but the catalog recorded {}",
                sheet_refs.len(),
                binding.catalog.sheet_count()
            ),
        });
    }

    let mut worksheet_parts = Vec::with_capacity(sheet_refs.len());
    for sheet in &sheet_refs {
        let rel = rels_by_id.get(sheet.rel_id.as_str()).ok_or_else(|| {
            WriteError::CatalogDesync {
                path: workbook_rels_part.clone(),
                detail: format!("sheet {:?} references missing relationship {}", sheet.name, sheet.rel_id),
            }
        })?;
        worksheet_parts.push(resolve_target(&workbook_part, &rel.target));
    }

    // Role table for understood parts.
    let mut roles: BTreeMap<String, Role> = BTreeMap::new();
    roles.insert(workbook_part.clone(), Role::WorkbookDescriptor);
    roles.insert(workbook_rels_part.clone(), Role::WorkbookRels);
    roles.insert(CONTENT_TYPES_PART.to_string(), Role::ContentTypes);
    roles.insert(ROOT_RELS_PART.to_string(), Role::RootRels);
    roles.insert(CORE_PROPS_PART.to_string(), Role::CoreProperties);
    for rel in &workbook_rels {
        if rel.is_external() {
            continue;
        }
        let target = resolve_target(&workbook_part, &rel.target);
        if rel.type_uri == REL_TYPE_SHARED_STRINGS {
            roles.insert(target, Role::SharedStrings);
        } else if rel.type_uri == REL_TYPE_STYLES {
            roles.insert(target, Role::Styles);
        }
    }
    for (open_idx, part) in worksheet_parts.iter().enumerate() {
        roles.insert(part.clone(), Role::Worksheet(open_idx));
        roles.insert(rels_part_name(part), Role::SheetRels(open_idx));
    }

    // Open-time index -> current-workbook index for surviving sheets. While
    // the order is intact the mapping is positional. After a reorder, open-time
    // positions no longer line up with model positions, so survivors are
    // matched to model sheets by name (unique within a workbook).
    let mut open_to_model: Vec<Option<usize>> = vec![None; sheet_refs.len()];
    if ledger.is_reordered() {
        let mut by_name: BTreeMap<&str, usize> = survivors
            .iter()
            .map(|&open_idx| (sheet_refs[open_idx].name.as_str(), open_idx))
            .collect();
        for (model_idx, name) in workbook.sheet_names().enumerate() {
            if let Some(open_idx) = by_name.remove(name) {
                open_to_model[open_idx] = Some(model_idx);
            }
        }
        if let Some((name, _)) = by_name.into_iter().next() {
            return Err(WriteError::CatalogDesync {
                path: workbook_part,
                detail: format!(
                    "sheet {name:?} survives deletion but no workbook sheet carries its name after reorder"
                ),
            });
        }
    } else {
        for (model_idx, &open_idx) in survivors.iter().enumerate() {
            open_to_model[open_idx] = Some(model_idx);
        }
    }
    let mut model_to_open: Vec<Option<usize>> = vec![None; workbook.sheet_count()];
    for (open_idx, slot) in open_to_model.iter().enumerate() {
        if let Some(model_idx) = slot {
            model_to_open[*model_idx] = Some(open_idx);
        }
    }

    // One placement plan per current-workbook sheet: survivors keep their
    // source part path, relationship id, and sheetId, so dependent parts
    // (sheet rels, comments, drawings) stay bound to their sheet through
    // reorders; sheets with no source counterpart are new and get fresh,
    // collision-free identities.
    let mut next_file_number = binding
        .catalog
        .iter_in_order()
        .filter_map(|entry| worksheet_file_number(&entry.path))
        .max()
        .unwrap_or(0);
    let mut next_rel_number = workbook_rels
        .iter()
        .filter_map(|rel| rel_id_number(&rel.id))
        .max()
        .unwrap_or(0);
    let mut next_sheet_id = sheet_refs
        .iter()
        .filter_map(|sheet| sheet.sheet_id)
        .max()
        .unwrap_or(sheet_refs.len() as u32);
    let mut plans: Vec<SheetPartPlan> = Vec::with_capacity(workbook.sheet_count());
    for slot in &model_to_open {
        match slot {
            Some(open_idx) => plans.push(SheetPartPlan {
                part_path: worksheet_parts[*open_idx].clone(),
                rel_id: sheet_refs[*open_idx].rel_id.clone(),
                sheet_id: sheet_refs[*open_idx].sheet_id.unwrap_or(*open_idx as u32 + 1),
                is_new: false,
            }),
            None => {
                let part_path = loop {
                    next_file_number += 1;
                    let candidate = format!("xl/worksheets/sheet{next_file_number}.xml");
                    if !binding.catalog.contains(&candidate) {
                        break candidate;
                    }
                };
                next_rel_number += 1;
                next_sheet_id += 1;
                plans.push(SheetPartPlan {
                    part_path,
                    rel_id: format!("rId{next_rel_number}"),
                    sheet_id: next_sheet_id,
                    is_new: true,
                });
            }
        }
    }

    // Parts that disappear with their deleted owning sheets.
    let mut removed_parts: BTreeSet<String> = BTreeSet::new();
    for &deleted in ledger.deleted_sheets() {
        for entry in binding.catalog.parts_for_sheet(deleted) {
            removed_parts.insert(entry.path.clone());
        }
    }

    // Comment parts are numbered sequentially across the workbook. When a
    // commented sheet is deleted, surviving comment parts are renumbered into
    // a dense sequence and the owning sheets' rels are rewritten to match.
    let renumber_comments = binding
        .comment_part_by_sheet
        .keys()
        .any(|idx| ledger.deleted_sheets().contains(idx));
    let mut renamed_parts: BTreeMap<String, String> = BTreeMap::new();
    let mut rels_rewrite_sheets: BTreeSet<usize> = BTreeSet::new();
    if renumber_comments {
        let mut next = 1u32;
        for &open_idx in survivors {
            if let Some(part) = binding.comment_part_by_sheet.get(&open_idx) {
                let new_name = format!("xl/comments{next}.xml");
                next += 1;
                if *part != new_name {
                    renamed_parts.insert(part.clone(), new_name);
                    rels_rewrite_sheets.insert(open_idx);
                }
            }
        }
    }

    let tmp = NamedTempFile::new_in(dest_dir(dest))?;
    let mut zip = ZipWriter::new(tmp);
    let zip_options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    let mut copied = 0usize;
    let mut regenerated = 0usize;
    let mut omitted = 0usize;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(XlsxError::from)?;
        if file.is_dir() {
            continue;
        }
        let name = canonical_part_name(file.name());
        let entry = binding.catalog.get(&name).ok_or_else(|| WriteError::CatalogDesync {
            path: name.clone(),
            detail: "entry was not catalogued at open time".to_string(),
        })?;

        if entry
            .owning_sheet
            .is_some_and(|owner| ledger.deleted_sheets().contains(&owner))
        {
            omitted += 1;
            continue;
        }

        if let Some(new_name) = renamed_parts.get(&name) {
            // Byte-preserving rename; compression carries over.
            zip.raw_copy_file_rename(file, new_name.as_str())
                .map_err(XlsxError::from)?;
            copied += 1;
            continue;
        }

        if !entry.understood {
            zip.raw_copy_file(file).map_err(XlsxError::from)?;
            copied += 1;
            continue;
        }

        let identity = match roles.get(&name) {
            Some(Role::Worksheet(open_idx)) => {
                let model_idx = open_to_model[*open_idx].ok_or_else(|| {
                    WriteError::CatalogDesync {
                        path: name.clone(),
                        detail: "worksheet survives but has no model index".to_string(),
                    }
                })?;
                if !ledger.modified_sheets().contains(open_idx) {
                    zip.raw_copy_file(file).map_err(XlsxError::from)?;
                    copied += 1;
                    continue;
                }
                PartIdentity::Worksheet { sheet: model_idx }
            }
            Some(Role::SheetRels(open_idx)) => {
                if !rels_rewrite_sheets.contains(open_idx) {
                    zip.raw_copy_file(file).map_err(XlsxError::from)?;
                    copied += 1;
                    continue;
                }
                let model_idx = open_to_model[*open_idx].ok_or_else(|| {
                    WriteError::CatalogDesync {
                        path: name.clone(),
                        detail: "sheet rels survive but have no model index".to_string(),
                    }
                })?;
                PartIdentity::SheetRels { sheet: model_idx }
            }
            Some(Role::WorkbookDescriptor) => PartIdentity::WorkbookDescriptor,
            Some(Role::WorkbookRels) => PartIdentity::WorkbookRels,
            Some(Role::ContentTypes) => PartIdentity::ContentTypes,
            Some(Role::RootRels) => PartIdentity::RootRels,
            Some(Role::SharedStrings) => PartIdentity::SharedStrings,
            Some(Role::Styles) => PartIdentity::Styles,
            Some(Role::CoreProperties) => PartIdentity::CoreProperties,
            None => {
                // Understood per the catalog but with no write-time role;
                // copy conservatively rather than guess.
                zip.raw_copy_file(file).map_err(XlsxError::from)?;
                copied += 1;
                continue;
            }
        };

        let original =
            read_zip_file_bytes_with_limit(&mut file, &name, limits.max_part_bytes, Some(&mut budget))?;
        let ctx = RegenContext {
            workbook,
            ledger,
            original: Some(&original),
            workbook_part: &workbook_part,
            sheet_plans: &plans,
            removed_parts: &removed_parts,
            renamed_parts: &renamed_parts,
        };
        let bytes = regen.regenerate(identity, &ctx)?;
        zip.start_file(name.as_str(), zip_options).map_err(XlsxError::from)?;
        io::Write::write_all(&mut zip, &bytes)?;
        regenerated += 1;
    }

    // Sheets added since open get fresh parts appended after the source entries.
    for (model_idx, plan) in plans.iter().enumerate() {
        if !plan.is_new {
            continue;
        }
        let ctx = RegenContext {
            workbook,
            ledger,
            original: None,
            workbook_part: &workbook_part,
            sheet_plans: &plans,
            removed_parts: &removed_parts,
            renamed_parts: &renamed_parts,
        };
        let bytes = regen.regenerate(PartIdentity::Worksheet { sheet: model_idx }, &ctx)?;
        zip.start_file(plan.part_path.as_str(), zip_options)
            .map_err(XlsxError::from)?;
        io::Write::write_all(&mut zip, &bytes)?;
        regenerated += 1;
    }

    let tmp = zip.finish().map_err(XlsxError::from)?;
    tmp.persist(dest).map_err(|err| WriteError::Io(err.error))?;
    log::debug!(
        "surgical write to {}: {copied} copied, {regenerated} regenerated, {omitted} omitted",
        dest.display()
    );
    Ok(())
}

fn worksheet_file_number(path: &str) -> Option<u32> {
    path.strip_prefix("xl/worksheets/sheet")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn rel_id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn worksheet_file_numbers_parse_only_canonical_paths() {
        assert_eq!(worksheet_file_number("xl/worksheets/sheet7.xml"), Some(7));
        assert_eq!(worksheet_file_number("xl/worksheets/sheet.xml"), None);
        assert_eq!(worksheet_file_number("xl/comments1.xml"), None);
    }

    #[test]
    fn rel_id_numbers_parse_numeric_suffix() {
        assert_eq!(rel_id_number("rId12"), Some(12));
        assert_eq!(rel_id_number("flowRel1"), None);
    }
}
