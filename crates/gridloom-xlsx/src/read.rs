use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use gridloom_model::{CellRef, CellValue, Workbook, WorkbookProperties, Worksheet};

use crate::binding::SourceBinding;
use crate::catalog::{ArchiveEntryMeta, PartCatalog};
use crate::classify::{Classification, PartClassifier, TableClassifier};
use crate::error::XlsxError;
use crate::fingerprint::SourceFingerprint;
use crate::ledger::ModificationLedger;
use crate::openxml::{
    local_name, parse_content_types, parse_relationships, rels_part_name, resolve_target,
    ContentTypes, Relationship, REL_TYPE_COMMENTS, REL_TYPE_CORE_PROPS, REL_TYPE_OFFICE_DOCUMENT,
    REL_TYPE_SHARED_STRINGS, REL_TYPE_STYLES, REL_TYPE_WORKSHEET,
};
use crate::zip_util::{
    canonical_part_name, read_zip_part_optional, read_zip_part_required, InflateBudget,
    PackageLimits,
};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";
const APP_PROPS_PART: &str = "docProps/app.xml";

/// Open an XLSX package: parse what the engine understands into a
/// [`Workbook`], and catalogue every archive entry into a [`SourceBinding`]
/// so a later surgical write can preserve the rest byte-for-byte.
pub fn open(path: &Path) -> Result<(Workbook, SourceBinding), XlsxError> {
    open_with_limits(path, PackageLimits::default())
}

pub fn open_with_limits(
    path: &Path,
    limits: PackageLimits,
) -> Result<(Workbook, SourceBinding), XlsxError> {
    open_with_classifier(path, limits, &TableClassifier::default())
}

/// Open with a fallback classifier consulted for parts the engine itself does
/// not recognize (anything the built-in pass would leave opaque and unowned).
/// This lets callers claim sheet ownership for part families the engine does
/// not parse, so those parts are dropped with their sheet instead of orphaned.
pub fn open_with_classifier(
    path: &Path,
    limits: PackageLimits,
    fallback: &dyn PartClassifier,
) -> Result<(Workbook, SourceBinding), XlsxError> {
    let fingerprint = SourceFingerprint::from_path(path)?;
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut budget = InflateBudget::new(limits.max_total_bytes);

    // Inventory pass over the central directory. No entry data is inflated here.
    let mut builder = PartCatalog::builder();
    let mut paths = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.is_dir() {
            continue;
        }
        let canonical = canonical_part_name(entry.name());
        builder.record_archive_entry(
            &canonical,
            ArchiveEntryMeta {
                index: i,
                compressed_size: entry.compressed_size(),
                uncompressed_size: entry.size(),
                crc32: entry.crc32(),
                compression: entry.compression(),
            },
        );
        paths.push(canonical);
    }

    // Package topology: root rels point at the workbook descriptor, whose own
    // rels locate the worksheet parts and the workbook-global parts.
    let root_rels_bytes =
        read_zip_part_optional(&mut archive, ROOT_RELS_PART, limits.max_part_bytes, &mut budget)?;
    let root_rels = match &root_rels_bytes {
        Some(bytes) => parse_relationships(bytes)?,
        None => Vec::new(),
    };

    let content_types = match read_zip_part_optional(
        &mut archive,
        CONTENT_TYPES_PART,
        limits.max_part_bytes,
        &mut budget,
    )? {
        Some(bytes) => parse_content_types(&bytes)?,
        None => ContentTypes::default(),
    };

    let workbook_part = find_internal_target(&root_rels, "", REL_TYPE_OFFICE_DOCUMENT)
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let core_props_part = find_internal_target(&root_rels, "", REL_TYPE_CORE_PROPS);

    let workbook_bytes = read_zip_part_required(
        &mut archive,
        &workbook_part,
        limits.max_part_bytes,
        &mut budget,
    )?;
    let workbook_rels_part = rels_part_name(&workbook_part);
    let workbook_rels_bytes = read_zip_part_required(
        &mut archive,
        &workbook_rels_part,
        limits.max_part_bytes,
        &mut budget,
    )?;
    let workbook_rels = parse_relationships(&workbook_rels_bytes)?;

    let sheet_refs = crate::openxml::parse_workbook_sheets(&workbook_bytes)?;
    if sheet_refs.is_empty() {
        return Err(XlsxError::Invalid(format!(
            "{workbook_part} declares no sheets"
        )));
    }

    let rels_by_id: BTreeMap<&str, &Relationship> = workbook_rels
        .iter()
        .map(|rel| (rel.id.as_str(), rel))
        .collect();

    let mut worksheet_parts = Vec::with_capacity(sheet_refs.len());
    for sheet in &sheet_refs {
        let rel = rels_by_id.get(sheet.rel_id.as_str()).ok_or_else(|| {
            XlsxError::Invalid(format!(
                "sheet {:?} references missing relationship {}",
                sheet.name, sheet.rel_id
            ))
        })?;
        if rel.type_uri != REL_TYPE_WORKSHEET || rel.is_external() {
            return Err(XlsxError::Invalid(format!(
                "sheet {:?} relationship {} is not an internal worksheet",
                sheet.name, sheet.rel_id
            )));
        }
        worksheet_parts.push(resolve_target(&workbook_part, &rel.target));
    }

    for part in &worksheet_parts {
        if declared_content_type(&content_types, part).is_none() {
            log::warn!("{part}: no content type declared in {CONTENT_TYPES_PART}");
        }
    }

    let shared_strings_part = find_internal_target(&workbook_rels, &workbook_part, REL_TYPE_SHARED_STRINGS);
    let styles_part = find_internal_target(&workbook_rels, &workbook_part, REL_TYPE_STYLES);

    let shared_strings = match &shared_strings_part {
        Some(part) => {
            match read_zip_part_optional(&mut archive, part, limits.max_part_bytes, &mut budget)? {
                Some(bytes) => parse_shared_strings(&bytes)?,
                None => Vec::new(),
            }
        }
        None => Vec::new(),
    };

    // Classification table, keyed by canonical part name. Worksheet parts and
    // their rels are understood and sheet-scoped; everything a sheet's rels
    // reach that the engine cannot parse is opaque but owned, so deleting the
    // sheet drops it too. A part reached from two sheets stays unowned.
    let mut table = TableClassifier::default();
    let workbook_cross_refs: BTreeSet<String> =
        sheet_refs.iter().map(|s| s.rel_id.clone()).collect();
    table.insert(
        workbook_part.clone(),
        Classification::Understood {
            owning_sheet: None,
            cross_references: workbook_cross_refs,
        },
    );
    for global in [
        Some(workbook_rels_part.clone()),
        Some(CONTENT_TYPES_PART.to_string()),
        Some(ROOT_RELS_PART.to_string()),
        shared_strings_part.clone(),
        styles_part.clone(),
        core_props_part.clone(),
    ]
    .into_iter()
    .flatten()
    {
        table.insert(
            global,
            Classification::Understood {
                owning_sheet: None,
                cross_references: BTreeSet::new(),
            },
        );
    }

    let global_parts: BTreeSet<String> = [
        Some(workbook_part.clone()),
        Some(workbook_rels_part.clone()),
        Some(CONTENT_TYPES_PART.to_string()),
        Some(ROOT_RELS_PART.to_string()),
        shared_strings_part.clone(),
        styles_part.clone(),
        core_props_part.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();
    let path_set: BTreeSet<String> = paths.iter().cloned().collect();

    let mut comment_part_by_sheet = BTreeMap::new();
    let mut claimed_targets: BTreeMap<String, Option<usize>> = BTreeMap::new();
    let mut sheets = Vec::with_capacity(sheet_refs.len());

    for (index, (sheet_ref, worksheet_part)) in
        sheet_refs.iter().zip(&worksheet_parts).enumerate()
    {
        let worksheet_bytes = read_zip_part_required(
            &mut archive,
            worksheet_part,
            limits.max_part_bytes,
            &mut budget,
        )?;
        let cells = parse_worksheet_cells(&worksheet_bytes, &shared_strings, worksheet_part)?;
        let mut worksheet = Worksheet::new(sheet_ref.name.clone());
        for (cell, value) in cells {
            worksheet.set_value(cell, value);
        }
        sheets.push(worksheet);

        let sheet_rels_part = rels_part_name(worksheet_part);
        let sheet_rels_bytes = read_zip_part_optional(
            &mut archive,
            &sheet_rels_part,
            limits.max_part_bytes,
            &mut budget,
        )?;
        let sheet_rels = match &sheet_rels_bytes {
            Some(bytes) => parse_relationships(bytes)?,
            None => Vec::new(),
        };

        let cross_refs: BTreeSet<String> =
            sheet_rels.iter().map(|rel| rel.id.clone()).collect();
        table.insert(
            worksheet_part.clone(),
            Classification::Understood {
                owning_sheet: Some(index),
                cross_references: cross_refs,
            },
        );
        // The rels part belongs to its sheet even when it declares no
        // relationships; an unclaimed one would dangle after sheet deletion.
        if sheet_rels_bytes.is_some() {
            table.insert(
                sheet_rels_part,
                Classification::Understood {
                    owning_sheet: Some(index),
                    cross_references: BTreeSet::new(),
                },
            );
        }

        // Everything reachable from this sheet's rels, transitively, is owned
        // by the sheet: a drawing pulls in its charts, a chart its colors.
        // Ownership makes deletion complete; the parts themselves stay opaque.
        let mut queue: Vec<String> = Vec::new();
        for rel in &sheet_rels {
            if rel.is_external() {
                continue;
            }
            let target = resolve_target(worksheet_part, &rel.target);
            if rel.type_uri == REL_TYPE_COMMENTS {
                comment_part_by_sheet.insert(index, target.clone());
            }
            if worksheet_parts.iter().any(|p| p == &target) || global_parts.contains(&target) {
                continue;
            }
            queue.push(target);
        }
        while let Some(part) = queue.pop() {
            if !claim_opaque(&mut table, &mut claimed_targets, &part, index) {
                continue;
            }
            let part_rels = rels_part_name(&part);
            if !path_set.contains(&part_rels) {
                continue;
            }
            claim_opaque(&mut table, &mut claimed_targets, &part_rels, index);
            let Some(rels_bytes) = read_zip_part_optional(
                &mut archive,
                &part_rels,
                limits.max_part_bytes,
                &mut budget,
            )?
            else {
                continue;
            };
            for rel in parse_relationships(&rels_bytes)? {
                if rel.is_external() {
                    continue;
                }
                let target = resolve_target(&part, &rel.target);
                if worksheet_parts.iter().any(|p| p == &target)
                    || global_parts.contains(&target)
                {
                    continue;
                }
                queue.push(target);
            }
        }
    }

    // Document metadata, read if present. docProps/app.xml stays opaque: its
    // sheet-title cache is advisory and consumers tolerate it going stale.
    let mut properties = WorkbookProperties::default();
    if let Some(part) = &core_props_part {
        if let Some(bytes) =
            read_zip_part_optional(&mut archive, part, limits.max_part_bytes, &mut budget)?
        {
            let (title, author) = parse_core_properties(&bytes)?;
            properties.title = title;
            properties.author = author;
        }
    }
    if let Some(bytes) = read_zip_part_optional(
        &mut archive,
        APP_PROPS_PART,
        limits.max_part_bytes,
        &mut budget,
    )? {
        properties.company = parse_app_company(&bytes)?;
    }

    for path in &paths {
        // Parts demoted to unowned because two sheets reach them stay that
        // way; the fallback only sees parts the built-in pass never decided.
        let shared = claimed_targets.get(path).is_some_and(Option::is_none);
        let classification = match table.classify(path) {
            Classification::Opaque { owning_sheet: None } if !shared => fallback.classify(path),
            decided => decided,
        };
        match classification {
            Classification::Understood {
                owning_sheet,
                cross_references,
            } => {
                builder.classify_understood(path, owning_sheet, cross_references);
            }
            Classification::Opaque { owning_sheet } => {
                builder.classify_opaque(path, owning_sheet);
            }
        }
    }

    let catalog = builder.build();
    log::debug!(
        "opened {}: {} parts ({} understood), {} sheets, {} comment parts",
        path.display(),
        catalog.len(),
        catalog.understood_count(),
        sheets.len(),
        comment_part_by_sheet.len()
    );

    let workbook = Workbook {
        sheets,
        properties,
    };
    let binding = SourceBinding {
        source_path: path.to_path_buf(),
        catalog,
        ledger: ModificationLedger::new(),
        fingerprint,
        comment_part_by_sheet,
    };
    Ok((workbook, binding))
}

/// Claim `target` for `owner`. A part claimed by two different sheets loses
/// its owner (recorded as `None` in `claimed`): deleting either sheet must not
/// drop a shared part. Returns true when this call newly claimed the part for
/// `owner`.
fn claim_opaque(
    table: &mut TableClassifier,
    claimed: &mut BTreeMap<String, Option<usize>>,
    target: &str,
    owner: usize,
) -> bool {
    match claimed.get(target).copied() {
        None => {
            claimed.insert(target.to_string(), Some(owner));
            table.insert(
                target.to_string(),
                Classification::Opaque {
                    owning_sheet: Some(owner),
                },
            );
            true
        }
        Some(Some(existing)) if existing != owner => {
            claimed.insert(target.to_string(), None);
            table.insert(
                target.to_string(),
                Classification::Opaque { owning_sheet: None },
            );
            false
        }
        Some(_) => false,
    }
}

/// Content type declared for `part`: an exact override wins, then the
/// extension default.
fn declared_content_type<'a>(content_types: &'a ContentTypes, part: &str) -> Option<&'a str> {
    if let Some(ct) = content_types.overrides.get(part) {
        return Some(ct);
    }
    let ext = part.rsplit_once('.').map(|(_, ext)| ext)?;
    content_types
        .defaults
        .get(&ext.to_ascii_lowercase())
        .map(String::as_str)
}

fn find_internal_target(
    rels: &[Relationship],
    base_part: &str,
    type_uri: &str,
) -> Option<String> {
    rels.iter()
        .find(|rel| rel.type_uri == type_uri && !rel.is_external())
        .map(|rel| resolve_target(base_part, &rel.target))
}

/// Parse `xl/sharedStrings.xml` into the flat string table. Rich-text runs are
/// flattened by concatenating their `<t>` fragments; phonetic runs are skipped.
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => match local_name(start.name().as_ref()) {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::End(end) => match local_name(end.name().as_ref()) {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(text) => {
                if in_text {
                    if let Some(current) = current.as_mut() {
                        current.push_str(&text.unescape()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Parse the cells of one worksheet part into model values.
///
/// Cells the model cannot represent (error values, malformed numbers) are
/// skipped with a warning rather than failing the whole open.
pub(crate) fn parse_worksheet_cells(
    xml: &[u8],
    shared_strings: &[String],
    part: &str,
) -> Result<Vec<(CellRef, CellValue)>, XlsxError> {
    #[derive(Clone, Copy, PartialEq)]
    enum CellType {
        Number,
        Shared,
        Boolean,
        Inline,
        FormulaStr,
        Error,
    }

    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();
    let mut cells = Vec::new();

    let mut current_ref: Option<CellRef> = None;
    let mut current_type = CellType::Number;
    let mut pending = String::new();
    let mut in_value = false;
    let mut in_inline = false;
    let mut in_inline_text = false;

    fn parse_cell_start(
        start: &quick_xml::events::BytesStart<'_>,
    ) -> Result<(Option<CellRef>, CellType), XlsxError> {
        let mut cell_ref = None;
        let mut cell_type = CellType::Number;
        for attr in start.attributes() {
            let attr = attr?;
            match attr.key.as_ref() {
                b"r" => {
                    cell_ref = CellRef::from_a1(&attr.unescape_value()?);
                }
                b"t" => {
                    cell_type = match attr.unescape_value()?.as_ref() {
                        "s" => CellType::Shared,
                        "b" => CellType::Boolean,
                        "inlineStr" => CellType::Inline,
                        "str" => CellType::FormulaStr,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    };
                }
                _ => {}
            }
        }
        Ok((cell_ref, cell_type))
    }

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => match local_name(start.name().as_ref()) {
                b"c" => {
                    let (cell_ref, cell_type) = parse_cell_start(&start)?;
                    current_ref = cell_ref;
                    current_type = cell_type;
                    pending.clear();
                }
                b"v" => in_value = true,
                b"is" => in_inline = true,
                b"t" if in_inline => in_inline_text = true,
                _ => {}
            },
            Event::Empty(start) => {
                if local_name(start.name().as_ref()) == b"c" {
                    // Self-closed cell: no value.
                    current_ref = None;
                }
            }
            Event::Text(text) => {
                if in_value || in_inline_text {
                    pending.push_str(&text.unescape()?);
                }
            }
            Event::End(end) => match local_name(end.name().as_ref()) {
                b"v" => in_value = false,
                b"is" => in_inline = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let Some(cell_ref) = current_ref.take() {
                        match finish_cell(current_type, &pending, shared_strings) {
                            Some(value) => cells.push((cell_ref, value)),
                            None => {
                                if !pending.is_empty() {
                                    log::warn!(
                                        "{part}: skipping cell {} with unrepresentable value",
                                        cell_ref.to_a1()
                                    );
                                }
                            }
                        }
                    }
                    pending.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    fn finish_cell(
        cell_type: CellType,
        pending: &str,
        shared_strings: &[String],
    ) -> Option<CellValue> {
        match cell_type {
            CellType::Shared => {
                let idx: usize = pending.trim().parse().ok()?;
                shared_strings.get(idx).cloned().map(CellValue::Text)
            }
            CellType::Boolean => match pending.trim() {
                "1" | "true" => Some(CellValue::Boolean(true)),
                "0" | "false" => Some(CellValue::Boolean(false)),
                _ => None,
            },
            CellType::Inline | CellType::FormulaStr => Some(CellValue::Text(pending.to_string())),
            CellType::Error => None,
            CellType::Number => {
                if pending.trim().is_empty() {
                    return None;
                }
                pending.trim().parse::<f64>().ok().map(CellValue::Number)
            }
        }
    }

    Ok(cells)
}

/// Extract `(title, creator)` from `docProps/core.xml`.
pub(crate) fn parse_core_properties(
    xml: &[u8],
) -> Result<(Option<String>, Option<String>), XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();
    let mut title = None;
    let mut author = None;
    let mut capture: Option<&mut Option<String>> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                capture = match local_name(start.name().as_ref()) {
                    b"title" => Some(&mut title),
                    b"creator" => Some(&mut author),
                    _ => None,
                };
            }
            Event::Text(text) => {
                if let Some(slot) = capture.as_mut() {
                    let value = text.unescape()?.into_owned();
                    **slot = Some(value);
                }
            }
            Event::End(_) => capture = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((title, author))
}

/// Extract `<Company>` from `docProps/app.xml`.
pub(crate) fn parse_app_company(xml: &[u8]) -> Result<Option<String>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    let mut buf = Vec::new();
    let mut company = None;
    let mut in_company = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                in_company = local_name(start.name().as_ref()) == b"Company";
            }
            Event::Text(text) => {
                if in_company {
                    company = Some(text.unescape()?.into_owned());
                }
            }
            Event::End(_) => in_company = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(company)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shared_strings_flattens_rich_text_and_skips_phonetics() {
        let xml = br#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
  <si><t>plain</t></si>
  <si><r><rPr><b/></rPr><t>ri</t></r><r><t>ch</t></r><rPh sb="0" eb="2"><t>ignored</t></rPh></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["plain".to_string(), "rich".to_string()]);
    }

    #[test]
    fn worksheet_cells_parse_all_value_types() {
        let shared = vec!["hello".to_string()];
        let xml = br#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1">
      <c r="A1"><v>42.5</v></c>
      <c r="B1" t="s"><v>0</v></c>
      <c r="C1" t="b"><v>1</v></c>
      <c r="D1" t="inlineStr"><is><t>inline</t></is></c>
      <c r="E1" t="str"><f>CONCAT("a","b")</f><v>ab</v></c>
      <c r="F1" t="e"><v>#DIV/0!</v></c>
      <c r="G1"/>
    </row>
  </sheetData>
</worksheet>"#;
        let cells = parse_worksheet_cells(xml, &shared, "xl/worksheets/sheet1.xml").unwrap();
        assert_eq!(
            cells,
            vec![
                (CellRef::new(0, 0), CellValue::Number(42.5)),
                (CellRef::new(0, 1), CellValue::Text("hello".to_string())),
                (CellRef::new(0, 2), CellValue::Boolean(true)),
                (CellRef::new(0, 3), CellValue::Text("inline".to_string())),
                (CellRef::new(0, 4), CellValue::Text("ab".to_string())),
            ]
        );
    }

    #[test]
    fn declared_content_type_prefers_overrides() {
        let mut ct = ContentTypes::default();
        ct.defaults
            .insert("xml".to_string(), "application/xml".to_string());
        ct.overrides.insert(
            "xl/workbook.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"
                .to_string(),
        );

        assert_eq!(
            declared_content_type(&ct, "xl/workbook.xml"),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml")
        );
        assert_eq!(
            declared_content_type(&ct, "xl/worksheets/sheet1.xml"),
            Some("application/xml")
        );
        assert_eq!(declared_content_type(&ct, "xl/media/image1.png"), None);
    }

    #[test]
    fn core_properties_extracts_title_and_creator() {
        let xml = br#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:title>Quarterly</dc:title>
  <dc:creator>Pat</dc:creator>
</cp:coreProperties>"#;
        let (title, author) = parse_core_properties(xml).unwrap();
        assert_eq!(title.as_deref(), Some("Quarterly"));
        assert_eq!(author.as_deref(), Some("Pat"));
    }

    #[test]
    fn app_properties_extracts_company() {
        let xml = br#"<?xml version="1.0"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
  <Application>Excel</Application>
  <Company>Gridloom</Company>
</Properties>"#;
        assert_eq!(parse_app_company(xml).unwrap().as_deref(), Some("Gridloom"));
    }
}
