use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use gridloom_model::{CellValue, Workbook, Worksheet};

use crate::error::XlsxError;
use crate::ledger::ModificationLedger;
use crate::openxml::{
    local_name, parse_relationships, parse_workbook_sheets, resolve_target, Relationship,
    REL_TYPE_WORKSHEET,
};

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELS_ATTR: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Which part the writer wants bytes for. Sheet indices are positions in the
/// *current* workbook, not open-time positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartIdentity<'a> {
    Worksheet { sheet: usize },
    SheetRels { sheet: usize },
    WorkbookDescriptor,
    WorkbookRels,
    ContentTypes,
    RootRels,
    SharedStrings,
    Styles,
    CoreProperties,
    Other(&'a str),
}

/// Output placement of one current-workbook sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPartPlan {
    /// Worksheet part path in the output package.
    pub part_path: String,
    /// Relationship id in the workbook rels.
    pub rel_id: String,
    /// `sheetId` attribute in the workbook descriptor.
    pub sheet_id: u32,
    /// True when the sheet has no source part and must be written from scratch.
    pub is_new: bool,
}

/// Everything a regenerator may consult while producing part bytes.
///
/// `original` carries the part's source bytes when the part existed at open
/// time; regenerators return them unchanged when nothing relevant diverged,
/// which keeps untouched parts byte-identical through a surgical write.
pub struct RegenContext<'a> {
    pub workbook: &'a Workbook,
    pub ledger: &'a ModificationLedger,
    pub original: Option<&'a [u8]>,
    /// Canonical workbook descriptor part name (`xl/workbook.xml`).
    pub workbook_part: &'a str,
    /// One entry per current-workbook sheet, in sheet order.
    pub sheet_plans: &'a [SheetPartPlan],
    /// Parts omitted from the output (deleted sheets' parts).
    pub removed_parts: &'a BTreeSet<String>,
    /// Old canonical part name -> new canonical part name.
    pub renamed_parts: &'a BTreeMap<String, String>,
}

/// Produces the bytes of understood parts during a surgical write.
///
/// The writer owns all cross-part decisions (which parts exist, their names,
/// their relationship ids); the regenerator only serializes.
pub trait PartRegenerator {
    fn regenerate(
        &self,
        identity: PartIdentity<'_>,
        ctx: &RegenContext<'_>,
    ) -> Result<Vec<u8>, XlsxError>;
}

/// Default regenerator backed by the in-memory workbook model.
///
/// Regenerated worksheets serialize text as inline strings, so the shared
/// string table never needs rewriting and untouched sheets keep their indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegenerator;

impl PartRegenerator for ModelRegenerator {
    fn regenerate(
        &self,
        identity: PartIdentity<'_>,
        ctx: &RegenContext<'_>,
    ) -> Result<Vec<u8>, XlsxError> {
        match identity {
            PartIdentity::Worksheet { sheet } => {
                let worksheet = ctx.workbook.sheet(sheet).ok_or_else(|| {
                    XlsxError::Invalid(format!("no sheet at index {sheet} to regenerate"))
                })?;
                Ok(worksheet_xml(worksheet))
            }
            PartIdentity::SheetRels { sheet } => sheet_rels_xml(ctx, sheet),
            PartIdentity::WorkbookDescriptor => workbook_xml(ctx),
            PartIdentity::WorkbookRels => workbook_rels_xml(ctx),
            PartIdentity::ContentTypes => content_types_xml(ctx),
            PartIdentity::RootRels => passthrough_or(ctx, root_rels_template),
            PartIdentity::SharedStrings => passthrough_or(ctx, shared_strings_template),
            PartIdentity::Styles => passthrough_or(ctx, styles_template),
            PartIdentity::CoreProperties => core_properties_xml(ctx),
            PartIdentity::Other(name) => ctx
                .original
                .map(<[u8]>::to_vec)
                .ok_or_else(|| XlsxError::MissingPart(name.to_string())),
        }
    }
}

fn passthrough_or(ctx: &RegenContext<'_>, template: fn() -> Vec<u8>) -> Result<Vec<u8>, XlsxError> {
    Ok(ctx.original.map(<[u8]>::to_vec).unwrap_or_else(template))
}

fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn worksheet_xml(sheet: &Worksheet) -> Vec<u8> {
    let mut rows: BTreeMap<u32, Vec<(String, &CellValue)>> = BTreeMap::new();
    for (cell, value) in sheet.cells() {
        rows.entry(cell.row).or_default().push((cell.to_a1(), value));
    }

    let mut out = String::with_capacity(256 + rows.len() * 64);
    out.push_str(XML_DECL);
    out.push_str(&format!(
        "<worksheet xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_RELS_ATTR}\">"
    ));
    if rows.is_empty() {
        out.push_str("<sheetData/>");
    } else {
        out.push_str("<sheetData>");
        for (row, cells) in &rows {
            out.push_str(&format!("<row r=\"{}\">", row + 1));
            for (a1, value) in cells {
                match value {
                    CellValue::Number(n) => {
                        out.push_str(&format!("<c r=\"{a1}\"><v>{}</v></c>", fmt_number(*n)));
                    }
                    CellValue::Boolean(b) => {
                        out.push_str(&format!(
                            "<c r=\"{a1}\" t=\"b\"><v>{}</v></c>",
                            if *b { 1 } else { 0 }
                        ));
                    }
                    CellValue::Text(s) => {
                        let space = if s.trim() != s.as_str() {
                            " xml:space=\"preserve\""
                        } else {
                            ""
                        };
                        out.push_str(&format!(
                            "<c r=\"{a1}\" t=\"inlineStr\"><is><t{space}>{}</t></is></c>",
                            escape(s.as_str())
                        ));
                    }
                    CellValue::Empty => {}
                }
            }
            out.push_str("</row>");
        }
        out.push_str("</sheetData>");
    }
    out.push_str("</worksheet>");
    out.into_bytes()
}

/// Carry the namespace prefix of a parent tag over to a child tag name
/// (`x:sheets` -> `x:sheet`).
fn prefixed_tag(parent: &[u8], local: &str) -> String {
    match parent.iter().rposition(|b| *b == b':') {
        Some(idx) => format!("{}:{local}", String::from_utf8_lossy(&parent[..idx])),
        None => local.to_string(),
    }
}

fn write_sheet_elements<W: std::io::Write>(
    writer: &mut Writer<W>,
    sheets_tag: &[u8],
    ctx: &RegenContext<'_>,
) -> Result<(), XlsxError> {
    let tag = prefixed_tag(sheets_tag, "sheet");
    for (plan, sheet) in ctx.sheet_plans.iter().zip(&ctx.workbook.sheets) {
        let name = escape(sheet.name.as_str());
        let sheet_id = plan.sheet_id.to_string();
        let mut el = BytesStart::new(tag.as_str());
        el.push_attribute(("name", name.as_ref()));
        el.push_attribute(("sheetId", sheet_id.as_str()));
        el.push_attribute(("r:id", plan.rel_id.as_str()));
        writer.write_event(Event::Empty(el))?;
    }
    Ok(())
}

fn workbook_xml(ctx: &RegenContext<'_>) -> Result<Vec<u8>, XlsxError> {
    let Some(original) = ctx.original else {
        return Ok(workbook_template(ctx));
    };

    let original_sheets = parse_workbook_sheets(original)?;
    let unchanged = original_sheets.len() == ctx.sheet_plans.len()
        && original_sheets
            .iter()
            .zip(ctx.sheet_plans.iter().zip(&ctx.workbook.sheets))
            .all(|(orig, (plan, sheet))| {
                !plan.is_new && orig.name == sheet.name && orig.rel_id == plan.rel_id
            });
    if unchanged {
        return Ok(original.to_vec());
    }

    let mut reader = Reader::from_reader(Cursor::new(original));
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut skipping = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sheets" => {
                writer.write_event(Event::Start(e.to_owned()))?;
                write_sheet_elements(&mut writer, e.name().as_ref(), ctx)?;
                skipping = true;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sheets" => {
                skipping = false;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheets" => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                write_sheet_elements(&mut writer, tag.as_bytes(), ctx)?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            Event::Eof => break,
            other => {
                if !skipping {
                    writer.write_event(other.into_owned())?;
                }
            }
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn workbook_template(ctx: &RegenContext<'_>) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(XML_DECL);
    out.push_str(&format!(
        "<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_RELS_ATTR}\"><sheets>"
    ));
    for (plan, sheet) in ctx.sheet_plans.iter().zip(&ctx.workbook.sheets) {
        out.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"{}\"/>",
            escape(sheet.name.as_str()),
            plan.sheet_id,
            escape(plan.rel_id.as_str())
        ));
    }
    out.push_str("</sheets></workbook>");
    out.into_bytes()
}

/// Replace the file-name segment of a relationship target with the file name
/// of `new_part` (renames never move a part across directories).
fn relative_rename(target: &str, new_part: &str) -> String {
    let new_file = new_part.rsplit('/').next().unwrap_or(new_part);
    match target.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{new_file}"),
        None => new_file.to_string(),
    }
}

/// Express `part` relative to `base_part`'s directory, falling back to an
/// absolute (package-rooted) target.
fn relative_target(base_part: &str, part: &str) -> String {
    let base_dir = base_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if base_dir.is_empty() {
        return part.to_string();
    }
    match part.strip_prefix(&format!("{base_dir}/")) {
        Some(rest) => rest.to_string(),
        None => format!("/{part}"),
    }
}

fn render_relationships(rels: &[Relationship]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(XML_DECL);
    out.push_str(&format!("<Relationships xmlns=\"{NS_PKG_RELS}\">"));
    for rel in rels {
        out.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
            escape(rel.id.as_str()),
            escape(rel.type_uri.as_str()),
            escape(rel.target.as_str())
        ));
        if let Some(mode) = &rel.target_mode {
            out.push_str(&format!(" TargetMode=\"{}\"", escape(mode.as_str())));
        }
        out.push_str("/>");
    }
    out.push_str("</Relationships>");
    out.into_bytes()
}

/// Drop relationships whose targets were removed and retarget renamed parts.
/// Returns `None` when nothing changed.
fn filter_relationships(
    rels: &mut Vec<Relationship>,
    base_part: &str,
    removed: &BTreeSet<String>,
    renamed: &BTreeMap<String, String>,
) -> bool {
    let before = rels.clone();
    rels.retain(|rel| {
        rel.is_external() || !removed.contains(&resolve_target(base_part, &rel.target))
    });
    for rel in rels.iter_mut() {
        if rel.is_external() {
            continue;
        }
        let target_part = resolve_target(base_part, &rel.target);
        if let Some(new_part) = renamed.get(&target_part) {
            rel.target = relative_rename(&rel.target, new_part);
        }
    }
    *rels != before
}

fn workbook_rels_xml(ctx: &RegenContext<'_>) -> Result<Vec<u8>, XlsxError> {
    let mut rels = match ctx.original {
        Some(bytes) => parse_relationships(bytes)?,
        None => Vec::new(),
    };
    let changed = filter_relationships(
        &mut rels,
        ctx.workbook_part,
        ctx.removed_parts,
        ctx.renamed_parts,
    );

    let mut appended = false;
    for plan in ctx.sheet_plans.iter().filter(|p| p.is_new) {
        rels.push(Relationship {
            id: plan.rel_id.clone(),
            type_uri: REL_TYPE_WORKSHEET.to_string(),
            target: relative_target(ctx.workbook_part, &plan.part_path),
            target_mode: None,
        });
        appended = true;
    }

    if !changed && !appended {
        if let Some(original) = ctx.original {
            return Ok(original.to_vec());
        }
    }
    Ok(render_relationships(&rels))
}

fn sheet_rels_xml(ctx: &RegenContext<'_>, sheet: usize) -> Result<Vec<u8>, XlsxError> {
    let plan = ctx
        .sheet_plans
        .get(sheet)
        .ok_or_else(|| XlsxError::Invalid(format!("no sheet plan at index {sheet}")))?;
    let original = ctx
        .original
        .ok_or_else(|| XlsxError::MissingPart(format!("rels for {}", plan.part_path)))?;

    let mut rels = parse_relationships(original)?;
    let changed = filter_relationships(
        &mut rels,
        &plan.part_path,
        ctx.removed_parts,
        ctx.renamed_parts,
    );
    if !changed {
        return Ok(original.to_vec());
    }
    Ok(render_relationships(&rels))
}

fn content_types_xml(ctx: &RegenContext<'_>) -> Result<Vec<u8>, XlsxError> {
    let original = ctx
        .original
        .ok_or_else(|| XlsxError::MissingPart("[Content_Types].xml".to_string()))?;

    let added: Vec<&SheetPartPlan> = ctx.sheet_plans.iter().filter(|p| p.is_new).collect();
    if ctx.removed_parts.is_empty() && ctx.renamed_parts.is_empty() && added.is_empty() {
        return Ok(original.to_vec());
    }

    fn override_part_name(e: &BytesStart<'_>) -> Result<Option<String>, XlsxError> {
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if local_name(attr.key.as_ref()).eq_ignore_ascii_case(b"PartName") {
                let value = attr.unescape_value()?;
                return Ok(Some(value.trim_start_matches('/').to_string()));
            }
        }
        Ok(None)
    }

    fn retarget_override(
        e: &BytesStart<'_>,
        new_part: &str,
    ) -> Result<BytesStart<'static>, XlsxError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let part_name = format!("/{new_part}");
        let mut patched = BytesStart::new(tag.as_str());
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if local_name(attr.key.as_ref()).eq_ignore_ascii_case(b"PartName") {
                patched.push_attribute(("PartName", part_name.as_str()));
            } else {
                patched.push_attribute(attr);
            }
        }
        Ok(patched.into_owned())
    }

    fn emit_added(
        writer: &mut Writer<Vec<u8>>,
        override_tag: Option<&str>,
        parent: &[u8],
        added: &[&SheetPartPlan],
    ) -> Result<(), XlsxError> {
        let tag = override_tag
            .map(str::to_string)
            .unwrap_or_else(|| prefixed_tag(parent, "Override"));
        for plan in added {
            let part_name = format!("/{}", plan.part_path);
            let mut el = BytesStart::new(tag.as_str());
            el.push_attribute(("PartName", part_name.as_str()));
            el.push_attribute(("ContentType", CT_WORKSHEET));
            writer.write_event(Event::Empty(el))?;
        }
        Ok(())
    }

    let mut reader = Reader::from_reader(Cursor::new(original));
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut override_tag: Option<String> = None;
    let mut skip_override_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            _ if skip_override_depth > 0 => match event {
                Event::Start(_) => skip_override_depth += 1,
                Event::End(_) => skip_override_depth -= 1,
                Event::Eof => break,
                _ => {}
            },
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Override") =>
            {
                if override_tag.is_none() {
                    override_tag = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                let is_empty = matches!(event, Event::Empty(_));
                let part = override_part_name(e)?;
                let drop = part
                    .as_deref()
                    .is_some_and(|p| ctx.removed_parts.contains(p));
                if drop {
                    if !is_empty {
                        skip_override_depth = 1;
                    }
                } else if let Some(new_part) =
                    part.as_deref().and_then(|p| ctx.renamed_parts.get(p))
                {
                    let patched = retarget_override(e, new_part)?;
                    if is_empty {
                        writer.write_event(Event::Empty(patched))?;
                    } else {
                        writer.write_event(Event::Start(patched))?;
                    }
                } else if is_empty {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::End(ref e) if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Types") => {
                emit_added(&mut writer, override_tag.as_deref(), e.name().as_ref(), &added)?;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Types") =>
            {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                emit_added(&mut writer, override_tag.as_deref(), tag.as_bytes(), &added)?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn core_properties_xml(ctx: &RegenContext<'_>) -> Result<Vec<u8>, XlsxError> {
    if !ctx.ledger.is_metadata_changed() {
        return passthrough_or(ctx, core_properties_template_empty);
    }
    let props = &ctx.workbook.properties;
    let Some(original) = ctx.original else {
        return Ok(core_properties_template(
            props.title.as_deref(),
            props.author.as_deref(),
        ));
    };

    let mut reader = Reader::from_reader(Cursor::new(original));
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut replacing: Option<String> = None;
    let mut saw_title = false;
    let mut saw_creator = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e)
                if matches!(local_name(e.name().as_ref()), b"title" | b"creator") =>
            {
                let is_title = local_name(e.name().as_ref()) == b"title";
                let new_value = if is_title {
                    saw_title = true;
                    props.title.as_deref()
                } else {
                    saw_creator = true;
                    props.author.as_deref()
                };
                writer.write_event(Event::Start(e.to_owned()))?;
                if let Some(value) = new_value {
                    writer.write_event(Event::Text(BytesText::new(value)))?;
                    replacing = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
            }
            Event::Text(_) if replacing.is_some() => {}
            Event::End(ref e) => {
                let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if replacing.as_deref() == Some(end_name.as_str()) {
                    replacing = None;
                }
                if local_name(e.name().as_ref()) == b"coreProperties" {
                    if !saw_title {
                        if let Some(title) = props.title.as_deref() {
                            writer.write_event(Event::Start(BytesStart::new("dc:title")))?;
                            writer.write_event(Event::Text(BytesText::new(title)))?;
                            writer.write_event(Event::End(BytesEnd::new("dc:title")))?;
                        }
                    }
                    if !saw_creator {
                        if let Some(author) = props.author.as_deref() {
                            writer.write_event(Event::Start(BytesStart::new("dc:creator")))?;
                            writer.write_event(Event::Text(BytesText::new(author)))?;
                            writer.write_event(Event::End(BytesEnd::new("dc:creator")))?;
                        }
                    }
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn core_properties_template(title: Option<&str>, author: Option<&str>) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(XML_DECL);
    out.push_str(
        "<cp:coreProperties \
xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\">",
    );
    if let Some(title) = title {
        out.push_str(&format!("<dc:title>{}</dc:title>", escape(title)));
    }
    if let Some(author) = author {
        out.push_str(&format!("<dc:creator>{}</dc:creator>", escape(author)));
    }
    out.push_str("</cp:coreProperties>");
    out.into_bytes()
}

fn core_properties_template_empty() -> Vec<u8> {
    core_properties_template(None, None)
}

fn root_rels_template() -> Vec<u8> {
    render_relationships(&[Relationship {
        id: "rId1".to_string(),
        type_uri:
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument"
                .to_string(),
        target: "xl/workbook.xml".to_string(),
        target_mode: None,
    }])
}

fn shared_strings_template() -> Vec<u8> {
    format!("{XML_DECL}<sst xmlns=\"{NS_MAIN}\" count=\"0\" uniqueCount=\"0\"/>").into_bytes()
}

fn styles_template() -> Vec<u8> {
    format!(
        "{XML_DECL}<styleSheet xmlns=\"{NS_MAIN}\">\
<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
<fills count=\"1\"><fill><patternFill patternType=\"none\"/></fill></fills>\
<borders count=\"1\"><border/></borders>\
<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
<cellXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/></cellXfs>\
</styleSheet>"
    )
    .into_bytes()
}
