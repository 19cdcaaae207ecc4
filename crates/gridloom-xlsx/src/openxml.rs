use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XlsxError;

pub(crate) const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const REL_TYPE_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub(crate) const REL_TYPE_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub(crate) const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_TYPE_CORE_PROPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    /// True for `TargetMode="External"` relationships, whose targets are not package parts.
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }
}

/// Part name of the relationships part for `part_name`
/// (`xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`).
pub fn rels_part_name(part_name: &str) -> String {
    let (dir, file) = part_name.rsplit_once('/').unwrap_or(("", part_name));
    if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    }
}

/// Resolve a relationship target against the part that owns the relationship,
/// producing a canonical part name without a leading slash.
pub fn resolve_target(base_part: &str, target: &str) -> String {
    // Relationship targets are URIs; some producers include a fragment (e.g. `foo.xml#bar`).
    // OPC part names do not include fragments, so strip them before resolving.
    let target = target
        .split_once('#')
        .map(|(base, _)| base)
        .unwrap_or(target);
    if target.is_empty() {
        // A target of just `#fragment` refers to the source part itself.
        return base_part.strip_prefix('/').unwrap_or(base_part).to_string();
    }

    // Targets can be relative to the source part's folder (`worksheets/sheet1.xml`) or
    // absolute (`/xl/worksheets/sheet1.xml`). Absolute targets are rooted at the package
    // root and must not be prefixed with the source part directory.
    let (target, is_absolute) = match target.strip_prefix('/') {
        Some(target) => (target, true),
        None => (target, false),
    };
    let base_dir = if is_absolute {
        ""
    } else {
        base_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    };

    let mut components: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(segment),
        }
    }

    components.join("/")
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                if local_name(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") {
                    let mut id = None;
                    let mut target = None;
                    let mut type_uri = None;
                    let mut target_mode = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"Id") {
                            id = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Target") {
                            target = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Type") {
                            type_uri = Some(value);
                        } else if key.eq_ignore_ascii_case(b"TargetMode") {
                            target_mode = Some(value);
                        }
                    }
                    if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                        relationships.push(Relationship {
                            id,
                            target,
                            type_uri,
                            target_mode,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Parsed `[Content_Types].xml`: extension defaults plus per-part overrides.
///
/// Override keys are canonical part names (no leading slash), matching catalog keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentTypes {
    pub defaults: BTreeMap<String, String>,
    pub overrides: BTreeMap<String, String>,
}

pub fn parse_content_types(xml: &[u8]) -> Result<ContentTypes, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = ContentTypes::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                let name = local_name(start.name().as_ref()).to_ascii_lowercase();
                if name == b"default" {
                    let mut extension = None;
                    let mut content_type = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"Extension") {
                            extension = Some(value.to_ascii_lowercase());
                        } else if key.eq_ignore_ascii_case(b"ContentType") {
                            content_type = Some(value);
                        }
                    }
                    if let (Some(ext), Some(ct)) = (extension, content_type) {
                        out.defaults.insert(ext, ct);
                    }
                } else if name == b"override" {
                    let mut part_name = None;
                    let mut content_type = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"PartName") {
                            part_name = Some(value.trim_start_matches('/').to_string());
                        } else if key.eq_ignore_ascii_case(b"ContentType") {
                            content_type = Some(value);
                        }
                    }
                    if let (Some(part), Some(ct)) = (part_name, content_type) {
                        out.overrides.insert(part, ct);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// One `<sheet>` element from the workbook descriptor, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRef {
    pub name: String,
    pub sheet_id: Option<u32>,
    pub rel_id: String,
}

/// Parse the `<sheets>` list out of `xl/workbook.xml`.
pub fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<SheetRef>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                if local_name(start.name().as_ref()) == b"sheet" {
                    let mut name = None;
                    let mut sheet_id = None;
                    let mut rel_id = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = attr.key.as_ref();
                        let value = attr.unescape_value()?.into_owned();
                        if key == b"name" {
                            name = Some(value);
                        } else if key == b"sheetId" {
                            sheet_id = value.parse::<u32>().ok();
                        } else if local_name(key) == b"id" {
                            rel_id = Some(value);
                        }
                    }
                    if let (Some(name), Some(rel_id)) = (name, rel_id) {
                        sheets.push(SheetRef {
                            name,
                            sheet_id,
                            rel_id,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}
