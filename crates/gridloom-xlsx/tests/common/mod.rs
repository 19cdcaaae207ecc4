//! Shared fixture: a nine-sheet package with comments on Sheet2 and Sheet5
//! and a drawing + chart chain hanging off Sheet2.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CT_SHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

fn worksheet_xml(sheet_number: u32, with_shared: bool) -> String {
    let shared_cell = if with_shared {
        "<c r=\"B1\" t=\"s\"><v>0</v></c>"
    } else {
        ""
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<worksheet xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_R}\"><sheetData>\
<row r=\"1\"><c r=\"A1\"><v>{sheet_number}</v></c>{shared_cell}</row>\
</sheetData></worksheet>"
    )
}

pub fn build_fixture(dir: &Path) -> PathBuf {
    let mut entries: Vec<(String, String)> = Vec::new();

    let mut content_types = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
<Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
<Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>\
<Override PartName=\"/xl/comments1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml\"/>\
<Override PartName=\"/xl/comments2.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml\"/>\
<Override PartName=\"/xl/drawings/drawing1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.drawing+xml\"/>\
<Override PartName=\"/xl/charts/chart1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.drawingml.chart+xml\"/>",
    );
    for n in 1..=9 {
        content_types.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{n}.xml\" ContentType=\"{CT_SHEET}\"/>"
        ));
    }
    content_types.push_str("</Types>");
    entries.push(("[Content_Types].xml".to_string(), content_types));

    entries.push((
        "_rels/.rels".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"{NS_PKG_RELS}\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
<Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties\" Target=\"docProps/app.xml\"/>\
</Relationships>"
        ),
    ));

    entries.push((
        "docProps/core.xml".to_string(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
<dc:title>Fixture</dc:title><dc:creator>Tests</dc:creator></cp:coreProperties>"
            .to_string(),
    ));
    entries.push((
        "docProps/app.xml".to_string(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">\
<Application>Gridloom Tests</Application><Company>Acme</Company></Properties>"
            .to_string(),
    ));

    let mut workbook = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_R}\"><sheets>"
    );
    for n in 1..=9 {
        workbook.push_str(&format!(
            "<sheet name=\"Sheet{n}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>"
        ));
    }
    workbook.push_str("</sheets></workbook>");
    entries.push(("xl/workbook.xml".to_string(), workbook));

    let mut workbook_rels = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"{NS_PKG_RELS}\">"
    );
    for n in 1..=9 {
        workbook_rels.push_str(&format!(
            "<Relationship Id=\"rId{n}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>"
        ));
    }
    workbook_rels.push_str(
        "<Relationship Id=\"rId10\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\
<Relationship Id=\"rId11\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" Target=\"sharedStrings.xml\"/>\
</Relationships>",
    );
    entries.push(("xl/_rels/workbook.xml.rels".to_string(), workbook_rels));

    entries.push((
        "xl/styles.xml".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<styleSheet xmlns=\"{NS_MAIN}\"><fonts count=\"1\"><font/></fonts></styleSheet>"
        ),
    ));
    entries.push((
        "xl/sharedStrings.xml".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<sst xmlns=\"{NS_MAIN}\" count=\"1\" uniqueCount=\"1\"><si><t>shared</t></si></sst>"
        ),
    ));

    for n in 1..=9u32 {
        entries.push((
            format!("xl/worksheets/sheet{n}.xml"),
            worksheet_xml(n, n == 1),
        ));
    }

    entries.push((
        "xl/worksheets/_rels/sheet2.xml.rels".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"{NS_PKG_RELS}\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments\" Target=\"../comments1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing\" Target=\"../drawings/drawing1.xml\"/>\
</Relationships>"
        ),
    ));
    entries.push((
        "xl/worksheets/_rels/sheet5.xml.rels".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"{NS_PKG_RELS}\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments\" Target=\"../comments2.xml\"/>\
</Relationships>"
        ),
    ));
    entries.push((
        "xl/comments1.xml".to_string(),
        format!(
            "<?xml version=\"1.0\"?>\r\n<comments xmlns=\"{NS_MAIN}\"><commentList><comment ref=\"A1\" authorId=\"0\"><text><t>on sheet two</t></text></comment></commentList></comments>"
        ),
    ));
    entries.push((
        "xl/comments2.xml".to_string(),
        format!(
            "<?xml version=\"1.0\"?>\r\n<comments xmlns=\"{NS_MAIN}\"><commentList><comment ref=\"A1\" authorId=\"0\"><text><t>on sheet five</t></text></comment></commentList></comments>"
        ),
    ));
    entries.push((
        "xl/drawings/drawing1.xml".to_string(),
        "<?xml version=\"1.0\"?>\r\n<xdr:wsDr xmlns:xdr=\"http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing\"/>".to_string(),
    ));
    entries.push((
        "xl/drawings/_rels/drawing1.xml.rels".to_string(),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"{NS_PKG_RELS}\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart\" Target=\"../charts/chart1.xml\"/>\
</Relationships>"
        ),
    ));
    entries.push((
        "xl/charts/chart1.xml".to_string(),
        "<?xml version=\"1.0\"?>\r\n<c:chartSpace xmlns:c=\"http://schemas.openxmlformats.org/drawingml/2006/chart\"/>".to_string(),
    ));

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in &entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();

    let path = dir.join("source.xlsx");
    fs::write(&path, bytes).unwrap();
    path
}

/// Entry names in archive order plus decompressed bytes per entry.
pub fn zip_entries(path: &Path) -> (Vec<String>, BTreeMap<String, Vec<u8>>) {
    let bytes = fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut order = Vec::new();
    let mut contents = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buf).unwrap();
        order.push(name.clone());
        contents.insert(name, buf);
    }
    (order, contents)
}
