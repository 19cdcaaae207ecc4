//! End-to-end round-trip behavior over a realistic nine-sheet package with
//! comments on two sheets and a chart (drawing + chart part) on one.

mod common;

use std::fs;

use pretty_assertions::assert_eq;

use common::{build_fixture, zip_entries};
use gridloom_model::{CellRef, CellValue};
use gridloom_xlsx::{
    open, write, write_with, ModelRegenerator, PackageLimits, WriteError, WriteOptions, XlsxError,
};

#[test]
fn clean_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (workbook, binding) = open(&source).unwrap();
    write(&workbook, &binding, &dest).unwrap();

    assert_eq!(fs::read(&source).unwrap(), fs::read(&dest).unwrap());
}

#[test]
fn modifying_one_sheet_leaves_every_other_entry_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook
        .sheet_mut(2)
        .unwrap()
        .set_value(CellRef::new(0, 0), CellValue::Number(99.0));
    let binding = binding.with_ledger(binding.ledger.mark_sheet_modified(2));
    write(&workbook, &binding, &dest).unwrap();

    let (source_order, source_entries) = zip_entries(&source);
    let (dest_order, dest_entries) = zip_entries(&dest);
    assert_eq!(source_order, dest_order);
    for (name, bytes) in &source_entries {
        if name == "xl/worksheets/sheet3.xml" {
            continue;
        }
        assert_eq!(
            Some(bytes),
            dest_entries.get(name),
            "entry {name} should be byte-identical"
        );
    }

    let (reopened, _) = open(&dest).unwrap();
    assert_eq!(
        reopened.sheet(2).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Number(99.0))
    );
    // The untouched shared-string cell on Sheet1 still resolves.
    assert_eq!(
        reopened.sheet(0).unwrap().value(CellRef::new(0, 1)),
        Some(&CellValue::Text("shared".to_string()))
    );
}

#[test]
fn deleting_a_sheet_removes_its_dependents_and_renumbers_comments() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook.remove_sheet(1).unwrap();
    let binding = binding.with_ledger(binding.ledger.mark_sheet_deleted(1));
    write(&workbook, &binding, &dest).unwrap();

    let (_, source_entries) = zip_entries(&source);
    let (_, dest_entries) = zip_entries(&dest);

    for gone in [
        "xl/worksheets/sheet2.xml",
        "xl/worksheets/_rels/sheet2.xml.rels",
        "xl/drawings/drawing1.xml",
        "xl/drawings/_rels/drawing1.xml.rels",
        "xl/charts/chart1.xml",
        "xl/comments2.xml",
    ] {
        assert!(!dest_entries.contains_key(gone), "{gone} should be gone");
    }

    // Sheet5's comment part slid down into the freed number, byte-for-byte.
    assert_eq!(
        dest_entries.get("xl/comments1.xml"),
        source_entries.get("xl/comments2.xml")
    );

    let workbook_xml = String::from_utf8(dest_entries["xl/workbook.xml"].clone()).unwrap();
    assert!(!workbook_xml.contains("Sheet2"));
    assert!(workbook_xml.contains("Sheet5"));

    let content_types = String::from_utf8(dest_entries["[Content_Types].xml"].clone()).unwrap();
    assert!(!content_types.contains("sheet2.xml"));
    assert!(!content_types.contains("chart1.xml"));
    assert!(!content_types.contains("drawing1.xml"));
    assert!(!content_types.contains("comments2.xml"));
    assert!(content_types.contains("/xl/comments1.xml"));

    let sheet5_rels =
        String::from_utf8(dest_entries["xl/worksheets/_rels/sheet5.xml.rels"].clone()).unwrap();
    assert!(sheet5_rels.contains("../comments1.xml"));
    assert!(!sheet5_rels.contains("comments2"));

    let (reopened, reopened_binding) = open(&dest).unwrap();
    assert_eq!(reopened.sheet_count(), 8);
    assert_eq!(
        reopened.sheet_names().collect::<Vec<_>>(),
        vec!["Sheet1", "Sheet3", "Sheet4", "Sheet5", "Sheet6", "Sheet7", "Sheet8", "Sheet9"]
    );
    // Sheet5 now sits at index 3 and still owns the (renumbered) comment part.
    assert_eq!(
        reopened_binding
            .comment_part_by_sheet
            .get(&3)
            .map(String::as_str),
        Some("xl/comments1.xml")
    );
}

#[test]
fn deleting_an_uncommented_sheet_keeps_comment_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook.remove_sheet(6).unwrap();
    let binding = binding.with_ledger(binding.ledger.mark_sheet_deleted(6));
    write(&workbook, &binding, &dest).unwrap();

    let (_, source_entries) = zip_entries(&source);
    let (_, dest_entries) = zip_entries(&dest);
    assert!(!dest_entries.contains_key("xl/worksheets/sheet7.xml"));
    assert_eq!(
        dest_entries.get("xl/comments1.xml"),
        source_entries.get("xl/comments1.xml")
    );
    assert_eq!(
        dest_entries.get("xl/comments2.xml"),
        source_entries.get("xl/comments2.xml")
    );
}

#[test]
fn reordering_keeps_each_sheet_bound_to_its_parts() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook.move_sheet(8, 0).unwrap();
    let binding = binding.with_ledger(binding.ledger.mark_reordered());
    write(&workbook, &binding, &dest).unwrap();

    // A reorder changes only the workbook descriptor: its <sheet> entries
    // move while each keeps its relationship id, so worksheet parts and
    // everything hanging off them are copied verbatim.
    let (source_order, source_entries) = zip_entries(&source);
    let (dest_order, dest_entries) = zip_entries(&dest);
    assert_eq!(source_order, dest_order);
    for (name, bytes) in &source_entries {
        if name == "xl/workbook.xml" {
            continue;
        }
        assert_eq!(
            Some(bytes),
            dest_entries.get(name),
            "entry {name} should be byte-identical"
        );
    }

    let (reopened, reopened_binding) = open(&dest).unwrap();
    assert_eq!(reopened.sheet_names().next(), Some("Sheet9"));
    assert_eq!(
        reopened.sheet(0).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Number(9.0))
    );
    assert_eq!(
        reopened.sheet(1).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Number(1.0))
    );

    // The comment parts still belong to the sheets that carried them, now at
    // their shifted positions.
    let commented: Vec<&str> = reopened_binding
        .comment_part_by_sheet
        .keys()
        .map(|&idx| reopened.sheet(idx).unwrap().name.as_str())
        .collect();
    assert_eq!(commented, vec!["Sheet2", "Sheet5"]);
}

#[test]
fn reordering_with_a_modified_sheet_regenerates_only_that_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook.move_sheet(8, 0).unwrap();
    workbook
        .sheet_mut(0)
        .unwrap()
        .set_value(CellRef::new(0, 0), CellValue::Number(99.0));
    // Sheet9 sat at open-time index 8; ledger indices never move.
    let binding =
        binding.with_ledger(binding.ledger.mark_sheet_modified(8).mark_reordered());
    write(&workbook, &binding, &dest).unwrap();

    let (_, source_entries) = zip_entries(&source);
    let (_, dest_entries) = zip_entries(&dest);
    for (name, bytes) in &source_entries {
        if name == "xl/workbook.xml" || name == "xl/worksheets/sheet9.xml" {
            continue;
        }
        assert_eq!(
            Some(bytes),
            dest_entries.get(name),
            "entry {name} should be byte-identical"
        );
    }

    let (reopened, _) = open(&dest).unwrap();
    assert_eq!(reopened.sheet(0).unwrap().name, "Sheet9");
    assert_eq!(
        reopened.sheet(0).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Number(99.0))
    );
    assert_eq!(
        reopened.sheet(1).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Number(1.0))
    );
}

#[test]
fn declared_sizes_are_checked_before_any_verbatim_copy() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (workbook, binding) = open(&source).unwrap();

    // Even the clean byte-copy path honors the limits.
    let tiny = WriteOptions {
        limits: PackageLimits {
            max_part_bytes: 1,
            max_total_bytes: 2,
        },
        expected_fingerprint: None,
    };
    let err = write_with(&workbook, &binding, &dest, &ModelRegenerator, tiny).unwrap_err();
    assert!(matches!(
        err,
        WriteError::Xlsx(XlsxError::PartTooLarge { .. })
    ));
    assert!(!dest.exists());

    let total_only = WriteOptions {
        limits: PackageLimits {
            max_part_bytes: u64::MAX,
            max_total_bytes: 64,
        },
        expected_fingerprint: None,
    };
    let err = write_with(&workbook, &binding, &dest, &ModelRegenerator, total_only).unwrap_err();
    assert!(matches!(
        err,
        WriteError::Xlsx(XlsxError::PackageTooLarge { .. })
    ));
    assert!(!dest.exists());
}

#[test]
fn added_sheet_gets_fresh_part_and_relationship() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    let idx = workbook.add_sheet("Extra").unwrap();
    workbook
        .sheet_mut(idx)
        .unwrap()
        .set_value(CellRef::new(0, 0), CellValue::Text("fresh".to_string()));
    write(&workbook, &binding, &dest).unwrap();

    let (_, dest_entries) = zip_entries(&dest);
    assert!(dest_entries.contains_key("xl/worksheets/sheet10.xml"));
    let content_types = String::from_utf8(dest_entries["[Content_Types].xml"].clone()).unwrap();
    assert!(content_types.contains("/xl/worksheets/sheet10.xml"));
    let workbook_rels =
        String::from_utf8(dest_entries["xl/_rels/workbook.xml.rels"].clone()).unwrap();
    assert!(workbook_rels.contains("rId12"));
    assert!(workbook_rels.contains("worksheets/sheet10.xml"));

    let (reopened, _) = open(&dest).unwrap();
    assert_eq!(reopened.sheet_count(), 10);
    assert_eq!(
        reopened.sheet(9).unwrap().value(CellRef::new(0, 0)),
        Some(&CellValue::Text("fresh".to_string()))
    );
}

#[test]
fn metadata_change_rewrites_core_properties_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    workbook.properties.title = Some("Renamed".to_string());
    let binding = binding.with_ledger(binding.ledger.mark_metadata_changed());
    write(&workbook, &binding, &dest).unwrap();

    let (_, source_entries) = zip_entries(&source);
    let (_, dest_entries) = zip_entries(&dest);
    let core = String::from_utf8(dest_entries["docProps/core.xml"].clone()).unwrap();
    assert!(core.contains("<dc:title>Renamed</dc:title>"));
    for n in 1..=9 {
        let name = format!("xl/worksheets/sheet{n}.xml");
        assert_eq!(source_entries.get(&name), dest_entries.get(&name));
    }

    let (reopened, _) = open(&dest).unwrap();
    assert_eq!(reopened.properties.title.as_deref(), Some("Renamed"));
}

#[test]
fn stale_source_is_rejected_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (workbook, binding) = open(&source).unwrap();

    // Concurrent change to the source after open.
    let mut bytes = fs::read(&source).unwrap();
    bytes.push(0);
    fs::write(&source, bytes).unwrap();

    let err = write(&workbook, &binding, &dest).unwrap_err();
    match err {
        WriteError::SourceChanged { path } => assert_eq!(path, source),
        other => panic!("expected SourceChanged, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[test]
fn ledger_index_beyond_source_sheets_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (workbook, binding) = open(&source).unwrap();
    let binding = binding.with_ledger(binding.ledger.mark_sheet_modified(42));
    let err = write(&workbook, &binding, &dest).unwrap_err();
    assert!(matches!(err, WriteError::SheetOutOfRange { index: 42, .. }));
}

#[test]
fn fewer_model_sheets_than_survivors_is_a_desync() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_fixture(dir.path());
    let dest = dir.path().join("out.xlsx");

    let (mut workbook, binding) = open(&source).unwrap();
    // Sheet removed from the model without recording the deletion.
    workbook.remove_sheet(0).unwrap();
    let err = write(&workbook, &binding, &dest).unwrap_err();
    assert!(matches!(err, WriteError::CatalogDesync { .. }));
}
