//! End-to-end pipeline runs over generated DOCX and PDF documents.

mod common;

use common::*;

use docops::config::{load_operations, parse_operations};
use docops::{Operation, PipelineError, StepStatus};
use serde_json::json;

#[test]
fn test_docx_a4_with_page_numbers() {
    let harness = TestHarness::new();
    let source = harness.write_input("letter.docx", &docx_bytes(&["Hello", "\x0c", "World"]));
    let operations = parse_operations(json!([
        {"type": "set_page_size", "size_identifier": "A4"},
        {"type": "add_page_numbers"}
    ]))
    .unwrap();

    let report = harness.run(&source, &operations, "a4.docx").unwrap();
    assert!(!report.is_degraded(), "{:?}", report.steps);
    assert_eq!(report.summary(), "2 of 2 steps applied");

    let output = std::fs::read(harness.output_path("a4.docx")).unwrap();
    let document = docx_part(&output, "word/document.xml").unwrap();
    assert!(document.contains(r#"w:w="11906""#));
    assert!(document.contains(r#"w:h="16838""#));
    assert!(document.contains("footerReference"));
    assert!(document.contains("Hello"));
    assert!(document.contains("World"));
    assert_eq!(document.matches(r#"w:type="page""#).count(), 1, "expected two pages");

    let footer = docx_part(&output, "word/footer1.xml").unwrap();
    assert!(footer.contains("PAGE"));
    assert!(footer.contains(r#"w:val="center""#));
    assert_eq!(harness.workspace_entries(), 0);
}

#[test]
fn test_empty_operation_list_is_byte_identical_copy() {
    let harness = TestHarness::new();
    let bytes = pdf_bytes(2, 612, 792);
    let source = harness.write_input("in.pdf", &bytes);

    let report = harness.run(&source, &[], "copy.pdf").unwrap();
    assert!(report.steps.is_empty());
    assert_eq!(std::fs::read(harness.output_path("copy.pdf")).unwrap(), bytes);
    assert_eq!(harness.workspace_entries(), 0);
}

#[test]
fn test_unknown_operation_passes_document_through() {
    let harness = TestHarness::new();
    let bytes = docx_bytes(&["Unchanged"]);
    let source = harness.write_input("in.docx", &bytes);

    let report = harness
        .run(&source, &[Operation::new("does_not_exist")], "out.docx")
        .unwrap();
    assert_eq!(report.steps[0].status, StepStatus::NotPerformed);
    assert_eq!(std::fs::read(harness.output_path("out.docx")).unwrap(), bytes);
}

#[test]
fn test_one_unsupported_entry_degrades_but_succeeds() {
    let harness = TestHarness::new();
    let source = harness.write_input("in.pdf", &pdf_bytes(1, 612, 792));
    let operations = vec![
        Operation::new("rotate_pages").with_param("rotation_degrees", 90),
        Operation::new("bold_keywords"),
        Operation::new("set_page_color").with_param("page_hex_color", "#FFFFE0"),
    ];

    let report = harness.run(&source, &operations, "out.pdf").unwrap();
    assert!(report.is_degraded());
    assert_eq!(report.applied_count(), 2);
    assert_eq!(report.steps[1].status, StepStatus::NotPerformed);

    let output = std::fs::read(harness.output_path("out.pdf")).unwrap();
    assert_eq!(page_rotations(&output), vec![90]);
}

#[test]
fn test_pdf_rotation_accumulates_modulo_360() {
    let harness = TestHarness::new();
    let source = harness.write_input("in.pdf", &pdf_bytes(3, 612, 792));
    let operations = vec![
        Operation::new("rotate_pages").with_param("rotation_degrees", 270),
        Operation::new("rotate_pages").with_param("rotation_degrees", 180),
        Operation::new("rotate_pages").with_param("rotation_degrees", -90),
    ];

    let report = harness.run(&source, &operations, "rotated.pdf").unwrap();
    assert!(!report.is_degraded(), "{:?}", report.steps);

    let output = std::fs::read(harness.output_path("rotated.pdf")).unwrap();
    assert_eq!(page_rotations(&output), vec![0, 0, 0]);
    assert_eq!(page_count(&output), 3);
}

#[test]
fn test_pdf_resize_page_numbers_and_color() {
    let harness = TestHarness::new();
    let source = harness.write_input("in.pdf", &pdf_bytes(2, 612, 792));
    let operations = parse_operations(json!({
        "operations": [
            {"type": "resize_and_margin", "target_size_identifier": "A5", "margins_mm": {"top": 10, "bottom": 10, "left": 10, "right": 10}},
            {"type": "set_page_color", "page_hex_color": "F0F0F0"},
            {"type": "add_page_numbers", "font_size_pt": 9, "position_center_x": false, "position_right_mm": 15}
        ]
    }))
    .unwrap();

    let report = harness.run(&source, &operations, "a5.pdf").unwrap();
    assert!(!report.is_degraded(), "{:?}", report.steps);

    let doc = lopdf::Document::load(harness.output_path("a5.pdf")).unwrap();
    for page_id in doc.get_pages().values() {
        let page = doc.get_dictionary(*page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = number(&media_box[2]);
        let height = number(&media_box[3]);
        assert!((width - 419.53).abs() < 0.5, "width {}", width);
        assert!((height - 595.28).abs() < 0.5, "height {}", height);
    }
}

fn number(object: &lopdf::Object) -> f64 {
    match object {
        lopdf::Object::Integer(i) => *i as f64,
        lopdf::Object::Real(r) => *r as f64,
        other => panic!("not a number: {:?}", other),
    }
}

#[test]
fn test_repeated_runs_are_equivalent() {
    let harness = TestHarness::new();
    let source = harness.write_input("in.docx", &docx_bytes(&["Repeatable"]));
    let operations = vec![
        Operation::new("set_page_size").with_param("size_identifier", "B5"),
        Operation::new("set_page_color").with_param("hex_color", "EEEEEE"),
    ];

    harness.run(&source, &operations, "first.docx").unwrap();
    harness.run(&source, &operations, "second.docx").unwrap();

    let first = std::fs::read(harness.output_path("first.docx")).unwrap();
    let second = std::fs::read(harness.output_path("second.docx")).unwrap();
    assert_eq!(docx_part_names(&first), docx_part_names(&second));
    assert_eq!(
        docx_part(&first, "word/document.xml"),
        docx_part(&second, "word/document.xml")
    );
}

#[test]
fn test_missing_source_is_the_only_hard_failure() {
    let harness = TestHarness::new();
    let result = harness.run(
        &harness.input_dir.join("nope.docx"),
        &[Operation::new("set_page_size")],
        "out.docx",
    );
    assert!(matches!(result, Err(PipelineError::InputNotFound(_))));
    assert!(!harness.output_path("out.docx").exists());
    assert_eq!(harness.workspace_entries(), 0);
}

#[test]
fn test_operations_file_formats() {
    let harness = TestHarness::new();
    let json_file = harness.write_operations(
        "ops.json",
        r#"{"operations": [{"type": "rotate_pages", "rotation_degrees": 180}]}"#,
    );
    let yaml_file = harness.write_operations(
        "ops.yaml",
        "- type: set_page_size\n  size_identifier: LETTER\n- type: add_page_numbers\n",
    );
    let bad_file = harness.write_operations("bad.json", r#"[{"rotation_degrees": 90}]"#);

    let from_json = load_operations(&json_file).unwrap();
    assert_eq!(from_json[0].kind, "rotate_pages");
    assert_eq!(from_json[0].params["rotation_degrees"], 180);

    let from_yaml = load_operations(&yaml_file).unwrap();
    assert_eq!(from_yaml.len(), 2);
    assert_eq!(from_yaml[1].kind, "add_page_numbers");

    assert!(matches!(
        load_operations(&bad_file),
        Err(docops::ConfigError::Format { .. })
    ));
}
