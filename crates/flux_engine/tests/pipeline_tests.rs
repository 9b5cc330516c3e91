//! Whole-pipeline tests: source file to diagnostics, kernel states and IR

use std::fs;

use flux_engine::prelude::*;
use flux_engine::{document_from_json, document_to_json, RenderError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const STORY: &str = r#"
document {
  meta { title = "Field notes"; version = "0.2.0"; }
  state {
    param steps: int @ 0;
    param open: bool @ true;
  }
  grid field {
    topology = grid;
    size { rows = 1; cols = 3; }
    cell a { content = ""; dynamic = 0.6; }
    cell b { content = ""; dynamic = 0.6; }
    cell c { content = ""; dynamic = 0.4; }
  }
  rule grow(mode = docstep, grid = field) {
    when cell.content == "" and neighbors.all().dynamic > 0.5
    then { cell.content = "noise"; }
  }
  rule count(mode = docstep) { when true then { steps = steps + 1; } }
  runtime { docstepAdvance = [ timer(1s) ]; }
  body {
    page p1 {
      text title { content = "Field notes"; label = "title"; }
      slot phase { refresh = docstep; content = @chooseStep(["dawn", "noon", "dusk"]); }
      text back { content = @("back to " + ref("title")); visibleIf = @(params.open == true); }
      grid view { grid = field; }
    }
  }
}
"#;

#[test]
fn test_file_to_ir() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("story.flux");
    fs::write(&path, STORY).unwrap();

    let doc = load_document(&path).unwrap();
    assert!(check_document("story.flux", &doc).is_empty());
    assert_eq!(doc.version(), Some("0.2.0"));

    let mut runtime = create_document_runtime_ir(doc, RenderOptions::default()).unwrap();
    let first = runtime.render().unwrap();
    assert_eq!(first.find("phase").unwrap().props["content"], Value::str("dawn"));
    assert_eq!(first.find("back").unwrap().props["content"], Value::str("back to title"));

    let second = runtime.step(1).unwrap();
    assert_eq!(second.find("phase").unwrap().props["content"], Value::str("noon"));
    let grid = second.find("view").unwrap().grid.clone().unwrap();
    let contents: Vec<_> = grid.cells.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["noise", "", "noise"]);
}

#[test]
fn test_kernel_and_live_runtime_agree() {
    init_logging();
    let doc = parse_document(STORY).unwrap();

    let mut state = init_runtime_state(&doc);
    for _ in 0..3 {
        state = run_docstep_once(&doc, &state).unwrap();
    }
    assert_eq!(state.param("steps"), Some(&Value::Int(3)));

    let live = create_runtime(doc);
    for _ in 0..3 {
        live.step().unwrap();
    }
    assert_eq!(live.snapshot(), state);
    assert_eq!(live.default_interval(), Some(std::time::Duration::from_secs(1)));
}

#[test]
fn test_load_reports_located_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.flux");
    fs::write(&path, "document {\n  state { param x: int @ 1 }\n}\n").unwrap();

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, EngineError::Diagnostic(_)));
    let message = err.to_string();
    assert!(message.contains("broken.flux:2:28: Parse error:"), "{}", message);
}

#[test]
fn test_diagnose_collects_all_findings() {
    let diagnostics = diagnose(
        "v.flux",
        r#"document {
  rule r(mode = docstep, grid = imaginary) { when true then { } }
  body {
    text a { label = "same"; }
    text b { label = "same"; content = @ref("missing"); }
  }
}"#,
    );
    assert_eq!(diagnostics.len(), 3, "{:?}", diagnostics);
}

#[test]
fn test_ast_json_round_trip_through_engine() {
    let doc = parse_document(STORY).unwrap();
    let json = document_to_json(&doc).unwrap();
    let back = document_from_json(&json).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn test_render_error_surfaces_through_engine() {
    let doc = parse_document(r#"document { body { slot s { content = @nope; } } }"#).unwrap();
    let err: EngineError = render_document_ir(&doc, RenderOptions::default()).unwrap_err().into();
    assert!(matches!(err, EngineError::Render(RenderError::Property { .. })));
    assert_eq!(err.to_string(), "Unknown identifier 'nope' (in slot 's', property 'content')");
}
