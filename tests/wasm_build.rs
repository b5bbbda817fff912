//! WASM build test
//!
//! Drives the `HighlightEngine` class through the JS boundary in a browser.

#![cfg(target_arch = "wasm32")]

use highlight_wasm::api::{default_palette, HighlightEngine};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const LESSON: &str = "<p>Hello world</p><p>Second paragraph</p>";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    html: String,
    markers: usize,
    orphaned: usize,
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap()
}

#[wasm_bindgen_test]
fn test_engine_creation() {
    let engine = HighlightEngine::new("lesson-1", "student-1", LESSON, JsValue::UNDEFINED);
    assert!(engine.is_ok());
}

#[wasm_bindgen_test]
fn test_invalid_options_are_rejected() {
    let options = to_js(&serde_json::json!({ "render": { "baseOpacity": 3.0 } }));
    assert!(HighlightEngine::new("lesson-1", "student-1", LESSON, options).is_err());
}

#[wasm_bindgen_test]
fn test_capture_and_create_highlight() {
    let mut engine = HighlightEngine::new("lesson-1", "student-1", LESSON, JsValue::UNDEFINED).unwrap();

    let selection = to_js(&serde_json::json!({
        "startPath": [0, 0], "startOffset": 6,
        "endPath": [0, 0], "endOffset": 11
    }));
    let outcome: serde_json::Value =
        serde_wasm_bindgen::from_value(engine.capture_selection(selection).unwrap()).unwrap();
    assert_eq!(outcome["kind"], "selected");
    assert_eq!(outcome["text"], "world");

    let style = to_js(&serde_json::json!({ "color": "#BBDEFB" }));
    let record: serde_json::Value = serde_wasm_bindgen::from_value(
        engine.create_highlight(to_js(&outcome), style).unwrap(),
    )
    .unwrap();
    assert_eq!(record["anchor"]["textQuote"]["exact"], "world");

    assert!(engine.rendered_html().contains("data-hl-target"));
    let id = record["id"].as_str().unwrap().to_string();
    assert_eq!(engine.highlight_at(to_js(&vec![0usize, 1, 0])).unwrap(), Some(id));
}

#[wasm_bindgen_test]
fn test_load_records_and_orphans() {
    let mut engine = HighlightEngine::new("lesson-1", "student-1", LESSON, JsValue::UNDEFINED).unwrap();
    let records = to_js(&serde_json::json!([
        { "id": "a", "documentId": "lesson-1", "userId": "student-1",
          "anchor": { "textQuote": { "type": "TextQuoteSelector", "exact": "Second" } },
          "color": "#FFEB3B" },
        { "id": "b", "documentId": "lesson-1", "userId": "student-1",
          "anchor": { "textQuote": { "type": "TextQuoteSelector", "exact": "Not found" } },
          "color": "#FFEB3B" }
    ]));

    let summary: Summary = serde_wasm_bindgen::from_value(engine.load_highlights(records).unwrap()).unwrap();
    assert_eq!(summary.markers, 1);
    assert_eq!(summary.orphaned, 1);
    assert!(summary.html.contains("Second</span>"));

    let orphaned: Vec<serde_json::Value> =
        serde_wasm_bindgen::from_value(engine.list_highlights(JsValue::from_str("orphaned")).unwrap()).unwrap();
    assert_eq!(orphaned.len(), 1);
    assert_eq!(orphaned[0]["id"], "b");
}

#[wasm_bindgen_test]
fn test_default_palette() {
    let palette: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(default_palette().unwrap()).unwrap();
    assert_eq!(palette.len(), 6);
    assert_eq!(palette[0]["name"], "Yellow");
}
