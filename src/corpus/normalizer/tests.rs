use super::*;
use serde_json::json;

fn normalize_json(value: Value, tag: &str, ids: &mut IdCounter) -> Vec<IngestionRecord> {
    let raw: RawSourceFile = serde_json::from_value(value).expect("should parse source file");
    normalize(raw, tag, ids)
}

fn texts(records: &[IngestionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.text.as_str()).collect()
}

#[test]
fn sequence_text_shorter_than_vectors_falls_back_to_empty() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({
            "title": "Budget",
            "question": [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]],
            "question_text": ["hello"],
        }),
        "legcoqna",
        &mut ids,
    );

    assert_eq!(records.len(), 3);
    assert_eq!(texts(&records), vec!["hello", "", ""]);
    assert!(records.iter().all(|r| r.title == "Budget"));
}

#[test]
fn single_string_text_applies_to_every_vector() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({
            "question": [[0.1], [0.2], [0.3]],
            "question_text": "hello",
        }),
        "legcoqna",
        &mut ids,
    );

    assert_eq!(texts(&records), vec!["hello", "hello", "hello"]);
}

#[test]
fn null_entries_in_sequence_become_empty() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({
            "reply": [[1.0], [2.0], [3.0]],
            "reply_text": ["first", null, 7],
        }),
        "sfcqna",
        &mut ids,
    );

    assert_eq!(texts(&records), vec!["first", "", ""]);
}

#[test]
fn channel_without_text_field_is_skipped() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({
            "question": [[0.1], [0.2]],
            "content": [[0.3]],
            "content_text": ["kept"],
        }),
        "pressrelease",
        &mut ids,
    );

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "kept");
    assert_eq!(ids.issued(), 1);
}

#[test]
fn channel_without_vectors_is_skipped() {
    let mut ids = IdCounter::new();
    let records = normalize_json(json!({ "reply_text": ["orphan"] }), "sfcqna", &mut ids);

    assert!(records.is_empty());
    assert_eq!(ids.issued(), 0);
}

#[test]
fn null_and_empty_text_count_as_absent() {
    assert_eq!(TextField::from_value(Some(Value::Null)), TextField::Absent);
    assert_eq!(TextField::from_value(Some(json!(""))), TextField::Absent);
    assert_eq!(TextField::from_value(None), TextField::Absent);
}

#[test]
fn unexpected_text_shape_yields_empty_texts() {
    let field = TextField::from_value(Some(json!({ "unexpected": true })));
    assert_eq!(field, TextField::Sequence(Vec::new()));
    assert_eq!(field.text_at(0), "");
}

#[test]
fn channels_are_emitted_in_fixed_order_with_shared_counter() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({
            "content": [[0.3]],
            "content_text": ["c"],
            "reply": [[0.2]],
            "reply_text": ["r"],
            "question": [[0.1]],
            "question_text": ["q"],
        }),
        "legcoqna",
        &mut ids,
    );

    assert_eq!(texts(&records), vec!["q", "r", "c"]);
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["legcoqna0", "legcoqna1", "legcoqna2"]);
}

#[test]
fn counter_continues_across_files() {
    let mut ids = IdCounter::new();
    let first = normalize_json(
        json!({ "question": [[0.1], [0.2]], "question_text": ["a", "b"] }),
        "legcoqna",
        &mut ids,
    );
    let second = normalize_json(
        json!({ "content": [[0.3]], "content_text": "c" }),
        "sfcqna",
        &mut ids,
    );

    assert_eq!(first[1].id, "legcoqna1");
    assert_eq!(second[0].id, "sfcqna2");
}

#[test]
fn missing_title_defaults_to_empty() {
    let mut ids = IdCounter::new();
    let records = normalize_json(
        json!({ "title": 12, "question": [[0.1]], "question_text": ["x"] }),
        "legcoqna",
        &mut ids,
    );

    assert_eq!(records[0].title, "");
}

#[test]
fn unknown_fields_are_ignored() {
    let mut ids = IdCounter::new();
    let records = normalize_str(
        r#"{"metadata": {"source": "x"}, "question": [[0.5]], "question_text": ["q"]}"#,
        "legcoqna",
        &mut ids,
    )
    .expect("should accept unknown fields");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].vector, vec![0.5]);
}

#[test]
fn malformed_json_is_an_error() {
    let mut ids = IdCounter::new();
    let result = normalize_str("{ not json", "legcoqna", &mut ids);

    assert!(result.is_err());
    assert_eq!(ids.issued(), 0);
}
