//! Decoding model replies into validated structures.

use crate::integration::test_utils::order_structure;
use flowsheet::error::{PipelineError, SchemaError};
use flowsheet::generation::parse_structure;
use flowsheet::schema::{extract_json, validate_value, ColumnType};
use serde_json::json;

#[test]
fn test_fenced_reply_with_prose_is_accepted() {
    let reply = format!(
        "Sure! Here is your system.\n\n```json\n{}\n```\nLet me know if you need changes.",
        order_structure()
    );
    let flow = parse_structure(&reply).unwrap();
    assert_eq!(flow.system_name, "Order Desk");
    assert_eq!(flow.sheets.len(), 2);
    let orders = flow.sheet("Orders").unwrap();
    assert_eq!(orders.column("status").unwrap().column_type, ColumnType::Dropdown);
    assert_eq!(orders.column("quantity").unwrap().default_value.as_deref(), Some("1"));
    assert_eq!(orders.relationships, vec!["Customers".to_string()]);
}

#[test]
fn test_bare_object_inside_text_is_extracted() {
    let text = "The answer is {\"system_name\": \"X\", \"sheets\": [{\"name\": \"A\", \"columns\": [\"a\"]}]} ok";
    let json = extract_json(text).unwrap();
    let flow = validate_value(serde_json::from_str(&json).unwrap()).unwrap();
    assert_eq!(flow.sheets[0].columns[0].column_type, ColumnType::Text);
}

#[test]
fn test_reply_without_json_is_generation_error() {
    let err = parse_structure("I could not design that, sorry.").unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[test]
fn test_wrong_shape_is_generation_error() {
    let err = parse_structure(r#"{"system_name": "X", "sheets": "none"}"#).unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[test]
fn test_first_violation_is_reported() {
    let value = json!({
        "system_name": "Bad",
        "sheets": [
            {"name": "Tasks", "columns": [{"name": "title", "type": "richtext"}]},
            {"name": "Notes", "columns": []}
        ]
    });
    match validate_value(value).unwrap_err() {
        PipelineError::Schema(SchemaError::UnknownColumnType { column_type, .. }) => {
            assert_eq!(column_type, "richtext")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_forbidden_sheet_characters() {
    for name in ["Q1/Q2", "Tasks:Open", "[Archive]"] {
        let value = json!({
            "system_name": "Bad",
            "sheets": [{"name": name, "columns": ["a"]}]
        });
        assert!(
            matches!(
                validate_value(value),
                Err(PipelineError::Schema(SchemaError::InvalidSheetName { .. }))
            ),
            "{} should be rejected",
            name
        );
    }
}

#[test]
fn test_empty_structure_errors() {
    assert!(matches!(
        validate_value(json!({"system_name": "  ", "sheets": []})),
        Err(PipelineError::Schema(SchemaError::EmptySystemName))
    ));
    assert!(matches!(
        validate_value(json!({"system_name": "X", "sheets": []})),
        Err(PipelineError::Schema(SchemaError::NoSheets))
    ));
    assert!(matches!(
        validate_value(json!({"system_name": "X", "sheets": [{"name": "A", "columns": []}]})),
        Err(PipelineError::Schema(SchemaError::NoColumns { .. }))
    ));
}

#[test]
fn test_bracketed_prose_before_object_is_skipped() {
    let reply = format!(
        "Design [1] follows, see notes [a, b]:\n{}\nDone.",
        order_structure()
    );
    let flow = parse_structure(&reply).unwrap();
    assert_eq!(flow.system_name, "Order Desk");
    assert_eq!(flow.sheets.len(), 2);
}
