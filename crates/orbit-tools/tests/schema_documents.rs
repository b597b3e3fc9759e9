#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Validation driven by schemas parsed from JSON documents, the way tool
//! authors ship them.

use orbit_core::OrbitError;
use orbit_tools::{check_schema, validate, validate_args, ParameterSchema, ToolSchema};
use serde_json::json;

fn schema(doc: serde_json::Value) -> ParameterSchema {
    serde_json::from_value(doc).unwrap()
}

#[test]
fn test_bounded_number() {
    let s = schema(json!({ "type": "number", "minimum": 0, "maximum": 10 }));
    assert!(validate(&json!(5), &s).is_ok());
    assert!(matches!(validate(&json!(11), &s), Err(OrbitError::Validation(_))));
    assert!(matches!(validate(&json!("5"), &s), Err(OrbitError::Validation(_))));
}

#[test]
fn test_required_string_property() {
    let s = schema(json!({
        "type": "object",
        "required": ["x"],
        "properties": { "x": { "type": "string" } }
    }));
    assert!(validate(&json!({}), &s).is_err());
    assert!(validate(&json!({ "x": "ok" }), &s).is_ok());
}

#[test]
fn test_transfer_tool_document() {
    let tool: ToolSchema = serde_json::from_value(json!({
        "name": "transfer",
        "description": "Send tokens to an address",
        "parameters": {
            "type": "object",
            "required": ["to", "amount"],
            "properties": {
                "to": { "type": "string", "pattern": "0x[0-9a-fA-F]{40}" },
                "amount": { "type": "number", "minimum": 0 },
                "memo": { "type": "string" },
                "network": { "type": "string", "enum": ["mainnet", "testnet"] }
            }
        }
    }))
    .unwrap();
    check_schema(&tool.parameters).unwrap();

    let to = format!("0x{}", "ab".repeat(20));
    assert!(validate_args(&json!({ "to": to, "amount": 1.5 }), &tool).is_ok());
    assert!(validate_args(&json!({ "to": "0x12", "amount": 1 }), &tool).is_err());

    let err = validate_args(
        &json!({ "to": to, "amount": 1, "network": "devnet" }),
        &tool,
    )
    .unwrap_err();
    assert!(err.to_string().contains("$.network"));
}

#[test]
fn test_unknown_type_in_document_is_config_error() {
    let s = schema(json!({
        "type": "object",
        "properties": { "when": { "type": "date" } }
    }));
    assert!(matches!(check_schema(&s), Err(OrbitError::Config(_))));
}
