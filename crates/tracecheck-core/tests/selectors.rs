//! Message, tool call and tool output selection.

use serde_json::{json, Value};
use tracecheck_core::{Provenance, Selector, Trace, TracecheckError};

fn weather_trace() -> Trace {
    Trace::new(vec![
        json!({"role": "system", "content": "You are a weather bot."}),
        json!({"role": "user", "content": "Weather in Zurich and Geneva?"}),
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\": \"Zurich\"}"}},
                {"id": "2", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\": \"Geneva\"}"}},
                {"id": "3", "type": "function", "function": {"name": "get_time", "arguments": "not json"}}
            ]
        }),
        json!({"role": "tool", "tool_call_id": "1", "content": "sunny"}),
        json!({"role": "tool", "tool_call_id": "2", "content": "rainy"}),
        json!({"role": "assistant", "content": "Zurich is sunny, Geneva is rainy."}),
    ])
    .unwrap()
}

fn addresses(values: &[impl Provenance]) -> Vec<String> {
    values.iter().map(|v| v.addresses()[0].to_string()).collect()
}

#[test]
fn test_no_filter_returns_everything() {
    let trace = weather_trace();
    assert_eq!(trace.messages(&Selector::all()).unwrap().len(), 6);
    assert_eq!(trace.tool_calls(&Selector::all()).unwrap().len(), 3);
    assert_eq!(trace.tool_outputs(&Selector::all()).unwrap().len(), 2);
}

#[test]
fn test_literal_filters_are_anded() {
    let trace = weather_trace();
    let assistant = trace
        .messages(&Selector::all().field("role", "assistant"))
        .unwrap();
    assert_eq!(addresses(&assistant), vec!["2", "5"]);

    let none = trace
        .messages(&Selector::all().field("role", "assistant").field("content", "sunny"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_predicate_filter_receives_unwrapped_field() {
    let trace = weather_trace();
    let long = trace
        .messages(&Selector::all().field_with("content", |v: &Value| {
            v.as_str().is_some_and(|s| s.len() > 20)
        }))
        .unwrap();
    assert_eq!(addresses(&long), vec!["0", "1", "5"]);
}

#[test]
fn test_tool_call_name_and_nested_arguments() {
    let trace = weather_trace();
    let weather = trace
        .tool_calls(&Selector::all().field("name", "get_weather"))
        .unwrap();
    assert_eq!(addresses(&weather), vec!["2.tool_calls.0", "2.tool_calls.1"]);

    let geneva = trace
        .tool_calls(&Selector::all().field("arguments.city", "Geneva"))
        .unwrap();
    assert_eq!(addresses(&geneva), vec!["2.tool_calls.1"]);
}

#[test]
fn test_unparseable_arguments_read_as_missing() {
    let trace = weather_trace();
    let zurich = trace
        .tool_calls(&Selector::all().field("arguments.city", "Zurich"))
        .unwrap();
    assert_eq!(addresses(&zurich), vec!["2.tool_calls.0"]);

    let missing = trace
        .tool_calls(&Selector::all().field_with("arguments.city", |v: &Value| v.is_null()))
        .unwrap();
    assert_eq!(addresses(&missing), vec!["2.tool_calls.2"]);
}

#[test]
fn test_numeric_literal_matches_number_field() {
    let trace = Trace::new(vec![
        json!({"role": "user", "content": "a", "turn": 1}),
        json!({"role": "user", "content": "b", "turn": 2.0}),
    ])
    .unwrap();
    let second = trace.messages(&Selector::all().field("turn", 2)).unwrap();
    assert_eq!(addresses(&second), vec!["1"]);
}

#[test]
fn test_unsupported_literal_is_rejected() {
    let trace = weather_trace();
    let err = trace
        .messages(&Selector::all().field("content", true))
        .unwrap_err();
    assert!(matches!(err, TracecheckError::UnsupportedFilterType { field, .. } if field == "content"));
}

#[test]
fn test_positional_access_and_out_of_range() {
    let trace = weather_trace();
    assert_eq!(trace.tool_output(1).unwrap().addresses()[0].to_string(), "4");
    assert_eq!(trace.tool_call(2).unwrap().addresses()[0].to_string(), "2.tool_calls.2");
    assert!(matches!(
        trace.message(6),
        Err(TracecheckError::OutOfRange { index: 6, len: 6 })
    ));
    assert!(matches!(
        trace.tool_output(2),
        Err(TracecheckError::OutOfRange { index: 2, len: 2 })
    ));
}

#[test]
fn test_selected_fields_keep_provenance() {
    let trace = weather_trace();
    let answer = trace.message(5).unwrap().field("content").unwrap();
    let answer = answer.as_string().unwrap();
    let city = answer.contains("Geneva").unwrap();
    assert!(city.value());
    assert_eq!(city.addresses()[0].to_string(), "5.content:17-23");
}
