// crates/flownodes/tests/nodes_test.rs

mod common;

use common::*;
use flowcore::{FlowError, NodeError, Value};
use flownodes::CORE_REGISTER;
use serde_json::json;

fn config_error(err: FlowError) -> String {
    match err {
        FlowError::Node {
            source: NodeError::Configuration(message),
            ..
        } => message,
        other => panic!("expected a configuration error, got {}", other),
    }
}

#[test]
fn test_core_register_contents() {
    let register = flownodes::core_register();

    assert_eq!(register.name(), CORE_REGISTER);
    assert_eq!(
        register.list_node_types(),
        vec!["Bool", "Float", "FloatVector", "Int", "IntVector", "Nest", "Print", "Text", "TextWriter"]
    );
    let nest = register.get_metadata("Nest").unwrap();
    assert_eq!(nest.category, "flow");
}

#[test]
fn test_value_nodes_emit_their_parameter() {
    let mut m = manager();
    let int = m.create_node(CORE_REGISTER, "Int").unwrap();
    let float = m.create_node(CORE_REGISTER, "Float").unwrap();
    let flag = m.create_node(CORE_REGISTER, "Bool").unwrap();
    m.set_parameter(int, "value", 7i64).unwrap();
    m.set_parameter(float, "value", 3i64).unwrap();
    m.set_parameter(flag, "value", true).unwrap();

    m.run_all(false).unwrap();

    assert_eq!(m.output(int, "value").unwrap().value(), Some(&Value::Int(7)));
    assert_eq!(m.output(float, "value").unwrap().value(), Some(&Value::Float(3.0)));
    assert_eq!(m.output(flag, "value").unwrap().value(), Some(&Value::Bool(true)));
}

#[test]
fn test_value_node_rejects_wrong_parameter_type() {
    let mut m = manager();
    let int = m.create_node(CORE_REGISTER, "Int").unwrap();

    let err = m.set_parameter(int, "value", "seven").unwrap_err();

    assert!(config_error(err).contains("Int node"));
    assert_eq!(m.params(int).unwrap().get("value"), Some(&Value::Int(0)), "Rejected parameters are not applied");
}

#[test]
fn test_text_node_substitutes_globals() {
    let mut m = manager();
    m.set_global("name", "world");
    let text = m.create_node(CORE_REGISTER, "Text").unwrap();
    m.set_parameter(text, "value", "Hello {{name}}, {{unknown}}").unwrap();

    m.run_all(false).unwrap();

    assert_eq!(
        m.output(text, "value").unwrap().value(),
        Some(&Value::Text("Hello world, {{unknown}}".into()))
    );
}

#[test]
fn test_vector_node_keeps_empty_slots() {
    let mut m = manager();
    let ints_node = m.create_node(CORE_REGISTER, "IntVector").unwrap();
    let floats_node = m.create_node(CORE_REGISTER, "FloatVector").unwrap();
    m.set_parameter(ints_node, "values", json!([1, null, 3])).unwrap();
    m.set_parameter(floats_node, "values", json!([0.5, 2])).unwrap();

    m.run_all(false).unwrap();

    let out = m.output(ints_node, "values").unwrap();
    assert!(out.is_vector());
    assert_eq!(ints(out.values()), vec![Some(1), None, Some(3)]);
    assert_eq!(
        m.output(floats_node, "values").unwrap().values(),
        &[Some(Value::Float(0.5)), Some(Value::Float(2.0))]
    );
}

#[test]
fn test_vector_node_rejects_bad_elements() {
    let mut m = manager();
    let node = m.create_node(CORE_REGISTER, "IntVector").unwrap();

    let err = m.set_parameter(node, "values", json!([1, "two"])).unwrap_err();
    assert!(config_error(err).contains("element 1"));

    let err = m.set_parameter(node, "values", 3i64).unwrap_err();
    assert!(config_error(err).contains("JSON array"));
}

#[test]
fn test_print_feeds_text_writer() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager();
    m.set_global("dir", dir.path().display().to_string());
    let int = m.create_node(CORE_REGISTER, "Int").unwrap();
    let print = m.create_node(CORE_REGISTER, "Print").unwrap();
    let writer = m.create_node(CORE_REGISTER, "TextWriter").unwrap();
    m.set_parameter(int, "value", 42i64).unwrap();
    m.set_parameter(print, "label", "answer").unwrap();
    m.set_parameter(writer, "filepath", "{{dir}}/nested/answer.txt").unwrap();
    m.connect(int, "value", print, "value").unwrap();
    m.connect(print, "text", writer, "text").unwrap();

    m.run_all(false).unwrap();

    let expected = dir.path().join("nested").join("answer.txt");
    assert_eq!(std::fs::read_to_string(&expected).unwrap(), "42");
    assert_eq!(
        m.output(writer, "filepath").unwrap().value(),
        Some(&Value::Text(expected.display().to_string()))
    );
}

#[test]
fn test_text_writer_needs_a_path() {
    let mut m = manager();
    let text = m.create_node(CORE_REGISTER, "Text").unwrap();
    let writer = m.create_node(CORE_REGISTER, "TextWriter").unwrap();
    m.set_parameter(text, "value", "content").unwrap();
    m.connect(text, "value", writer, "text").unwrap();

    let err = m.run_all(false).unwrap_err();

    assert!(config_error(err).contains("empty"));
}
