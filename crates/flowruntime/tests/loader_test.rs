// crates/flowruntime/tests/loader_test.rs

mod common;

use common::*;
use flowcore::{Direction, FlowError, Flowchart, GraphError, NodeSpec, Position, Value};
use flowruntime::{FlowRuntime, NodeManager, RuntimeConfig};

const CHAIN_JSON: &str = r#"{
    "name": "chain",
    "globals": {"label": {"type": "Text", "value": "from file"}},
    "nodes": [
        {"name": "source", "register": "Test", "node_type": "IntSource",
         "parameters": {"value": {"type": "Int", "value": 4}}},
        {"name": "double", "register": "Test", "node_type": "Doubler",
         "position": {"x": 120.0, "y": 40.0}},
        {"name": "sink", "register": "Test", "node_type": "Sink",
         "marked_inputs": ["value"]}
    ],
    "connections": [
        {"from_node": "source", "from_terminal": "value", "to_node": "double", "to_terminal": "value"},
        {"from_node": "double", "from_terminal": "value", "to_node": "sink", "to_terminal": "value"}
    ]
}"#;

fn location(err: FlowError) -> String {
    match err {
        FlowError::MalformedDescription { location, .. } => location,
        other => panic!("expected a malformed description, got {}", other),
    }
}

#[test]
fn test_load_and_run_description() {
    let flowchart = Flowchart::from_json(CHAIN_JSON).unwrap();
    let mut m = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap();

    assert_eq!(m.len(), 3);
    assert_eq!(m.connection_count(), 2);
    assert_eq!(m.globals().get("label"), Some(&Value::Text("from file".into())));

    let double = m.node("double").unwrap();
    assert_eq!(m.position(double).unwrap(), Some(Position { x: 120.0, y: 40.0 }));
    let sink = m.node("sink").unwrap();
    assert!(m.input(sink, "value").unwrap().is_marked());

    m.run_all(false).unwrap();
    assert_eq!(m.input(sink, "value").unwrap().value(), Some(&Value::Int(8)));
}

#[test]
fn test_unknown_node_type_fails() {
    let mut flowchart = Flowchart::new("bad");
    flowchart.add_node(NodeSpec::new("x", TEST_REGISTER, "Teleporter"));

    let err = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap_err();

    assert!(matches!(err, FlowError::Graph(GraphError::UnknownNodeType { .. })));
}

#[test]
fn test_connection_to_unknown_node_names_the_connection() {
    let mut flowchart = Flowchart::new("bad");
    flowchart.add_node(NodeSpec::new("source", TEST_REGISTER, "IntSource"));
    flowchart.connect("source", "value", "ghost", "value");

    let err = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap_err();

    let location = location(err);
    assert!(location.contains("connection #0"), "location was {}", location);
    assert!(location.contains("ghost"));
}

#[test]
fn test_cyclic_description_is_malformed() {
    let mut flowchart = Flowchart::new("loop");
    flowchart.add_node(NodeSpec::new("a", TEST_REGISTER, "Doubler"));
    flowchart.add_node(NodeSpec::new("b", TEST_REGISTER, "Doubler"));
    flowchart.connect("a", "value", "b", "value");
    flowchart.connect("b", "value", "a", "value");

    let err = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap_err();

    assert!(location(err).starts_with("connection #1"));
}

#[test]
fn test_duplicate_node_names_are_malformed() {
    let mut flowchart = Flowchart::new("twins");
    flowchart.add_node(NodeSpec::new("same", TEST_REGISTER, "IntSource"));
    flowchart.add_node(NodeSpec::new("same", TEST_REGISTER, "Sink"));

    let err = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap_err();

    assert_eq!(location(err), "node 'same'");
}

#[test]
fn test_marking_missing_terminal_is_malformed() {
    let mut flowchart = Flowchart::new("marks");
    flowchart.add_node(NodeSpec::new("source", TEST_REGISTER, "IntSource").mark_output("nope"));

    let err = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap_err();

    assert_eq!(location(err), "node 'source'");
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.json");

    let mut m = manager();
    m.set_global("who", "tester");
    let src = m.create_node(TEST_REGISTER, "IntSource").unwrap();
    let sink = m.create_node(TEST_REGISTER, "Sink").unwrap();
    m.name_node(src, "source").unwrap();
    m.set_parameter(src, "value", 11i64).unwrap();
    m.set_position(sink, Position { x: 1.0, y: 2.0 }).unwrap();
    m.mark_terminal(src, Direction::Output, "value", true).unwrap();
    m.connect(src, "value", sink, "value").unwrap();

    flowruntime::save_path(&m, "saved", &path).unwrap();

    let mut reloaded = manager();
    let handles = flowruntime::load_path(&mut reloaded, &path).unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(reloaded.dump_connections(), m.dump_connections());
    assert_eq!(reloaded.globals(), m.globals());

    let src = reloaded.node("source").unwrap();
    let sink = reloaded.node("Sink1").unwrap();
    assert_eq!(reloaded.params(src).unwrap().get("value"), Some(&Value::Int(11)));
    assert!(reloaded.output(src, "value").unwrap().is_marked());
    assert_eq!(reloaded.position(sink).unwrap(), Some(Position { x: 1.0, y: 2.0 }));

    reloaded.run_all(false).unwrap();
    assert_eq!(reloaded.input(sink, "value").unwrap().value(), Some(&Value::Int(11)));
}

#[test]
fn test_unregistered_nodes_are_not_saved() {
    let mut m = manager();
    let src = m.create_node(TEST_REGISTER, "IntSource").unwrap();
    let (counting, _) = Counting::new();
    let extra = m.add_node(Box::new(counting));
    m.connect(src, "value", extra, "a").unwrap();

    let flowchart = m.to_flowchart("partial");

    assert_eq!(flowchart.nodes.len(), 1);
    assert_eq!(flowchart.nodes[0].name, "IntSource0");
    assert!(flowchart.connections.is_empty());
}

#[test]
fn test_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();

    let err = flowruntime::read_flowchart(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, FlowError::Io(_)));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    let err = flowruntime::read_flowchart(&broken).unwrap_err();
    assert!(location(err).ends_with("broken.json"));
}

#[test]
fn test_runtime_globals_override_description() {
    let mut globals = flowcore::Globals::new();
    globals.set("label", "from config");
    let runtime = FlowRuntime::with_config(
        test_registry(),
        RuntimeConfig {
            globals,
            ..RuntimeConfig::default()
        },
    );
    let mut events = runtime.subscribe_events();

    let flowchart = Flowchart::from_json(CHAIN_JSON).unwrap();
    let mut m = runtime.load(&flowchart).unwrap();
    assert_eq!(m.substitute_globals("{{label}}"), "from config");

    m.run_all(false).unwrap();
    assert!(events.try_recv().is_ok(), "Managers publish on the runtime's bus");
}

#[test]
fn test_description_roundtrips_through_json_value() {
    let flowchart = Flowchart::from_json(CHAIN_JSON).unwrap();
    let m = NodeManager::from_flowchart(test_registry(), &flowchart).unwrap();

    let saved: serde_json::Value = serde_json::from_str(&m.to_flowchart("chain").to_json().unwrap()).unwrap();

    assert_eq!(saved["name"], "chain");
    assert_eq!(saved["nodes"].as_array().map(Vec::len), Some(3));
    assert_eq!(saved["nodes"][0]["parameters"]["value"]["value"], 4);
    assert_eq!(saved["nodes"][2]["marked_inputs"][0], "value");
    assert_eq!(saved["connections"][1]["to_node"], "sink");
}

#[test]
fn test_manager_globals_win_over_description() {
    let mut flowchart = Flowchart::from_json(CHAIN_JSON).unwrap();
    flowchart.globals.set("extra", 3i64);
    let mut m = manager();
    m.set_global("label", "already set");

    flowruntime::load_flowchart(&mut m, &flowchart).unwrap();

    assert_eq!(m.globals().get("label"), Some(&Value::Text("already set".into())));
    assert_eq!(m.globals().get("extra"), Some(&Value::Int(3)));
}
