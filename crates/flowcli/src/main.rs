use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{ExecutionEvent, Flowchart, Globals, NodeSpec, Terminal, Value};
use flowruntime::{FlowRuntime, NodeManager, RuntimeConfig};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flowchart engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flowchart file
    Run {
        /// Path to flowchart JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Global parameter as name=value, may be repeated
        #[arg(short, long = "global", value_parser = parse_global)]
        globals: Vec<(String, Value)>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flowchart file
    Validate {
        /// Path to flowchart JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example flowchart
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flowchart.json")]
        output: PathBuf,
    },
}

/// `name=value`, where value is read as an int, a float, a bool or else text
fn parse_global(arg: &str) -> Result<(String, Value), String> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    if name.is_empty() {
        return Err("global name is empty".to_string());
    }
    let value = if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Text(raw.to_string())
    };
    Ok((name.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, globals, verbose } => {
            // Initialize logging
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_flowchart(file, globals.into_iter().collect())?;
        }

        Commands::Validate { file } => {
            validate_flowchart(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_flowchart(output)?;
        }
    }

    Ok(())
}

fn runtime(globals: Globals) -> FlowRuntime {
    let config = RuntimeConfig {
        globals,
        ..RuntimeConfig::default()
    };
    FlowRuntime::with_config(Arc::new(flownodes::core_registry()), config)
}

fn run_flowchart(file: PathBuf, globals: Globals) -> Result<()> {
    println!("🚀 Loading flowchart from: {}", file.display());

    let flowchart = flowruntime::read_flowchart(&file)?;
    println!("📋 Flowchart: {}", flowchart.name);
    println!("   Nodes: {}", flowchart.nodes.len());
    println!("   Connections: {}", flowchart.connections.len());
    println!();

    let runtime = runtime(globals);
    let mut events = runtime.subscribe_events();
    let mut manager = runtime
        .load(&flowchart)
        .with_context(|| format!("Cannot load {}", file.display()))?;

    let result = manager.run_all(false);

    // Runs are synchronous, every event is already queued
    while let Ok(event) = events.try_recv() {
        match event {
            ExecutionEvent::RunStarted { targets, .. } => {
                println!("▶️  Run started over {} nodes", targets);
            }
            ExecutionEvent::NodeStarted { node, node_type, .. } => {
                println!("  ⚡ Starting node: {} ({})", node, node_type);
            }
            ExecutionEvent::NodeCompleted { node, duration_ms, .. } => {
                println!("  ✅ Node {} completed in {}ms", node, duration_ms);
            }
            ExecutionEvent::NodeFailed { node, error, .. } => {
                println!("  ❌ Node {} failed: {}", node, error);
            }
            ExecutionEvent::NodeSkipped { node, .. } => {
                println!("  ⏸️  Node {} is missing input data", node);
            }
            ExecutionEvent::RunCompleted { success, duration_ms, .. } => {
                if success {
                    println!("✨ Run completed successfully in {}ms", duration_ms);
                } else {
                    println!("💥 Run failed after {}ms", duration_ms);
                }
            }
        }
    }

    let report = result?;
    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", report.run_id);
    println!("   Executed: {}/{} nodes", report.executed.len(), manager.len());
    if !report.skipped.is_empty() {
        println!("   Skipped: {}", report.skipped.join(", "));
    }

    print_sink_outputs(&manager)?;
    Ok(())
}

/// Print the outputs of nodes nothing else consumes
fn print_sink_outputs(manager: &NodeManager) -> Result<()> {
    let feeding: HashSet<String> = manager
        .dump_connections()
        .into_iter()
        .map(|c| c.from_node)
        .collect();

    println!();
    println!("📤 Outputs:");
    for handle in manager.nodes() {
        let name = manager.name(handle)?;
        if feeding.contains(name) {
            continue;
        }
        println!("   {} [{:?}]", name, manager.status(handle)?);
        for terminal in manager.outputs(handle)?.iter().filter(|t| t.has_data()) {
            println!("     {}: {}", terminal.name(), describe(terminal));
        }
    }
    Ok(())
}

fn describe(terminal: &Terminal) -> String {
    let show = |values: &[Option<Value>]| -> String {
        if !terminal.is_vector() {
            return values
                .first()
                .cloned()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
        }
        let items: Vec<String> = values
            .iter()
            .map(|v| v.as_ref().map(Value::to_string).unwrap_or_else(|| "-".to_string()))
            .collect();
        format!("[{}]", items.join(", "))
    };

    if terminal.is_poly() {
        let subs: Vec<String> = terminal
            .sub_terminals()
            .iter()
            .map(|s| format!("{} = {}", s.name(), show(s.values())))
            .collect();
        format!("{{{}}}", subs.join("; "))
    } else {
        show(terminal.values())
    }
}

fn validate_flowchart(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flowchart: {}", file.display());

    let flowchart = flowruntime::read_flowchart(&file)?;
    let manager = runtime(Globals::new())
        .load(&flowchart)
        .with_context(|| format!("Invalid flowchart {}", file.display()))?;

    println!("✅ Flowchart is valid:");
    println!("   Name: {}", flowchart.name);
    println!("   Nodes: {}", manager.len());
    println!("   Connections: {}", manager.connection_count());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");

    let registry = flownodes::core_registry();
    for register_name in registry.register_names() {
        let Some(register) = registry.register(&register_name) else {
            continue;
        };
        println!();
        println!("  {}", register_name);
        for node_type in register.list_node_types() {
            if let Some(metadata) = register.get_metadata(&node_type) {
                println!("  • {} ({})", node_type, metadata.category);
                println!("    {}", metadata.description);
            } else {
                println!("  • {}", node_type);
            }
        }
    }
}

fn create_example_flowchart(output: PathBuf) -> Result<()> {
    let mut flowchart = Flowchart::new("Example Flowchart");
    flowchart.description = Some("Greets someone and writes the greeting to a file".to_string());
    flowchart.globals.set("name", "world");

    let register = flownodes::CORE_REGISTER;
    flowchart.add_node(
        NodeSpec::new("Greeting", register, "Text")
            .with_param("value", "Hello {{name}}!")
            .with_position(100.0, 100.0),
    );
    flowchart.add_node(NodeSpec::new("Show", register, "Print").with_position(300.0, 100.0));
    flowchart.add_node(
        NodeSpec::new("Save", register, "TextWriter")
            .with_param("filepath", "out/greeting.txt")
            .with_position(500.0, 100.0),
    );

    flowchart.connect("Greeting", "value", "Show", "value");
    flowchart.connect("Show", "text", "Save", "text");

    std::fs::write(&output, flowchart.to_json()?)?;

    println!("✨ Created example flowchart: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flow run --file {} --global name=you", output.display());

    Ok(())
}
