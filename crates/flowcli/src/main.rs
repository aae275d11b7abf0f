// crates/flowcli/src/main.rs

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{
    ComponentRole, ComponentSpecifier, DocumentFormat, FlowDocument, FlowGraph, FlowLink,
    FlowNode, Sockets, ThreadEvent, ThreadEventKind, ThreadStatus, Value,
};
use flowruntime::{FlowRuntime, RuntimeConfig, StaticReferenceResolver};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow runtime CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow document
    Run {
        /// Path to a JSON or YAML flow document
        #[arg(short, long)]
        file: PathBuf,

        /// Flow inputs as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Variable available to `$fromVariable` references (NAME=VALUE)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Secret available to `$fromSecret` references (NAME=VALUE)
        #[arg(long = "secret", value_name = "NAME=VALUE")]
        secrets: Vec<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow document
    Validate {
        /// Path to a JSON or YAML flow document
        file: PathBuf,
    },

    /// Convert a flow document between JSON and YAML
    Convert {
        #[arg(short, long)]
        file: PathBuf,

        /// Output path; the format follows its extension
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List available components
    Components,

    /// Create a new example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            file,
            input,
            vars,
            secrets,
            ..
        } => {
            run_flow(&file, input, &vars, &secrets).await?;
        }

        Commands::Validate { file } => {
            validate_flow(&file).await?;
        }

        Commands::Convert { file, output } => {
            convert_flow(&file, &output)?;
        }

        Commands::Components => {
            list_components();
        }

        Commands::Init { output } => {
            create_example_flow(&output)?;
        }
    }

    Ok(())
}

fn runtime() -> FlowRuntime {
    FlowRuntime::with_registry(flownodes::standard_registry(), RuntimeConfig::default())
}

fn load(file: &Path) -> Result<FlowGraph> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let document = FlowDocument::decode(&text, DocumentFormat::from_path(file))?;
    let graph = document.into_graph()?;
    tracing::debug!("Loaded {} nodes from {}", graph.len(), file.display());
    Ok(graph)
}

/// `NAME=VALUE`, where VALUE is JSON when it parses and a string otherwise.
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", raw))?;
    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Prompts on stdin for input nodes that would otherwise starve.
async fn prompt_missing_inputs(
    runtime: &FlowRuntime,
    graph: &FlowGraph,
    inputs: &mut Sockets,
) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    read_missing_inputs(runtime, graph, inputs, &mut stdin, &mut stdout).await
}

async fn read_missing_inputs<R, W>(
    runtime: &FlowRuntime,
    graph: &FlowGraph,
    inputs: &mut Sockets,
    reader: &mut R,
    prompt: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    for node in graph.nodes() {
        let component = runtime.component(&node.component).await;
        if component.role != ComponentRole::Input {
            continue;
        }
        let name = node
            .static_input("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| node.name.clone())
            .unwrap_or_else(|| node.id.clone());
        let has_default = node.inputs.contains_key("default")
            || component
                .inputs
                .get("default")
                .is_some_and(|s| s.default.is_some());
        if inputs.contains_key(&name) || has_default {
            continue;
        }

        prompt
            .write_all(format!("  ⌨️  Value for '{}': ", name).as_bytes())
            .await?;
        prompt.flush().await?;
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            bail!("No value given for input '{}'", name);
        }
        let (_, value) = parse_assignment(&format!("{}={}", name, line.trim()))?;
        inputs.insert(name, value);
    }
    Ok(())
}

fn print_event(event: &ThreadEvent) {
    match &event.kind {
        ThreadEventKind::Start { .. } => println!("▶️  Thread {} started", event.thread_id),
        ThreadEventKind::Input { name, value } => println!("  ⌨️  Input {} = {}", name, value),
        ThreadEventKind::NodeStart { node_id, .. } => println!("  ⚡ Starting node: {}", node_id),
        ThreadEventKind::NodeTrace { node_id, data } => {
            println!("     ℹ️  [{}] {}", node_id, data)
        }
        ThreadEventKind::NodeError { node_id, error } => {
            println!("  ❌ Node {} failed: {}", node_id, error)
        }
        ThreadEventKind::NodeEnd { node_id, .. } => println!("  ✅ Node {} completed", node_id),
        ThreadEventKind::Output { name, value } => println!("  📤 Output {} = {}", name, value),
        ThreadEventKind::Error { message } => println!("  💥 {}", message),
        ThreadEventKind::Abort => println!("⏹️  Thread aborted"),
        ThreadEventKind::End { status, .. } => println!("✨ Thread finished: {:?}", status),
    }
}

async fn run_flow(
    file: &Path,
    input: Option<String>,
    vars: &[String],
    secrets: &[String],
) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());
    let graph = load(file)?;
    println!("   Nodes: {}", graph.len());
    println!("   Links: {}", graph.links().len());
    println!();

    let mut inputs = match input {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw)? {
            serde_json::Value::Object(object) => object
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
            _ => bail!("Input must be a JSON object"),
        },
        None => Sockets::new(),
    };

    let mut references = StaticReferenceResolver::new();
    for raw in vars {
        let (name, value) = parse_assignment(raw)?;
        references = references.with_variable(name, value);
    }
    for raw in secrets {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", raw))?;
        references = references.with_secret(name, value);
    }
    let runtime = runtime().with_references(references);

    prompt_missing_inputs(&runtime, &graph, &mut inputs).await?;

    let thread = runtime.create_thread(&graph).await?;
    let mut events = thread.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
            if matches!(
                event.kind,
                ThreadEventKind::End { .. } | ThreadEventKind::Abort
            ) {
                break;
            }
        }
    });

    let outcome = thread.run(inputs).await?;
    let _ = printer.await;

    println!();
    println!("📊 Outputs:");
    println!("{}", serde_json::to_string_pretty(&outcome.outputs)?);

    if outcome.status != ThreadStatus::Completed {
        for (node_id, error) in &outcome.errors {
            eprintln!("   {}: {}", node_id, error);
        }
        bail!("Flow finished with status {:?}", outcome.status);
    }
    Ok(())
}

async fn validate_flow(file: &Path) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let graph = load(file)?;
    let runtime = runtime();

    let mut unavailable = Vec::new();
    for node in graph.nodes() {
        if !runtime.component(&node.component).await.available() {
            unavailable.push(format!("{} ({})", node.id, node.component));
        }
    }
    // Compiling rejects cycles.
    runtime.create_thread(&graph).await?;

    if !unavailable.is_empty() {
        bail!("Unknown components: {}", unavailable.join(", "));
    }

    println!("✅ Flow is valid:");
    println!("   Nodes: {}", graph.len());
    println!("   Links: {}", graph.links().len());
    Ok(())
}

fn convert_flow(file: &Path, output: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let document = FlowDocument::decode(&text, DocumentFormat::from_path(file))?;
    // Round-trip through the graph so invalid documents are not written.
    let document = document.into_graph()?.to_document();
    std::fs::write(output, document.encode(DocumentFormat::from_path(output))?)?;
    println!("✨ Converted {} to {}", file.display(), output.display());
    Ok(())
}

fn list_components() {
    println!("📦 Available Components:");
    println!();

    for descriptor in flownodes::standard_registry().descriptors() {
        println!("  • {} ({})", descriptor.kind, descriptor.metadata.category);
        println!("    {}", descriptor.metadata.description);
    }
}

fn example_flow() -> Result<FlowGraph> {
    let spec = |s: &str| s.parse::<ComponentSpecifier>();
    let mut graph = FlowGraph::new();

    graph.add_node(
        FlowNode::new("a", spec("core:input")?)
            .with_name("a")
            .with_position(100.0, 100.0),
    )?;
    graph.add_node(
        FlowNode::new("b", spec("core:input")?)
            .with_name("b")
            .with_input("default", Value::Number(2.0))
            .with_position(100.0, 250.0),
    )?;
    graph.add_node(FlowNode::new("sum", spec("math:add")?).with_position(300.0, 175.0))?;
    graph.add_node(
        FlowNode::new("result", spec("core:output")?).with_position(500.0, 175.0),
    )?;

    graph.create_link(FlowLink::new("a", "value", "sum", "a"))?;
    graph.create_link(FlowLink::new("b", "value", "sum", "b"))?;
    graph.create_link(FlowLink::new("sum", "result", "result", "value"))?;
    graph.set_meta_value("title", Value::from("Example flow"));
    Ok(graph)
}

fn create_example_flow(output: &Path) -> Result<()> {
    let document = example_flow()?.to_document();
    std::fs::write(output, document.encode(DocumentFormat::from_path(output))?)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --input '{{\"a\": 40}}'",
        output.display()
    );

    Ok(())
}
