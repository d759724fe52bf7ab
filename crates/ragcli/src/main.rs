use anyhow::Result;
use clap::{Parser, Subcommand};
use ragcore::{ExecutionEvent, NodeEvent, NodeSpec, NodeStatus, NodeType, Workflow};
use ragnodes::{HttpDocumentIndex, HttpTextGenerator};
use ragruntime::{
    EngineConfig, ExecutionEngine, ExecutorRegistry, MemoryDefinitions, MemoryResults,
    ResultsStore, RunRequest, SqliteResults,
};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rag")]
#[command(about = "RAG workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file against a test input
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Test input message
        #[arg(short, long)]
        input: String,

        /// Stop after this node id (partial run)
        #[arg(long)]
        stop_at: Option<Uuid>,

        /// Base URL of the document index
        #[arg(long, default_value = "http://127.0.0.1:9001")]
        index_url: String,

        /// Base URL of the text-generation provider
        #[arg(long, default_value = "http://127.0.0.1:9002")]
        generation_url: String,

        /// Persist the run to this SQLite database
        #[arg(long)]
        results_db: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List built-in node types
    Nodes,

    /// Create an example five-node RAG workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            stop_at,
            index_url,
            generation_url,
            results_db,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, input, stop_at, index_url, generation_url, results_db).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: PathBuf,
    input: String,
    stop_at: Option<Uuid>,
    index_url: String,
    generation_url: String,
    results_db: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;
    workflow.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("📋 Workflow: {} ({})", workflow.name, workflow.mode);
    println!("   Nodes: {}", workflow.nodes.len());
    println!();

    let mut registry = ExecutorRegistry::new();
    ragnodes::register_builtin(
        &mut registry,
        Arc::new(HttpDocumentIndex::new(index_url)),
        Arc::new(HttpTextGenerator::new(generation_url)),
    );

    let definitions = Arc::new(MemoryDefinitions::new());
    let workflow_id = workflow.id;
    definitions.insert(workflow).await;

    let results: Arc<dyn ResultsStore> = match &results_db {
        Some(path) => Arc::new(SqliteResults::open(path)?),
        None => Arc::new(MemoryResults::new()),
    };

    let engine = ExecutionEngine::new(
        Arc::new(registry),
        definitions,
        results,
        EngineConfig::default(),
    );

    let mut events = engine.event_bus().subscribe();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { .. } => {
                    println!("▶️  Run started");
                }
                ExecutionEvent::NodeStarted { node_type, .. } => {
                    println!("  ⚡ Starting node: {node_type}");
                }
                ExecutionEvent::NodeCompleted { duration_ms, .. } => {
                    println!("  ✅ Node completed in {duration_ms}ms");
                }
                ExecutionEvent::NodeFailed { error, .. } => {
                    println!("  ❌ Node failed: {error}");
                }
                ExecutionEvent::Node { event, .. } => match event {
                    NodeEvent::Info { message } => println!("     ℹ️  {message}"),
                    NodeEvent::Warning { message } => println!("     ⚠️  {message}"),
                },
                ExecutionEvent::RunCompleted {
                    status,
                    total_time_seconds,
                    ..
                } => {
                    println!(
                        "✨ Run finished with status '{}' in {total_time_seconds:.3}s",
                        status.as_str()
                    );
                }
            }
        }
    });

    let result = engine
        .run(RunRequest {
            workflow_id,
            test_input: input,
            stop_at_node: stop_at,
        })
        .await?;

    // Let the event printer drain before the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.id);
    println!("   Status: {}", result.status.as_str());
    println!("   Total time: {:.3}s", result.total_time_seconds);
    if let Some(message) = &result.error_message {
        println!("   Error: {message}");
    }

    println!();
    println!("📤 Execution flow:");
    for record in &result.node_executions {
        let marker = match record.status {
            NodeStatus::Success => "✅",
            NodeStatus::Error => "❌",
        };
        println!(
            "   {marker} {} ({}) — {:.3}s",
            record.node_name, record.node_type, record.processing_time_seconds
        );
        if let Some(error) = &record.error {
            println!("      {error}");
        }
    }

    if !result.final_output.is_empty() {
        println!();
        println!("📦 Final output:");
        println!("{}", serde_json::to_string_pretty(&result.final_output)?);
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;
    workflow.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    for node in workflow.sorted_nodes() {
        println!("   {} — {} ({})", node.position, node.name, node.node_type);
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Built-in node types:");
    println!();
    println!("  • input — validates and truncates the incoming message");
    println!("  • router — keyword-based intent classification (advisory)");
    println!("  • retriever — queries the document index");
    println!("  • generator — calls the text-generation provider");
    println!("  • output — formats the final payload");
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Example RAG Workflow", "rag");
    workflow.description = Some("Retrieval-augmented answer over the default index".to_string());

    let input = workflow.add_node(
        NodeSpec::new(NodeType::Input, 0)
            .with_name("Intake")
            .with_config("maxLength", 2000i64),
    );
    let router = workflow.add_node(NodeSpec::new(NodeType::Router, 1).with_name("Intent Router"));
    let retriever = workflow.add_node(
        NodeSpec::new(NodeType::Retriever, 2)
            .with_name("Docs Retriever")
            .with_config("maxResults", 5i64),
    );
    let generator = workflow.add_node(
        NodeSpec::new(NodeType::Generator, 3)
            .with_name("Answer Generator")
            .with_config("model", "default")
            .with_config("temperature", 0.7),
    );
    let out = workflow.add_node(NodeSpec::new(NodeType::Output, 4).with_name("Formatter"));

    // Connections are visualization-only; the engine runs nodes by position
    workflow.connect(input, router);
    workflow.connect(router, retriever);
    workflow.connect(retriever, generator);
    workflow.connect(generator, out);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  rag run --file {} --input \"Apa itu RAG?\"",
        output.display()
    );

    Ok(())
}
