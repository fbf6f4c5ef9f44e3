use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use flowcore::{ActivitySpec, AuditEvent, EventTrigger, Value, WorkflowDefinition};
use flowruntime::{load_file, ExecutionRequest, InstanceStatus, WorkflowEngine};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Workflow dispatch CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a workflow file into an in-memory engine and execute it
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Request arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,

        /// Token sent with the execution request
        #[arg(short, long)]
        token: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Translate a workflow file without deploying it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available activity kinds
    Executors,

    /// Write an example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
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
        Commands::Run { file, args, token, .. } => run_workflow(file, args, token).await?,
        Commands::Validate { file } => validate_workflow(file).await?,
        Commands::Executors => list_executors()?,
        Commands::Init { output } => create_example_workflow(output)?,
    }

    Ok(())
}

fn engine() -> Result<WorkflowEngine> {
    Ok(WorkflowEngine::builder()
        .executors(flownodes::register_all)
        .build()?)
}

fn parse_args(raw: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(raw) = raw else {
        return Ok(HashMap::new());
    };
    match serde_json::from_str::<serde_json::Value>(&raw)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()),
        _ => bail!("Arguments must be a JSON object"),
    }
}

async fn run_workflow(file: PathBuf, args: Option<String>, token: Option<String>) -> Result<()> {
    println!("Loading workflow from: {}", file.display());

    let definition = load_file(&file).await?;
    let arguments = parse_args(args)?;
    tracing::debug!("Request arguments: {:?}", arguments);

    let engine = engine()?;
    let mut audit = engine.subscribe_audit();

    let deployment_id = engine.deploy_workflow(&definition).await?;
    println!("Deployed {} as {}", definition.id, deployment_id);

    let mut request = ExecutionRequest::new(&definition.id).with_arguments(arguments);
    if let Some(token) = token {
        request = request.with_token(token);
    }
    engine.execute(request).await?;

    loop {
        match audit.try_recv() {
            Ok(AuditEvent::ActivityExecuted {
                activity_id,
                activity_kind,
                activity_instance_id,
                ..
            }) => println!("  {} ({}) {}", activity_id, activity_kind, activity_instance_id),
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    println!();
    println!("Instances:");
    for instance in engine.backend().instances().await {
        if instance.workflow_id != definition.id {
            continue;
        }
        let status = match &instance.status {
            InstanceStatus::Running => "running".to_string(),
            InstanceStatus::Completed => "completed".to_string(),
            InstanceStatus::Waiting { messages } => format!("waiting for {}", messages.join(", ")),
            InstanceStatus::Failed { activity_id } => format!("failed at {}", activity_id),
        };
        println!("  {} {}", instance.id, status);
        println!("    executed: {}", instance.executed.join(" -> "));

        let mut names: Vec<_> = instance.variables.keys().collect();
        names.sort();
        for name in names {
            println!("    {} = {}", name, instance.variables[name].to_text());
        }
    }

    Ok(())
}

async fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("Validating workflow: {}", file.display());

    let definition = load_file(&file).await?;
    let graph = engine()?.translate(&definition)?;

    println!("Workflow is valid:");
    println!("   Id: {}", graph.workflow_id);
    println!("   Activities: {}", graph.activities().count());
    println!("   Nodes: {}", graph.node_count());
    println!("   Starts on: {}", graph.start_messages().join(", "));
    if graph.token.is_some() {
        println!("   Requires a request token");
    }

    Ok(())
}

fn list_executors() -> Result<()> {
    println!("Available activity kinds:");
    println!();

    let engine = engine()?;
    let registry = engine.executors();
    for kind in registry.list_kinds() {
        match registry.get_metadata(&kind) {
            Some(metadata) => {
                println!("  {} ({})", kind, metadata.category);
                println!("    {}", metadata.description);
            }
            None => println!("  {}", kind),
        }
    }

    Ok(())
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let workflow = WorkflowDefinition::new("greeting")
        .with_variable("greeting", "Hello")
        .with_activity(
            ActivitySpec::new("greet", "debug")
                .on(EventTrigger::RequestReceived { token: None })
                .with_config("message", "${greeting}, ${event.args.name}"),
        )
        .with_activity(
            ActivitySpec::new("store", "put-shared-data")
                .with_config("namespace", "greetings")
                .with_config("key", "${event.args.name}")
                .with_config("value", "${greet.outputs.message}"),
        );

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flow run --file {} --args '{{\"name\": \"Ada\"}}'", output.display());

    Ok(())
}
