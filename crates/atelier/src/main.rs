//! Thin command-line front end: parse arguments, wire the pipeline, print
//! the returned envelope verbatim as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use atelier::config::Settings;
use atelier::execution::{ExecuteOptions, ToolExecutor};
use atelier::observability::logging::init_logging;
use atelier::policy::PolicyEngine;
use atelier::protocol::Envelope;
use atelier::registry::ToolRegistry;
use atelier::storage::ArtifactStore;
use atelier::system_tools;

#[derive(Parser, Debug)]
#[command(name = "atelier", version, about = "Tool invocation middleware for creative-application automation")]
struct Args {
    /// Settings file (defaults to ~/.atelier/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered tools and their input schemas
    List,
    /// Execute one tool and print the resulting envelope
    Run {
        /// Registered tool name
        tool: String,
        /// Inline JSON input payload
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Read the JSON input payload from a file
        #[arg(long)]
        input_file: Option<PathBuf>,
        /// Correlation id echoed into the envelope and the run manifest
        #[arg(long)]
        request_id: Option<String>,
        /// Abort the handler after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => Arc::new(settings),
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.logging);

    let mut registry = ToolRegistry::new();
    if let Err(error) = system_tools::register_system_tools(&mut registry) {
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }
    let registry = Arc::new(registry);

    let executor = ToolExecutor::new(
        registry,
        PolicyEngine::new(settings.policy.clone()),
        ArtifactStore::from_settings(&settings.artifacts),
        settings.clone(),
    );

    match args.command {
        Command::List => {
            let envelope = executor
                .execute(
                    system_tools::LIST_COMMANDS,
                    Value::Object(Default::default()),
                    ExecuteOptions::default(),
                )
                .await;
            print_envelope(&envelope)
        }
        Command::Run {
            tool,
            input,
            input_file,
            request_id,
            timeout_secs,
        } => {
            let payload = match read_input(input, input_file) {
                Ok(payload) => payload,
                Err(message) => {
                    eprintln!("error: {message}");
                    return ExitCode::FAILURE;
                }
            };
            let options = ExecuteOptions {
                request_id,
                trace_id: None,
                timeout: timeout_secs.map(Duration::from_secs),
            };
            let envelope = executor.execute(&tool, payload, options).await;
            print_envelope(&envelope)
        }
    }
}

fn read_input(inline: Option<String>, file: Option<PathBuf>) -> Result<Value, String> {
    let raw = match (inline, file) {
        (Some(raw), _) => raw,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|error| format!("cannot read {}: {error}", path.display()))?,
        (None, None) => "{}".to_string(),
    };
    serde_json::from_str(&raw).map_err(|error| format!("input is not valid JSON: {error}"))
}

fn print_envelope(envelope: &Envelope) -> ExitCode {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => println!("{json}"),
        Err(error) => {
            eprintln!("error: failed to serialize envelope: {error}");
            return ExitCode::FAILURE;
        }
    }
    if envelope.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
