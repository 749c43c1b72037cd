//! vtl-lab CLI - validate and run VTL scripts against a lab backend
//!
//! # Commands
//!
//! ```bash
//! vtl-lab validate script.vtl                          # Print syntax diagnostics
//! vtl-lab run --case case.json                         # Run a case synchronously
//! vtl-lab run --case case.json --context spark-local   # ... on another context
//! vtl-lab submit --script s.vtl --bindings b.json      # Submit a job and poll it
//! vtl-lab suggestions http://host/structure.json       # List variable suggestions
//! ```
//!
//! Backend settings come from `VTL_LAB_*` environment variables (or `.env`).
//! Logs go to stderr; set `RUST_LOG` to change the level.

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vtl_lab::diagnostics::fetch_suggestions;
use vtl_lab::models::bindings_from_str;
use vtl_lab::{
    Backend, CaseConfig, ExecutionContext, Grammar, HttpTransport, LabConfig, Outcome, Session,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "vtl-lab")]
#[command(about = "Validate and run VTL scripts against a lab backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a script and print its diagnostics
    Validate {
        /// Script file
        script: PathBuf,
    },

    /// Run a case synchronously
    Run {
        /// Case JSON file
        #[arg(short, long)]
        case: PathBuf,

        /// Execution context (in-memory, spark-local, spark-static, spark-kube)
        #[arg(long, default_value = "in-memory")]
        context: ExecutionContext,

        /// Script file, instead of the case script
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// JSON object of results to persist
        #[arg(long)]
        to_save: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Submit a script as a distributed job and wait for its result
    Submit {
        /// Script file
        #[arg(short, long)]
        script: PathBuf,

        /// JSON object of bindings
        #[arg(short, long)]
        bindings: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the variable suggestions served at a URL
    Suggestions {
        /// Structure document URL
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { script } => cmd_validate(&script),

        Commands::Run {
            case,
            context,
            script,
            to_save,
            output,
        } => {
            cmd_run(
                &case,
                context,
                script.as_deref(),
                to_save.as_deref(),
                output.as_deref(),
            )
            .await
        }

        Commands::Submit {
            script,
            bindings,
            output,
        } => cmd_submit(&script, &bindings, output.as_deref()).await,

        Commands::Suggestions { url } => cmd_suggestions(&url).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_validate(script: &Path) -> CliResult {
    let source = fs::read_to_string(script)?;
    let grammar = Grammar::reference();
    let diagnostics = grammar.validate(&source);

    if diagnostics.is_empty() {
        eprintln!("{}: no syntax errors ({})", script.display(), grammar.id());
        return Ok(());
    }

    for diagnostic in &diagnostics {
        println!("{}:{}", script.display(), diagnostic);
    }
    eprintln!("\n{} diagnostic(s)", diagnostics.len());
    std::process::exit(1);
}

async fn cmd_run(
    case_path: &Path,
    context: ExecutionContext,
    script: Option<&Path>,
    to_save: Option<&Path>,
    output: Option<&Path>,
) -> CliResult {
    let config = LabConfig::from_env()?;
    let case = CaseConfig::from_file(case_path)?;
    let transport = Arc::new(HttpTransport::from_config(&config)?);

    eprintln!("Case: {} ({})", case.label, context);
    let mut session = Session::open_case(&config, Backend::Sync(context), &case, transport).await;

    if let Some(path) = script {
        session.set_script(fs::read_to_string(path)?);
    }
    if let Some(path) = to_save {
        let entries: Map<String, Value> = serde_json::from_str(&fs::read_to_string(path)?)?;
        session.set_to_save(entries);
    }
    eprintln!("   Bindings: {}", session.bindings().keys().cloned().collect::<Vec<_>>().join(", "));

    run_session(&mut session, output).await
}

async fn cmd_submit(script: &Path, bindings: &Path, output: Option<&Path>) -> CliResult {
    let config = LabConfig::from_env()?;
    let transport = Arc::new(HttpTransport::from_config(&config)?);

    let mut session = Session::new(&config, Backend::job(&config), transport);
    session.set_bindings(bindings_from_str(&fs::read_to_string(bindings)?)?);
    session.set_script(fs::read_to_string(script)?);

    run_session(&mut session, output).await
}

async fn run_session(session: &mut Session, output: Option<&Path>) -> CliResult {
    let diagnostics = session.settle_diagnostics().await?;
    for diagnostic in diagnostics {
        eprintln!("   {}", diagnostic);
    }

    session.execute()?;
    match session.run_until_settled().await? {
        Some(Outcome::Success(result)) => {
            let json = serde_json::to_string_pretty(result)?;
            write_output(&json, output)
        }
        Some(Outcome::Failure(message)) => Err(message.clone().into()),
        None => Err("run ended without an outcome".into()),
    }
}

async fn cmd_suggestions(url: &str) -> CliResult {
    let config = LabConfig::from_env()?;
    let transport = HttpTransport::from_config(&config)?;

    let suggestions = fetch_suggestions(&transport, Some(url)).await;
    if suggestions.items.is_empty() {
        eprintln!("No suggestions at {}", url);
    }
    for suggestion in &suggestions.items {
        println!("{}", suggestion.label);
    }
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
