//! Deontica command line
//!
//! `serve` starts the HTTP API, `ingest` indexes a plain-text source, and
//! `ask` runs an interactive question loop in the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deontica_server::backend::{build_pipeline, ServicePipeline};
use deontica_server::config::ServerConfig;
use deontica_server::handlers::AppState;
use deontica_server::{init_tracing, start_server};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "deontica", version, about = "Question answering over the EU AI Act")]
struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,

    /// Chunk, embed and index a plain-text source document
    Ingest {
        /// Text file to ingest
        file: PathBuf,

        /// Source identifier stored with every chunk
        #[arg(long, default_value = "eurlex:ai_act")]
        source_uri: String,

        /// Source version stored with every chunk
        #[arg(long, default_value = "OJ-2024-07-12")]
        source_version: String,
    },

    /// Ask questions interactively; `exit` or `quit` ends the session
    Ask {
        /// Continue an existing thread instead of starting a new one
        #[arg(long)]
        thread_id: Option<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;

    // Blocking HTTP clients must be built outside the async runtime.
    let pipeline = build_pipeline(&config)?;

    match cli.command {
        Command::Serve => serve(pipeline, &config),
        Command::Ingest {
            file,
            source_uri,
            source_version,
        } => ingest(&pipeline, &file, &source_uri, &source_version),
        Command::Ask { thread_id } => ask(&pipeline, thread_id),
    }
}

fn serve(pipeline: ServicePipeline, config: &ServerConfig) -> Result<()> {
    let backend = pipeline.index().kind();
    let state = AppState::new(pipeline, backend.as_str());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(start_server(state, &config.bind_addr()))?;
    Ok(())
}

fn ingest(
    pipeline: &ServicePipeline,
    file: &Path,
    source_uri: &str,
    source_version: &str,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let report = pipeline.ingest(&text, source_uri, source_version)?;
    println!(
        "Ingested {} chunks into the index (doc_id {}, {} upserted)",
        report.chunks, report.doc_id, report.upserted
    );
    Ok(())
}

fn ask(pipeline: &ServicePipeline, thread_id: Option<String>) -> Result<()> {
    let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("Thread {}. Type 'exit' or 'quit' to leave.", thread_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        match pipeline.run(question, &thread_id) {
            Ok(outcome) => {
                println!("\n{}\n", outcome.answer);
                if !outcome.citations.is_empty() {
                    println!("Citations: {}", outcome.citations.join(", "));
                }
                println!("Route: {}\n", outcome.route);
            }
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }
    Ok(())
}
