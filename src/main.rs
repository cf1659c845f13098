use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use tracing::{info, warn};

use policyrag::chunker::Chunker;
use policyrag::logging::init_logging;
use policyrag::service::{ComplianceService, QueryRequest};
use policyrag::{DocumentId, Settings};

#[derive(Parser)]
#[command(name = "policyrag")]
#[command(version = "0.1")]
#[command(about = "Answer compliance questions from policy documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration
    Config,
    /// Chunk text read from stdin and print one JSON object per chunk
    Chunk,
    /// Load documents into a fresh index and answer one question
    Ask {
        /// Plain-text policy document (repeatable)
        #[arg(long = "doc", required = true)]
        docs: Vec<PathBuf>,
        /// Number of excerpts to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        query: String,
    },
    /// Serve JSON-lines requests from stdin against one in-memory index
    Session,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SessionRequest {
    Upload {
        name: String,
        text: String,
    },
    Ingest {
        #[serde(alias = "documentId")]
        document_id: u64,
        name: String,
        chunks: Vec<String>,
    },
    Query {
        query: String,
        #[serde(default, alias = "maxResults")]
        max_results: Option<usize>,
    },
    Chat {
        message: String,
    },
    Remove {
        #[serde(alias = "documentId")]
        document_id: u64,
    },
    Stats,
    Health,
    Clear,
}

fn config_command(settings: &Settings) -> Result<()> {
    settings.print_config();
    Ok(())
}

fn chunk_command(settings: &Settings) -> Result<()> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("failed to read text from stdin")?;
    let chunker = Chunker::new(settings.chunk_size, settings.chunk_overlap);
    for preview in chunker.preview(&text) {
        println!("{}", serde_json::to_string(&preview)?);
    }
    Ok(())
}

fn ask_command(
    settings: &Settings,
    docs: &[PathBuf],
    top_k: Option<usize>,
    query: &str,
) -> Result<()> {
    let service = ComplianceService::from_settings(settings);
    for path in docs {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let receipt = service
            .upload(&name, &text)
            .with_context(|| format!("failed to upload {}", path.display()))?;
        info!(document = %name, chunks = receipt.chunks_created, "loaded document");
    }

    let mut request = QueryRequest::new(query);
    request.max_results = top_k;
    let response = service.query(&request);
    println!("{}", serde_json::to_string(&response)?);
    if !response.is_success() {
        anyhow::bail!("query rejected: {}", response.answer);
    }
    Ok(())
}

fn session_command(settings: &Settings) -> Result<()> {
    let service = ComplianceService::from_settings(settings);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<SessionRequest>(&line) {
            Ok(request) => handle_request(&service, request)?,
            Err(e) => {
                warn!(error = %e, "malformed session request");
                serde_json::json!({ "status": "error", "message": format!("Invalid request: {}", e) })
            }
        };
        println!("{}", serde_json::to_string(&response)?);
    }
    Ok(())
}

fn handle_request(service: &ComplianceService, request: SessionRequest) -> Result<serde_json::Value> {
    let value = match request {
        SessionRequest::Upload { name, text } => match service.upload(&name, &text) {
            Ok(receipt) => serde_json::to_value(receipt)?,
            Err(e) => serde_json::json!({ "status": "error", "message": e.to_string() }),
        },
        SessionRequest::Ingest {
            document_id,
            name,
            chunks,
        } => serde_json::to_value(service.ingest(DocumentId(document_id), &name, &chunks))?,
        SessionRequest::Query { query, max_results } => {
            let mut request = QueryRequest::new(query);
            request.max_results = max_results;
            serde_json::to_value(service.query(&request))?
        }
        SessionRequest::Chat { message } => serde_json::to_value(service.chat(&message))?,
        SessionRequest::Remove { document_id } => {
            serde_json::to_value(service.remove(DocumentId(document_id)))?
        }
        SessionRequest::Stats => serde_json::to_value(service.stats())?,
        SessionRequest::Health => serde_json::to_value(service.health())?,
        SessionRequest::Clear => {
            service.clear();
            serde_json::json!({ "status": "success" })
        }
    };
    Ok(value)
}

fn main() -> Result<()> {
    init_logging();
    let args = Cli::parse();
    let settings = Settings::load()?;

    match args.command {
        Commands::Config => config_command(&settings)?,
        Commands::Chunk => chunk_command(&settings)?,
        Commands::Ask { docs, top_k, query } => ask_command(&settings, &docs, top_k, &query)?,
        Commands::Session => session_command(&settings)?,
    }
    Ok(())
}
