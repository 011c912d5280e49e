use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use talevec::config::verbose_requested;
use talevec::sources::read_documents;
use talevec::{
    build_index, load_index, lookup_character, FsSources, HashingEmbedder, Retriever, State,
};

#[derive(Parser)]
#[command(name = "talevec")]
#[command(version = "0.1")]
#[command(about = "Character profiles from story files via vector retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index story files
    Build {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a character profile as JSON
    Lookup { name: String },
    /// Show the chunks nearest to a free-text query
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// List indexed sources with their chunk counts
    List,
    /// Print the resolved configuration
    Config,
}

fn build_command(state: &State, files: &[PathBuf]) -> Result<()> {
    let documents = read_documents(files).context("Failed to read story files")?;
    let embedder = HashingEmbedder::new(state.dimensions);
    let handle = build_index(&documents, &embedder, state)?;
    println!(
        "Indexed {} chunks from {} files",
        handle.len(),
        documents.len()
    );
    Ok(())
}

fn lookup_command(state: &State, name: &str) -> Result<()> {
    let handle = load_index(state)?;
    let embedder = HashingEmbedder::new(state.dimensions);
    match lookup_character(&handle, &embedder, &FsSources, name, state)
        .with_context(|| format!("Failed to look up '{name}'"))?
    {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("Character '{name}' not found in any story."),
    }
    Ok(())
}

fn search_command(state: &State, query: &str, k: Option<usize>) -> Result<()> {
    let handle = load_index(state)?;
    let embedder = HashingEmbedder::new(state.dimensions);
    let k = k.unwrap_or(state.top_k);
    let hits = Retriever::new(&handle, &embedder).retrieve_hits(query, k)?;

    let output = serde_json::json!({
        "query": query,
        "database_record_count": handle.len(),
        "results": hits,
        "actual_results_count": hits.len(),
        "requested_results_count": k,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn list_command(state: &State) -> Result<()> {
    let handle = load_index(state)?;
    for (source, count) in handle.store().chunk_counts() {
        println!("{source}\t{count}");
    }
    Ok(())
}

fn init_tracing() {
    let default_level = if verbose_requested() { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Cli::parse();
    let state = State::new()?;
    info!(index = %state.index_path.display(), "configuration loaded");

    match args.command {
        Commands::Build { files } => build_command(&state, &files)?,
        Commands::Lookup { name } => lookup_command(&state, &name)?,
        Commands::Search { query, k } => search_command(&state, &query, k)?,
        Commands::List => list_command(&state)?,
        Commands::Config => state.print_config(),
    }
    Ok(())
}
