//! Glyphdex CLI
//!
//! Command-line front end over the two library crates:
//! - `strokes`: resolve stroke data for a glyph through the fallback chain
//! - `tier` / `chunk` / `search` / `metadata`: exercise the lazy catalog

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use glyphdex_catalog::{CatalogConfig, CatalogService, ChunkLoadState};
use glyphdex_strokes::{ResolverConfig, StrokeResolver};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glyphdex")]
#[command(author, version, about = "Glyphdex: glyph catalog and stroke data tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve stroke data for a glyph and print it as JSON.
    Strokes {
        /// The glyph to resolve (may be percent-encoded).
        key: String,
        /// Extra per-key data directories, searched before the defaults.
        #[arg(long = "data-dir")]
        data_dirs: Vec<PathBuf>,
        /// Skip the remote mirrors and rely on local data only.
        #[arg(long)]
        offline: bool,
    },

    /// Load and list one tier of the catalog.
    Tier {
        /// Tier number (grade/level).
        number: u32,
        #[arg(long, default_value = "/api/catalog-chunks")]
        endpoint: String,
    },

    /// Load one chunk and report its state.
    Chunk {
        /// Chunk id.
        id: u32,
        #[arg(long, default_value = "/api/catalog-chunks")]
        endpoint: String,
    },

    /// Search the catalog. Only already-assigned chunks are loaded first.
    Search {
        query: String,
        #[arg(long, default_value = "/api/catalog-chunks")]
        endpoint: String,
        /// Chunks to load before searching.
        #[arg(long = "chunk", default_values_t = vec![1u32, 2, 3])]
        chunks: Vec<u32>,
    },

    /// Show what the catalog endpoint serves, section by section.
    Metadata {
        #[arg(long, default_value = "/api/catalog-chunks")]
        endpoint: String,
        #[arg(long = "chunk", default_values_t = vec![1u32, 2, 3])]
        chunks: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Strokes {
            key,
            data_dirs,
            offline,
        } => cmd_strokes(&key, data_dirs, offline).await,
        Commands::Tier { number, endpoint } => cmd_tier(number, &endpoint).await,
        Commands::Chunk { id, endpoint } => cmd_chunk(id, &endpoint).await,
        Commands::Search {
            query,
            endpoint,
            chunks,
        } => cmd_search(&query, &endpoint, &chunks).await,
        Commands::Metadata { endpoint, chunks } => cmd_metadata(&endpoint, &chunks).await,
    }
}

async fn cmd_strokes(key: &str, data_dirs: Vec<PathBuf>, offline: bool) -> Result<()> {
    let mut config = ResolverConfig::default();
    let defaults = std::mem::take(&mut config.partition_dirs);
    config.partition_dirs = data_dirs.into_iter().chain(defaults).collect();
    if offline {
        config.primary_mirror = None;
        config.secondary_mirror = None;
    }

    let resolver = StrokeResolver::new(config);
    let record = resolver.resolve(key).await;
    if record.is_synthetic {
        eprintln!(
            "{} no real data for {}; showing a generated placeholder",
            "warning:".yellow().bold(),
            record.key
        );
    }
    println!("{}", serde_json::to_string_pretty(record.as_ref())?);
    Ok(())
}

async fn cmd_tier(number: u32, endpoint: &str) -> Result<()> {
    let service = catalog(endpoint);
    let entries = service.ensure_tier(number).await;
    if entries.is_empty() {
        println!("{} tier {number} has no entries", "∅".dimmed());
        return Ok(());
    }
    println!("{}", format!("Tier {number} ({} entries)", entries.len()).bold());
    for entry in entries {
        let meaning = entry.field("meaning").unwrap_or("-");
        println!(
            "  {} {}  U+{}  {}",
            entry.natural_key.green().bold(),
            entry.id.dimmed(),
            entry.external_code,
            meaning
        );
    }
    Ok(())
}

async fn cmd_chunk(id: u32, endpoint: &str) -> Result<()> {
    let service = catalog(endpoint);
    match service.ensure_chunk(id).await {
        Ok(()) => println!("{} chunk {id} loaded", "✓".green().bold()),
        Err(err) => println!("{} chunk {id} failed: {err}", "✗".red().bold()),
    }
    let state = match service.chunk_state(id) {
        ChunkLoadState::Idle => "idle".dimmed(),
        ChunkLoadState::Loading => "loading".yellow(),
        ChunkLoadState::Success => "success".green(),
        ChunkLoadState::Error => "error".red(),
    };
    println!("state: {state}");
    Ok(())
}

async fn cmd_search(query: &str, endpoint: &str, chunks: &[u32]) -> Result<()> {
    let service = catalog(endpoint);
    for &chunk in chunks {
        if let Err(err) = service.ensure_chunk(chunk).await {
            tracing::warn!(chunk, error = %err, "skipping chunk");
        }
    }
    let hits = service.search(query);
    if hits.is_empty() {
        println!("no matches for {}", query.bold());
        return Ok(());
    }
    for (rank, entry) in hits.iter().enumerate() {
        println!(
            "{:>3}. {} (tier {})  {}",
            rank + 1,
            entry.natural_key.green().bold(),
            entry.tier,
            entry.field("meaning").unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_metadata(endpoint: &str, chunks: &[u32]) -> Result<()> {
    let service = catalog(endpoint);
    for &chunk in chunks {
        if let Err(err) = service.ensure_chunk(chunk).await {
            tracing::warn!(chunk, error = %err, "skipping chunk");
        }
    }
    let metadata = service.metadata();
    for section in &metadata.sections {
        println!(
            "{}: {} ({} total)",
            section.key.bold(),
            section.name,
            section
                .total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
    }
    for tier in &metadata.tiers {
        println!("  tier {:>2}: {:>4} entries  {}", tier.number, tier.entry_count, tier.name);
    }
    Ok(())
}

fn catalog(endpoint: &str) -> CatalogService {
    CatalogService::new(CatalogConfig {
        endpoint: endpoint.to_string(),
        ..CatalogConfig::default()
    })
}
