//! CLI module
//!
//! tesvik-rag commands: ingest, parse (offline dry run), query, status

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectedFile, FileCollector, FileType};
use crate::config::RagConfig;
use crate::embedding::{has_api_key, OpenAiEmbedding};
use crate::extractor;
use crate::knowledge::{
    chunk_source, ChunkStore, Chunker, IngestOptions, Ingestor, LocalChunkStore,
};
use crate::parsing::{is_sector_table, parse_sector_table, parse_structure};
use crate::retrieval::{build_system_prompt, HybridRetriever};
use crate::text::char_len;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "tesvik-rag")]
#[command(version, about = "Hybrid RAG over Turkish investment-incentive legislation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse, chunk, embed and store a file or a directory of files
    Ingest {
        /// Single file (.pdf / .txt)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Directory (recursive, respects .gitignore)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Source label (defaults to the file name; single file only)
        #[arg(short, long)]
        source: Option<String>,

        /// Delete the source's previous chunks first
        #[arg(long)]
        replace: bool,

        /// Re-ingest even when the content is unchanged
        #[arg(long)]
        force: bool,
    },

    /// Parse and chunk a file without storing anything
    Parse {
        #[arg(long)]
        file: PathBuf,

        /// Print the chunks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the context for a question
    Query {
        query: String,

        /// Print the full system prompt instead of the bare context
        #[arg(long)]
        prompt: bool,
    },

    /// Show store status
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::from_env();

    match cli.command {
        Commands::Ingest {
            file,
            dir,
            source,
            replace,
            force,
        } => cmd_ingest(&config, file, dir, source, IngestOptions { replace, force }).await,
        Commands::Parse { file, json } => cmd_parse(&config, file, json).await,
        Commands::Query { query, prompt } => cmd_query(&config, &query, prompt).await,
        Commands::Status => cmd_status(&config).await,
    }
}

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "OPENAI_API_KEY is not set.\n\n\
             Setup:\n  \
             export OPENAI_API_KEY=your-api-key\n\n\
             Get a key at: https://platform.openai.com/api-keys"
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// ingest: every collected file becomes one source
async fn cmd_ingest(
    config: &RagConfig,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    source: Option<String>,
    options: IngestOptions,
) -> Result<()> {
    require_api_key()?;

    let collector = FileCollector::with_defaults();
    let files: Vec<CollectedFile> = if let Some(ref path) = file {
        match collector.collect_file(path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] Unsupported or oversized file: {:?}", path);
                return Ok(());
            }
        }
    } else if let Some(ref path) = dir {
        if source.is_some() {
            bail!("--source can only be used with --file");
        }
        collector.collect_directory(path)?
    } else {
        bail!("Either --file or --dir is required");
    };

    if files.is_empty() {
        println!("[!] Nothing to ingest.");
        return Ok(());
    }

    let store: Arc<dyn ChunkStore> = Arc::new(
        LocalChunkStore::open(&config.data_dir)
            .await
            .context("Failed to open chunk store")?,
    );
    let embedder = Arc::new(OpenAiEmbedding::from_env()?);
    let ingestor = Ingestor::new(store, embedder, config.chunk.clone());

    println!("[*] {} files to ingest", files.len());

    let mut failed_files = 0;
    for (i, collected) in files.iter().enumerate() {
        let type_str = match collected.file_type {
            FileType::Text => "TXT",
            FileType::Pdf => "PDF",
        };
        let label = source.clone().unwrap_or_else(|| collected.source_label());
        print!("[{}/{}] [{}] {}... ", i + 1, files.len(), type_str, label);

        match ingestor
            .ingest_file(&collected.path, Some(&label), options)
            .await
        {
            Ok(report) if report.skipped => println!("unchanged"),
            Ok(report) => println!(
                "{}/{} chunks{}",
                report.stored_chunks,
                report.total_chunks,
                if report.failed_chunks > 0 {
                    format!(" ({} failed)", report.failed_chunks)
                } else {
                    String::new()
                }
            ),
            Err(e) => {
                failed_files += 1;
                println!("failed: {:#}", e);
            }
        }
    }

    println!();
    println!(
        "[OK] Done: {} files, {} failed",
        files.len() - failed_files,
        failed_files
    );
    Ok(())
}

/// parse: offline dry run of the parser and chunker
async fn cmd_parse(config: &RagConfig, file: PathBuf, json: bool) -> Result<()> {
    let collected = FileCollector::with_defaults()
        .collect_file(&file)?
        .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {:?}", file))?;
    let label = collected.source_label();

    let content = extractor::extract(&collected.path, collected.file_type).await?;
    let chunks = chunk_source(&Chunker::new(config.chunk.clone()), &label, &content.text);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!("[*] {} ({} chars)", label, char_len(&content.text));

    if is_sector_table(&content.text) {
        println!("    sector records: {}", parse_sector_table(&content.text).len());
    } else {
        let tree = parse_structure(&content.text);
        if !tree.info.name.is_empty() {
            println!("    name: {}", tree.info.name);
        }
        println!(
            "    articles: {}, definitions: {}, annexes: {}",
            tree.articles.len(),
            tree.definitions.len(),
            tree.annexes.len()
        );
        for article in &tree.articles {
            println!(
                "      MADDE {:<10} {} ({} sub-units)",
                article.number,
                truncate_text(&article.title, 60),
                article.subclauses.len()
            );
        }
        for annex in &tree.annexes {
            println!("      {:<16} {}", annex.key, truncate_text(&annex.title, 60));
        }
    }

    let mut per_type: BTreeMap<&str, usize> = BTreeMap::new();
    for chunk in &chunks {
        *per_type.entry(chunk.metadata.unit_type.as_str()).or_default() += 1;
    }
    let longest = chunks.iter().map(|c| char_len(&c.text)).max().unwrap_or(0);

    println!();
    println!("[OK] {} chunks {:?}, longest {} chars", chunks.len(), per_type, longest);
    Ok(())
}

/// query: print the assembled context (or the full system prompt)
async fn cmd_query(config: &RagConfig, query: &str, prompt: bool) -> Result<()> {
    require_api_key()?;

    let store: Arc<dyn ChunkStore> = Arc::new(
        LocalChunkStore::open(&config.data_dir)
            .await
            .context("Failed to open chunk store")?,
    );
    let embedder = Arc::new(OpenAiEmbedding::from_env()?);
    let retriever = HybridRetriever::new(store, embedder, config.retrieval.clone());

    let context = retriever.retrieve(query).await;

    if prompt {
        println!("{}", build_system_prompt(&context));
    } else if context.is_empty() {
        println!("[!] No context found.");
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// status: data directory, API key, chunk counts
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("tesvik-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] Data directory: {}", config.data_dir.display());

    if has_api_key() {
        println!("[OK] API key: set");
    } else {
        println!("[!] API key: not set (export OPENAI_API_KEY=your-key)");
    }

    let store = match LocalChunkStore::open(&config.data_dir).await {
        Ok(store) => store,
        Err(e) => {
            println!("[!] Failed to open chunk store: {:#}", e);
            return Ok(());
        }
    };

    match store.stats() {
        Ok(stats) => {
            println!(
                "[OK] Chunks: {} from {} sources ({})",
                stats.chunk_count,
                stats.source_count,
                format_bytes(stats.total_content_bytes)
            );
        }
        Err(e) => println!("[!] Failed to read stats: {:#}", e),
    }

    match store.vector_count().await {
        Ok(count) => println!("[OK] Vectors: {}", count),
        Err(e) => tracing::debug!("Failed to count vectors: {}", e),
    }

    for entry in store.source_counts().await? {
        println!("     {:<40} {}", entry.source, entry.chunks);
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Single-line, char-safe truncation
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Tanımlar", 10), "Tanımlar");
        assert_eq!(truncate_text("Yatırım teşvik belgesi", 7), "Yatırım...");
        assert_eq!(truncate_text("Amaç\nve kapsam", 20), "Amaç ve kapsam");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["tesvik-rag", "ingest", "--dir", "mevzuat", "--replace"])
            .unwrap();
        match cli.command {
            Commands::Ingest { dir, replace, force, .. } => {
                assert_eq!(dir, Some(PathBuf::from("mevzuat")));
                assert!(replace);
                assert!(!force);
            }
            _ => panic!("expected ingest"),
        }

        let cli = Cli::try_parse_from(["tesvik-rag", "query", "9903 madde 2", "--prompt"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { prompt: true, .. }));
    }
}
