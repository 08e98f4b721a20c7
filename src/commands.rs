use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::{Config, show_config};
use crate::crawler::{CrawlerConfig, WebCrawler};
use crate::embeddings::create_embedder;
use crate::indexer::{BatchStats, IndexManager, ingest_from};
use crate::sources::FileSourceReader;

fn open_index(config: &Config) -> Result<IndexManager> {
    IndexManager::from_config(config).with_context(|| {
        format!(
            "Failed to open index in {}",
            config.get_base_dir().display()
        )
    })
}

fn print_batch_stats(stats: &BatchStats) {
    println!("  Sources seen: {}", stats.sources_seen);
    println!("  Ingested: {}", stats.ingested);
    println!("  Unchanged: {}", stats.skipped);
    println!("  Failed: {}", stats.failed);
    println!("  Chunks added: {}", stats.chunks_added);
}

/// Write a default configuration file, or print the effective one
#[inline]
pub fn configure(data_dir: &Path, show: bool) -> Result<()> {
    if show {
        return show_config(data_dir);
    }

    let config = Config::load(data_dir)?;
    let path = config.config_file_path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
    } else {
        config.save()?;
        println!("Wrote default configuration to {}", path.display());
    }
    Ok(())
}

/// Ingest every file in a directory
#[inline]
pub async fn ingest_directory(config: &Config, directory: Option<PathBuf>) -> Result<()> {
    let directory = directory
        .or_else(|| config.storage.documents_dir.clone())
        .ok_or_else(|| anyhow!("No directory given and storage.documents_dir is not set"))?;

    let mut manager = open_index(config)?.with_documents_dir(Some(directory.clone()));
    let mut reader = FileSourceReader::new(&directory)
        .with_context(|| format!("Failed to read {}", directory.display()))?;

    info!("Ingesting files from {}", directory.display());
    let stats = ingest_from(&mut reader, &mut manager).await?;

    println!("Ingested {}", directory.display());
    print_batch_stats(&stats);
    manager.close()?;
    Ok(())
}

/// Crawl a site and ingest every page fetched
#[inline]
pub async fn crawl_site(
    config: &Config,
    url: &str,
    max_pages: Option<usize>,
    max_depth: Option<usize>,
) -> Result<()> {
    let crawler_config = CrawlerConfig {
        max_pages: max_pages.unwrap_or(config.crawler.max_pages),
        max_depth: max_depth.unwrap_or(config.crawler.max_depth),
        ..config.crawler.clone()
    };

    let mut manager = open_index(config)?;
    let mut crawler = WebCrawler::new(url, crawler_config)?;
    let stats = ingest_from(&mut crawler, &mut manager).await?;
    let crawl_stats = crawler.stats();

    println!("Crawl of {} completed", url);
    println!("  URLs discovered: {}", crawl_stats.discovered_urls);
    println!("  Pages fetched: {}", crawl_stats.successful_crawls);
    println!("  Pages failed: {}", crawl_stats.failed_crawls);
    print_batch_stats(&stats);
    manager.close()?;
    Ok(())
}

/// Print the chunks nearest to a query
#[inline]
pub fn search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let manager = open_index(config)?;
    let hits = manager.search(query, limit)?;

    if hits.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} [chunk {}] distance {:.4}",
            rank + 1,
            hit.record.source_id,
            hit.record.position,
            hit.distance
        );
        println!("   {}", hit.record.text);
    }
    Ok(())
}

/// Remove a source and all of its chunks
#[inline]
pub fn delete_source(config: &Config, source_id: &str) -> Result<()> {
    let mut manager = open_index(config)?;

    if manager.delete(source_id)?.deleted {
        println!("Deleted {}", source_id);
    } else {
        println!("Source not found: {}", source_id);
    }
    Ok(())
}

/// List indexed sources
#[inline]
pub fn list_sources(config: &Config) -> Result<()> {
    let manager = open_index(config)?;
    let sources = manager.list_sources();

    if sources.is_empty() {
        println!("No sources have been indexed yet.");
        println!("Use 'memory-index ingest <dir>' or 'memory-index crawl <url>' to add some.");
        return Ok(());
    }

    println!("Indexed sources ({} total):", sources.len());
    for source in &sources {
        match source.last_modified {
            Some(modified) => println!(
                "  {} ({} chunks, modified {})",
                source.source_id,
                source.chunk_count,
                modified.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => println!("  {} ({} chunks)", source.source_id, source.chunk_count),
        }
    }
    Ok(())
}

/// Print index statistics
#[inline]
pub fn show_stats(config: &Config) -> Result<()> {
    let manager = open_index(config)?;
    let stats = manager.stats();

    println!("Index: {}", manager.directory().display());
    println!("  Chunks: {}", stats.num_chunks);
    println!("  Sources: {}", stats.num_sources);
    match stats.embedding_dimension {
        Some(dimension) => println!("  Dimension: {}", dimension),
        None => println!("  Dimension: not set"),
    }
    println!("  Index type: {}", stats.index_type);
    println!("  Model: {}", stats.model);
    Ok(())
}

/// Check the alignment of the stored triple
#[inline]
pub fn verify(config: &Config) -> Result<()> {
    let manager = open_index(config)?;
    let report = manager.validate();

    println!("{}", report.summary());
    for source_id in &report.misnumbered_sources {
        println!("  Misnumbered chunks: {}", source_id);
    }
    if !report.uncached_sources.is_empty() {
        println!(
            "  {} sources have no content hash and will be re-embedded on next ingest",
            report.uncached_sources.len()
        );
    }
    if !report.is_consistent {
        println!("Run 'memory-index repair' to rebuild the vector index.");
    }
    Ok(())
}

/// Re-embed every stored chunk into a fresh vector index
#[inline]
pub fn repair(config: &Config) -> Result<()> {
    let mut manager = open_index(config)?;
    let count = manager.repair().context("Repair failed")?;

    println!("Re-embedded {} chunks", count);
    println!("{}", manager.validate().summary());
    Ok(())
}

/// Check that the configured embedding backend answers
#[inline]
pub fn health(config: &Config) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;

    match embedder.health_check() {
        Ok(()) => {
            println!(
                "Embedding backend {:?} is healthy (model {})",
                config.embedding.backend,
                embedder.model_name()
            );
            Ok(())
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(anyhow::Error::from(e).context(format!(
                "Embedding backend {:?} is unhealthy",
                config.embedding.backend
            )))
        }
    }
}
