use clap::{Parser, Subcommand};
use memory_index::Result;
use memory_index::commands::{
    configure, crawl_site, delete_source, health, ingest_directory, list_sources, repair, search,
    show_stats, verify,
};
use memory_index::config::{Config, DATA_DIR_ENV};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memory-index")]
#[command(about = "A local retrieval memory: chunk, embed and search your documents")]
#[command(version)]
struct Cli {
    /// Directory holding the index files and config.toml
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest every file in a directory
    Ingest {
        /// Directory to read; defaults to storage.documents_dir
        directory: Option<PathBuf>,
    },
    /// Crawl a site and ingest its pages
    Crawl {
        /// Start URL; only pages under its path are followed
        url: String,
        /// Maximum number of pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
        /// Maximum link depth from the start page
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Search indexed chunks
    Search {
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },
    /// Delete a source and its chunks
    Delete {
        /// Source id as shown by `list`
        source: String,
    },
    /// List indexed sources
    List,
    /// Show index statistics
    Stats,
    /// Check that the vector index and metadata agree
    Verify,
    /// Rebuild the vector index by re-embedding stored chunks
    Repair,
    /// Check the embedding backend
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        configure(&data_dir, show)?;
        return Ok(());
    }

    let config = Config::load(&data_dir)?;
    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest { directory } => {
            ingest_directory(&config, directory).await?;
        }
        Commands::Crawl {
            url,
            max_pages,
            max_depth,
        } => {
            crawl_site(&config, &url, max_pages, max_depth).await?;
        }
        Commands::Search { query, k } => {
            search(&config, &query, k)?;
        }
        Commands::Delete { source } => {
            delete_source(&config, &source)?;
        }
        Commands::List => {
            list_sources(&config)?;
        }
        Commands::Stats => {
            show_stats(&config)?;
        }
        Commands::Verify => {
            verify(&config)?;
        }
        Commands::Repair => {
            repair(&config)?;
        }
        Commands::Health => {
            health(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["memory-index", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::List));
        }
    }

    #[test]
    fn ingest_directory_is_optional() {
        let cli = Cli::try_parse_from(["memory-index", "ingest", "./docs"])
            .expect("should parse");
        if let Commands::Ingest { directory } = cli.command {
            assert_eq!(directory, Some(PathBuf::from("./docs")));
        } else {
            panic!("expected ingest command");
        }

        let cli = Cli::try_parse_from(["memory-index", "ingest"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Ingest { directory: None }));
    }

    #[test]
    fn crawl_command_with_limits() {
        let cli = Cli::try_parse_from([
            "memory-index",
            "crawl",
            "https://example.com/docs/",
            "--max-pages",
            "3",
            "--max-depth",
            "1",
        ])
        .expect("should parse");

        if let Commands::Crawl {
            url,
            max_pages,
            max_depth,
        } = cli.command
        {
            assert_eq!(url, "https://example.com/docs/");
            assert_eq!(max_pages, Some(3));
            assert_eq!(max_depth, Some(1));
        } else {
            panic!("expected crawl command");
        }
    }

    #[test]
    fn search_defaults_to_five_results() {
        let cli = Cli::try_parse_from(["memory-index", "search", "vector index"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Search { k: 5, .. }));

        let cli = Cli::try_parse_from(["memory-index", "search", "q", "-k", "12"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Search { k: 12, .. }));
    }

    #[test]
    fn data_dir_is_global() {
        let cli = Cli::try_parse_from(["memory-index", "stats", "--data-dir", "/tmp/memory"])
            .expect("should parse");

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/memory")));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["memory-index", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["memory-index", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["memory-index", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
