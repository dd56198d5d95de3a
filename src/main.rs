use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_index::commands::{
    add_documents, clear_index, search, show_config, show_status, write_config,
};
use rag_index::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-index")]
#[command(about = "Chunk, embed and search documents with an exact vector index")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to $RAG_INDEX_HOME or ~/.rag-index)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add documents from a JSON file
    Add {
        /// JSON object keyed by document id with {title, link, content} or [title, link, content] values
        path: PathBuf,
    },
    /// Search the index and print the ranked context
    Search {
        /// Free-text query
        query: String,
        /// Number of results (bounded by the configured max_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Remove every indexed chunk
    Clear,
    /// Show the state of the persisted index
    Status,
    /// Write the configuration file, or print the current configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn load_config(config_dir: Option<PathBuf>) -> Result<Config> {
    let config = match config_dir {
        Some(dir) => Config::load(dir),
        None => Config::load_default(),
    };
    config.context("Failed to load configuration")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir)?;

    match cli.command {
        Commands::Add { path } => add_documents(&config, &path)?,
        Commands::Search { query, k } => search(&config, &query, k)?,
        Commands::Clear => clear_index(&config)?,
        Commands::Status => show_status(&config)?,
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["rag-index", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert_eq!(parsed.config_dir, None);
        }
    }

    #[test]
    fn add_command_with_path() {
        let cli = Cli::try_parse_from(["rag-index", "add", "docs.json"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Add { path } = parsed.command {
                assert_eq!(path, PathBuf::from("docs.json"));
            }
        }
    }

    #[test]
    fn search_command_with_k() {
        let cli = Cli::try_parse_from(["rag-index", "search", "tour Eiffel", "-k", "5"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, k } = parsed.command {
                assert_eq!(query, "tour Eiffel");
                assert_eq!(k, Some(5));
            }
        }
    }

    #[test]
    fn search_command_without_k() {
        let cli = Cli::try_parse_from(["rag-index", "search", "hauteur"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { k, .. } = parsed.command {
                assert_eq!(k, None);
            }
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["rag-index", "clear", "--config-dir", "/tmp/rag"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Clear));
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/rag")));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-index", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn add_requires_path() {
        let cli = Cli::try_parse_from(["rag-index", "add"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["rag-index", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["rag-index", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
