//! CLI module for the knowledge engine
//!
//! Provides subcommands for operating a knowledge store:
//! - `migrate`: apply or revert the schema migrations
//! - `create-kb`: create a knowledge base
//! - `import`: ingest a file or a text snippet
//! - `search`: full-text search of a knowledge base
//! - `tags`: list the tags of a knowledge base

pub mod knowledge;
pub mod migrate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Knowledge engine - ingestion and retrieval over pgvector
#[derive(Parser)]
#[command(name = "knowledge-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate(MigrateArgs),

    /// Create a knowledge base
    CreateKb(CreateKbArgs),

    /// Import a document into a knowledge base
    Import(ImportArgs),

    /// Full-text search of a knowledge base
    Search(SearchArgs),

    /// List the tags of a knowledge base
    Tags(TagsArgs),
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Revert the latest migration instead of applying
    #[arg(long)]
    pub revert: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Strategy {
    /// Fixed-size chunks split on a separator cascade
    Recursive,
    /// Similarity breakpoints; needs an embedder, which this binary does not ship
    Semantic,
}

#[derive(Args)]
pub struct CreateKbArgs {
    /// Knowledge base id (alphanumeric and hyphens)
    #[arg(long)]
    pub id: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Default chunking strategy of the knowledge base
    ///
    /// `semantic` is recorded for library hosts that register an embedder.
    /// Imports through this binary then fail with EmbeddingUnavailable
    /// unless they pass --chunk-size.
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Embedding model recorded on the knowledge base
    #[arg(long, requires = "dimensions")]
    pub embedding_model: Option<String>,

    /// Expected embedding dimensions
    #[arg(long, requires = "embedding_model")]
    pub dimensions: Option<u32>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Target knowledge base id
    #[arg(long)]
    pub kb: String,

    /// File to import; the extension selects the parser
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    pub file: Option<PathBuf>,

    /// Text to import verbatim
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    /// Chunk size in characters; overrides the knowledge base strategy
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunk overlap in characters, used with --chunk-size
    #[arg(long, requires = "chunk_size")]
    pub chunk_overlap: Option<usize>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Knowledge base id
    #[arg(long)]
    pub kb: String,

    /// Query text
    pub query: String,

    /// Number of results; defaults to the configured top_k
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Only chunks carrying one of these tag ids
    #[arg(long = "tag")]
    pub tags: Vec<uuid::Uuid>,
}

#[derive(Args)]
pub struct TagsArgs {
    /// Knowledge base id
    #[arg(long)]
    pub kb: String,
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Migrate(args) => migrate::run(args).await,
        Command::CreateKb(args) => knowledge::create_kb(args).await,
        Command::Import(args) => knowledge::import(args).await,
        Command::Search(args) => knowledge::search(args).await,
        Command::Tags(args) => knowledge::tags(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_requires_a_source() {
        assert!(Cli::try_parse_from(["knowledge-engine", "import", "--kb", "docs"]).is_err());
        assert!(
            Cli::try_parse_from([
                "knowledge-engine", "import", "--kb", "docs", "--text", "a", "--file", "a.txt"
            ])
            .is_err()
        );

        let cli =
            Cli::try_parse_from(["knowledge-engine", "import", "--kb", "docs", "--text", "hello"])
                .unwrap();
        assert!(matches!(cli.command, Command::Import(ref args) if args.text.as_deref() == Some("hello")));
    }

    #[test]
    fn test_semantic_strategy_help_mentions_embedder() {
        use clap::CommandFactory;

        let mut command = Cli::command();
        let create_kb = command
            .find_subcommand_mut("create-kb")
            .expect("create-kb subcommand");
        let help = create_kb.render_long_help().to_string();

        assert!(help.contains("embedder"));
        assert!(help.contains("EmbeddingUnavailable"));
        assert!(help.contains("--chunk-size"));
    }

    #[test]
    fn test_search_collects_tags() {
        let tag = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "knowledge-engine", "search", "--kb", "docs", "--tag", &tag, "rust ownership",
        ])
        .unwrap();

        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "rust ownership");
                assert_eq!(args.tags.len(), 1);
                assert!(args.top_k.is_none());
            }
            _ => panic!("expected search"),
        }
    }
}
