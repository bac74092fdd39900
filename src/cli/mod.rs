//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rfpqa",
    version,
    about = "Question answering over RFP requirement sheets",
    long_about = "rfpqa stores requirement rows extracted from RFP uploads, embeds them, and answers \
                  natural-language questions with cited sources. Without a configured embedding or \
                  chat backend it falls back to keyword search."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/rfpqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import documents and their requirement rows from a JSON file
    Ingest {
        /// JSON file with one document object or an array of them
        file: PathBuf,
    },

    /// Embed every stored requirement that has no vector yet
    Embed,

    /// Ask a question over the stored requirements
    Ask {
        question: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Number of ranked requirements used as context
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Sampling temperature in [0, 1]
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum answer length in tokens
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a follow-up using earlier questions and answers
    FollowUp {
        question: String,

        /// JSON file holding an array of {"question", "answer"} turns
        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ranked requirements without generating an answer
    Search {
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[command(flatten)]
        filters: FilterArgs,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete a document with its requirements and embeddings
    DeleteDocument {
        /// Document id
        id: String,
    },

    /// Show store statistics
    Stats,

    /// List starter questions
    Suggest,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Hard pre-filters shared by the query commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Restrict to a product (repeatable)
    #[arg(long = "product", value_name = "PRODUCT")]
    pub products: Vec<String>,

    /// Restrict to a response category (repeatable)
    #[arg(long = "response-category", value_name = "CATEGORY")]
    pub response_categories: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_arguments() {
        let cli = Cli::parse_from([
            "rfpqa",
            "--profile",
            "offline",
            "ask",
            "What are the SMS alert requirements?",
            "--product",
            "Core",
            "--product",
            "Cards",
            "--response-category",
            "Readily Available",
            "-n",
            "5",
            "--json",
        ]);

        assert_eq!(cli.profile.as_deref(), Some("offline"));
        match cli.command {
            Commands::Ask {
                question,
                filters,
                top_n,
                json,
                ..
            } => {
                assert_eq!(question, "What are the SMS alert requirements?");
                assert_eq!(filters.products, vec!["Core", "Cards"]);
                assert_eq!(filters.response_categories, vec!["Readily Available"]);
                assert_eq!(top_n, Some(5));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
