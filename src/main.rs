use anyhow::{Context, Result};
use rfpqa::answer::{suggest_questions, AskOptions, AskResponse, ConversationTurn, QaService};
use rfpqa::cli::{Cli, Commands, ConfigAction, FilterArgs};
use rfpqa::config::{Config, ConfigValidator};
use rfpqa::embedding::{build_provider, Indexer};
use rfpqa::records::{DocumentUpload, QueryFilters};
use rfpqa::retrieval::{RankedResult, SimilarityRanker};
use rfpqa::storage::{Database, RecordStore};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let config_path = cli.config;
    let profile = cli.profile;

    match cli.command {
        Commands::Ingest { file } => {
            cmd_ingest(&load_config(config_path, profile)?, &file)?;
        }
        Commands::Embed => {
            cmd_embed(&load_config(config_path, profile)?)?;
        }
        Commands::Ask {
            question,
            filters,
            top_n,
            temperature,
            max_tokens,
            json,
        } => {
            let config = load_config(config_path, profile)?;
            let mut options = AskOptions::from_config(&config.retrieval);
            options.filters = to_filters(filters);
            if let Some(top_n) = top_n {
                options.top_n = top_n;
            }
            if let Some(temperature) = temperature {
                options.temperature = temperature;
            }
            if let Some(max_tokens) = max_tokens {
                options.max_tokens = max_tokens;
            }
            cmd_ask(&config, &question, &options, json)?;
        }
        Commands::FollowUp {
            question,
            history,
            filters,
            json,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_follow_up(&config, &question, &history, to_filters(filters), json)?;
        }
        Commands::Search {
            query,
            limit,
            filters,
            json,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_search(&config, &query, limit, to_filters(filters), json)?;
        }
        Commands::DeleteDocument { id } => {
            let config = load_config(config_path, profile)?;
            open_database(&config)?.delete_document(&id)?;
            println!("✓ Deleted document {}", id);
        }
        Commands::Stats => {
            cmd_stats(&load_config(config_path, profile)?)?;
        }
        Commands::Suggest => {
            for question in suggest_questions() {
                println!("- {}", question);
            }
        }
        Commands::Config { action } => {
            cmd_config(config_path, profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "rfpqa=debug" } else { "rfpqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// An ingest file holds one document or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum IngestFile {
    Many(Vec<DocumentUpload>),
    One(DocumentUpload),
}

fn cmd_ingest(config: &Config, file: &Path) -> Result<()> {
    let parsed: IngestFile = read_json(file)?;
    let uploads = match parsed {
        IngestFile::Many(uploads) => uploads,
        IngestFile::One(upload) => vec![upload],
    };

    let db = open_database(config)?;
    for upload in uploads {
        let submitted = upload.rows.len();
        let (document, records) = upload.into_parts();
        db.insert_document(&document)?;
        let stored = db.insert_records(&records)?;

        println!(
            "✓ {} ({}): {} of {} rows stored",
            document.file_name, document.id, stored, submitted
        );
    }
    println!("Run 'rfpqa embed' to index the new rows.");
    Ok(())
}

fn cmd_embed(config: &Config) -> Result<()> {
    let db = Arc::new(open_database(config)?);
    let provider = build_provider(&config.embedding);
    let report = Indexer::new(provider, db, config.embedding.batch_size).run()?;

    println!(
        "✓ Embedded {} records ({} failed) in {} ms",
        report.embedded, report.failed, report.duration_ms
    );
    Ok(())
}

fn cmd_ask(config: &Config, question: &str, options: &AskOptions, json: bool) -> Result<()> {
    let service = QaService::from_config(config, Arc::new(open_database(config)?));
    let response = service.ask(question, options)?;
    print_response(&response, json)
}

fn cmd_follow_up(
    config: &Config,
    question: &str,
    history_file: &Path,
    filters: Option<QueryFilters>,
    json: bool,
) -> Result<()> {
    let history: Vec<ConversationTurn> = read_json(history_file)?;
    let service = QaService::from_config(config, Arc::new(open_database(config)?));
    let response = service.follow_up(question, &history, filters)?;
    print_response(&response, json)
}

fn cmd_search(
    config: &Config,
    query: &str,
    limit: usize,
    filters: Option<QueryFilters>,
    json: bool,
) -> Result<()> {
    let db = open_database(config)?;
    let ranker = SimilarityRanker::new(build_provider(&config.embedding));
    let corpus = db.list_embeddings(filters.as_ref())?;
    let results: Vec<RankedResult> = ranker
        .rank(query, &corpus, limit, filters.as_ref())?
        .into_iter()
        .map(RankedResult::for_display)
        .collect();

    if json {
        println!("{}", to_json(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching requirements.");
    }
    for (idx, result) in results.iter().enumerate() {
        println!(
            "{}. [{}] {:.2}  {}",
            idx + 1,
            result.metadata.product,
            result.relevance_score,
            result.highlight
        );
    }
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let stats = open_database(config)?.stats()?;

    println!("rfpqa store");
    println!("===========");
    println!("Documents:    {}", stats.document_count);
    println!("Requirements: {}", stats.record_count);
    println!("Embeddings:   {}", stats.embedding_count);

    if !stats.product_distribution.is_empty() {
        println!("\nBy product:");
        for (product, count) in &stats.product_distribution {
            println!("  {:<24} {}", product, count);
        }
    }
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            println!("{}", to_json(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {:?}", parent)
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn print_response(response: &AskResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(response)?);
        return Ok(());
    }

    println!("{}\n", response.answer());
    println!(
        "Mode: {}  Confidence: {:.0}%",
        response.mode(),
        response.confidence() * 100.0
    );

    match response {
        AskResponse::Intelligent { sources, model, .. } => {
            println!("Model: {}", model);
            println!("\nSources:");
            for (idx, source) in sources.iter().enumerate() {
                println!(
                    "  [Document {}] {} / {} ({:.2})",
                    idx + 1,
                    source.metadata.file_name,
                    source.metadata.product,
                    source.relevance_score
                );
            }
        }
        AskResponse::SimpleSearch { note, .. } => println!("{}", note),
        AskResponse::NoResults { .. } | AskResponse::Error { .. } => {}
    }
    Ok(())
}

fn to_filters(args: FilterArgs) -> Option<QueryFilters> {
    let filters = QueryFilters {
        products: args.products,
        response_categories: args.response_categories,
    };
    (!filters.is_empty()).then_some(filters)
}

fn open_database(config: &Config) -> Result<Database> {
    let path = config.storage.database_path()?;
    Database::new(&path).with_context(|| format!("Failed to open store at {:?}", path))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'rfpqa config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Ok(Config::load_with_profile(&path, &profile)?)
    } else {
        Ok(Config::load(&path)?)
    }
}
