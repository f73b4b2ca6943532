use anyhow::Result;
use clap::{Parser, Subcommand};
use rastro_core::{analyzer, lang, Language, SearchConfig, SearchEngine};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "rastro-indexer")]
#[command(about = "Build and query a multilingual SPIMI TF-IDF index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a line-delimited JSON corpus
    Build {
        /// Corpus file, one JSON document per line
        #[arg(long)]
        corpus: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Analyzer language for documents whose language cannot be detected
        #[arg(long)]
        language: Option<String>,
        /// Documents per SPIMI batch
        #[arg(long)]
        block_docs: Option<usize>,
        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,
        /// Max simultaneously submitted batches (0 = 2x workers)
        #[arg(long)]
        max_in_flight: Option<usize>,
        /// Minimum document frequency for a term to be retained
        #[arg(long)]
        min_df: Option<u64>,
        /// Maximum document frequency as a fraction of the corpus size
        #[arg(long)]
        max_df_ratio: Option<f64>,
        /// Keep transient block and partition files
        #[arg(long, default_value_t = false)]
        keep_blocks: bool,
    },
    /// Run a query against an existing index
    Search {
        /// Index directory (the one passed to build --output)
        #[arg(long)]
        index: PathBuf,
        /// Query text
        #[arg(long)]
        query: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Analyzer language override for the query
        #[arg(long)]
        language: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            corpus,
            output,
            language,
            block_docs,
            workers,
            max_in_flight,
            min_df,
            max_df_ratio,
            keep_blocks,
        } => {
            let mut cfg = rastro_core::IndexConfig::from_env();
            if let Some(code) = language {
                cfg.default_language = parse_language(&code)?;
            }
            if let Some(v) = block_docs {
                cfg.block_docs = v;
            }
            if let Some(v) = workers {
                cfg.workers = v;
            }
            if let Some(v) = max_in_flight {
                cfg.max_in_flight = v;
            }
            if let Some(v) = min_df {
                cfg.min_df = v;
            }
            if let Some(v) = max_df_ratio {
                cfg.max_df_ratio = v;
            }
            cfg.keep_blocks = cfg.keep_blocks || keep_blocks;

            let result = rastro_core::build(&corpus, &output, &cfg)?;
            tracing::info!(
                n_docs = result.n_docs,
                vocab_size = result.vocab_size,
                meta = %result.meta_path.display(),
                "index written"
            );
            Ok(())
        }
        Commands::Search {
            index,
            query,
            top_k,
            language,
        } => {
            let search_cfg = SearchConfig::from_env();
            let min_token_len = rastro_core::IndexConfig::from_env().min_token_len;
            let override_lang = language.as_deref().map(parse_language).transpose()?;

            let normalized = analyzer::normalize(&query);
            let (mut qlang, _conf) = lang::detect(&normalized);
            if qlang == Language::Unknown {
                qlang = override_lang.unwrap_or(search_cfg.default_query_language);
            }
            let terms = analyzer::analyze(&normalized, qlang, min_token_len);

            let meta_path = index.join(rastro_core::paths::META_NAME);
            let mut engine = SearchEngine::open(&meta_path)?;
            let ranked = engine.search(&terms, top_k.unwrap_or(search_cfg.top_k));
            for (doc_uid, score) in ranked {
                let meta = engine.get_doc_meta(&doc_uid);
                let title = meta
                    .get("title")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                println!("{score:.6}\t{doc_uid}\t{title}");
            }
            Ok(())
        }
    }
}

fn parse_language(code: &str) -> Result<Language> {
    Language::from_code(code)
        .ok_or_else(|| rastro_core::Error::UnsupportedLanguage(code.to_string()).into())
}
