use std::env;
use std::str::FromStr;

use crate::lang::Language;

/// Knobs for the SPIMI index builder. Defaults match the documented
/// environment variables; `from_env` applies overrides on top of them.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Analyzer language used when detection returns `Unknown`.
    pub default_language: Language,
    pub min_token_len: usize,
    pub min_df: u64,
    pub max_df_ratio: f64,
    /// Worker threads in the pool.
    pub workers: usize,
    /// Documents per batch, the SPIMI memory tuning knob.
    pub block_docs: usize,
    /// Max simultaneously submitted batches; 0 means `2 * workers`.
    pub max_in_flight: usize,
    /// Batches served by one worker thread before it is replaced; 0 disables.
    pub max_tasks_per_child: usize,
    /// Retain transient block and partition files after finalize.
    pub keep_blocks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            default_language: Language::Spanish,
            min_token_len: 2,
            min_df: 2,
            max_df_ratio: 0.5,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            block_docs: 10_000,
            max_in_flight: 0,
            max_tasks_per_child: 10,
            keep_blocks: false,
        }
    }
}

impl IndexConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(lang) = env_lang("DEFAULT_LANGUAGE") {
            cfg.default_language = lang;
        }
        env_parse("MIN_TOKEN_LEN", &mut cfg.min_token_len);
        env_parse("MIN_DF", &mut cfg.min_df);
        env_parse("MAX_DF_RATIO", &mut cfg.max_df_ratio);
        env_parse("INDEX_WORKERS", &mut cfg.workers);
        env_parse("INDEX_BLOCK_DOCS", &mut cfg.block_docs);
        env_parse("INDEX_MAX_IN_FLIGHT", &mut cfg.max_in_flight);
        env_parse("INDEX_MAX_TASKS_PER_CHILD", &mut cfg.max_tasks_per_child);
        env_parse("INDEX_KEEP_BLOCKS", &mut cfg.keep_blocks);
        cfg
    }

    /// Effective in-flight cap: the configured value, or `2 * workers`.
    pub fn effective_max_in_flight(&self) -> usize {
        if self.max_in_flight >= 1 {
            self.max_in_flight
        } else {
            self.workers.max(1) * 2
        }
    }
}

/// Query-side settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Fallback analyzer language for queries that detect as `Unknown`.
    pub default_query_language: Language,
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_query_language: Language::Spanish,
            top_k: 20,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(lang) = env_lang("DEFAULT_QUERY_LANGUAGE") {
            cfg.default_query_language = lang;
        }
        env_parse("TOP_K", &mut cfg.top_k);
        cfg
    }
}

fn env_parse<T: FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = env::var(name) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(name, value = %raw, "ignoring unparseable env override"),
        }
    }
}

fn env_lang(name: &str) -> Option<Language> {
    let raw = env::var(name).ok()?;
    match Language::from_code(raw.trim()) {
        Some(lang) => Some(lang),
        None => {
            tracing::warn!(name, value = %raw, "ignoring unsupported language override");
            None
        }
    }
}
