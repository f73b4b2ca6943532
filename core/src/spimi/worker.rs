use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

use crate::analyzer;
use crate::config::IndexConfig;
use crate::corpus;
use crate::error::Result;
use crate::lang::{self, Language};
use crate::paths::IndexPaths;
use crate::Posting;

/// Snippet length in chars of raw (pre-normalization) text.
const SNIPPET_CHARS: usize = 240;
const TF_DECIMALS: i32 = 6;

#[derive(Debug)]
pub(crate) struct WorkerOutput {
    pub block_path: PathBuf,
    pub doc_store_path: PathBuf,
    pub docs_count: u64,
}

/// One line of a doc-store partition.
#[derive(Debug, Serialize)]
struct DocRecord<'a> {
    doc_id: &'a str,
    doc_uid: &'a str,
    title: Option<&'a str>,
    url: Option<&'a str>,
    snippet: Option<String>,
}

/// Inverts one corpus byte range into a sorted block file and writes the
/// matching metadata partition. Deterministic given its range and config.
pub(crate) fn run_batch(
    corpus_path: &Path,
    range: (u64, u64),
    out_dir: &Path,
    batch_id: u64,
    cfg: &IndexConfig,
) -> Result<WorkerOutput> {
    let paths = IndexPaths::new(out_dir);
    fs::create_dir_all(paths.block_dir())?;
    fs::create_dir_all(paths.parts_dir())?;

    let mut inverted: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
    let doc_store_path = paths.part_file(batch_id);
    let mut part = BufWriter::new(fs::File::create(&doc_store_path)?);
    let mut docs_count = 0u64;

    for doc in corpus::iter_docs_in_range(corpus_path, range.0, range.1)? {
        let doc = doc?;
        let raw_text = doc.text.as_deref().unwrap_or("");
        let normalized = analyzer::normalize(raw_text);

        let (mut doc_lang, _conf) = lang::detect(&normalized);
        if doc_lang == Language::Unknown {
            doc_lang = cfg.default_language;
        }
        let terms = analyzer::analyze(&normalized, doc_lang, cfg.min_token_len);

        let doc_id = doc.doc_id.as_deref().unwrap_or("");
        let namespace = doc.source.as_deref().or(doc.lang.as_deref());
        let doc_uid = make_doc_uid(doc_id, doc.url.as_deref(), namespace);
        if doc_uid.is_empty() {
            tracing::warn!(batch_id, "skipping document with no doc_id, url, or namespace");
            continue;
        }

        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for term in &terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        let doc_len = (terms.len() as u64).max(1);
        for (term, freq) in counts {
            let tf = round_tf(freq as f64 / doc_len as f64);
            inverted
                .entry(term.to_string())
                .or_default()
                .push((doc_uid.clone(), tf));
        }

        let record = DocRecord {
            doc_id,
            doc_uid: &doc_uid,
            title: doc.title.as_deref(),
            url: doc.url.as_deref(),
            snippet: snippet(raw_text),
        };
        serde_json::to_writer(&mut part, &record)?;
        part.write_all(b"\n")?;
        docs_count += 1;
    }
    part.flush()?;

    let block_path = paths.block_file(batch_id);
    let mut block = BufWriter::new(fs::File::create(&block_path)?);
    for (term, postings) in &inverted {
        block.write_all(term.as_bytes())?;
        block.write_all(b"\t")?;
        serde_json::to_writer(&mut block, postings)?;
        block.write_all(b"\n")?;
    }
    block.flush()?;

    Ok(WorkerOutput {
        block_path,
        doc_store_path,
        docs_count,
    })
}

/// Derives the build-unique document key. A namespace (explicit source/lang,
/// else the URL hostname) qualifies the doc_id, or the URL itself when the
/// doc_id is empty.
pub(crate) fn make_doc_uid(doc_id: &str, url: Option<&str>, namespace: Option<&str>) -> String {
    let mut ns = namespace.filter(|s| !s.is_empty()).map(str::to_owned);
    if ns.is_none() {
        if let Some(raw) = url {
            ns = Url::parse(raw)
                .ok()
                .and_then(|u| u.host_str().map(str::to_owned));
        }
    }
    if let Some(ns) = ns {
        if !doc_id.is_empty() {
            return format!("{ns}:{doc_id}");
        }
        if let Some(raw) = url {
            return format!("{ns}:{raw}");
        }
    }
    if !doc_id.is_empty() {
        doc_id.to_owned()
    } else {
        url.unwrap_or("").to_owned()
    }
}

fn round_tf(tf: f64) -> f64 {
    let scale = 10f64.powi(TF_DECIMALS);
    (tf * scale).round() / scale
}

fn snippet(raw_text: &str) -> Option<String> {
    if raw_text.is_empty() {
        None
    } else {
        Some(raw_text.chars().take(SNIPPET_CHARS).collect())
    }
}
