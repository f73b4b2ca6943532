use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::Posting;

/// The index descriptor. Written last by the finalizer; its presence is the
/// readiness signal consumers key off.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format: String,
    #[serde(rename = "N")]
    pub n_docs: u64,
    pub vocab_size: u64,
    pub postings_path: String,
    pub terms_index_path: String,
    pub doc_store_path: String,
    pub doc_index_path: String,
    pub doc_index_type: String,
}

/// Ranked-retrieval engine over one on-disk index.
///
/// Holds the postings file, the doc store, and the doc-offset store open for
/// its lifetime (all closed on drop). Reads seek on those shared handles, so
/// one instance must not be shared across threads; independent instances over
/// the same index directory are fine.
pub struct SearchEngine {
    n_docs: u64,
    terms: HashMap<String, (u64, u64)>,
    postings: File,
    doc_store: File,
    doc_index: sled::Db,
}

impl SearchEngine {
    /// Opens the index described by `meta_path` (an `index.meta.json`).
    pub fn open(meta_path: &Path) -> Result<Self> {
        if !meta_path.is_file() {
            return Err(Error::IndexNotReady(meta_path.to_path_buf()));
        }
        let meta: IndexMeta = serde_json::from_reader(BufReader::new(File::open(meta_path)?))?;
        if meta.format != "block" {
            return Err(Error::UnsupportedFormat(meta.format));
        }
        let base = meta_path.parent().unwrap_or_else(|| Path::new("."));

        let terms: HashMap<String, (u64, u64)> = serde_json::from_reader(BufReader::new(
            File::open(base.join(&meta.terms_index_path))?,
        ))?;
        let postings = File::open(base.join(&meta.postings_path))?;
        let doc_store = File::open(base.join(&meta.doc_store_path))?;
        let doc_index = sled::open(base.join(&meta.doc_index_path))?;

        Ok(Self {
            n_docs: meta.n_docs,
            terms,
            postings,
            doc_store,
            doc_index,
        })
    }

    pub fn n_docs(&self) -> u64 {
        self.n_docs
    }

    pub fn vocab_size(&self) -> usize {
        self.terms.len()
    }

    /// Scores `tf * idf` accumulated per document and returns the `top_k`
    /// highest, ties broken by first-seen order. A query term appearing twice
    /// contributes twice.
    pub fn search(&mut self, query_terms: &[String], top_k: usize) -> Vec<(String, f64)> {
        let mut scores: IndexMap<String, f64> = IndexMap::new();
        for term in query_terms {
            let postings = self.read_postings(term);
            if postings.is_empty() {
                continue;
            }
            let df = postings.len() as f64;
            let idf = ((self.n_docs as f64 + 1.0) / (df + 1.0)).ln() + 1.0;
            for (doc_uid, tf) in postings {
                *scores.entry(doc_uid).or_insert(0.0) += tf * idf;
            }
        }
        let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
        // Stable sort keeps insertion order among equal scores.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }

    /// Resolves a document's stored metadata (title, url, snippet, doc_uid).
    /// Any failure, including an unknown uid, yields an empty map.
    pub fn get_doc_meta(&mut self, doc_uid: &str) -> serde_json::Map<String, serde_json::Value> {
        let Ok(Some(raw)) = self.doc_index.get(doc_uid.as_bytes()) else {
            return serde_json::Map::new();
        };
        let Ok(bytes) = <[u8; 8]>::try_from(raw.as_ref()) else {
            return serde_json::Map::new();
        };
        let offset = u64::from_be_bytes(bytes);

        if self.doc_store.seek(SeekFrom::Start(offset)).is_err() {
            return serde_json::Map::new();
        }
        let mut line = Vec::new();
        let mut reader = BufReader::new(&self.doc_store);
        if reader.read_until(b'\n', &mut line).is_err() {
            return serde_json::Map::new();
        }
        match serde_json::from_slice::<serde_json::Value>(&line) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("doc_id");
                map
            }
            _ => serde_json::Map::new(),
        }
    }

    /// Reads one term's postings by byte extent. A missing term or a
    /// localized read failure yields empty postings rather than an error.
    fn read_postings(&mut self, term: &str) -> Vec<Posting> {
        let Some(&(offset, length)) = self.terms.get(term) else {
            return Vec::new();
        };
        let mut raw = vec![0u8; length as usize];
        if self.postings.seek(SeekFrom::Start(offset)).is_err() {
            return Vec::new();
        }
        if self.postings.read_exact(&mut raw).is_err() {
            return Vec::new();
        }
        let line = raw.strip_suffix(b"\n").unwrap_or(&raw);
        let Some(tab) = line.iter().position(|&b| b == b'\t') else {
            return Vec::new();
        };
        match serde_json::from_slice(&line[tab + 1..]) {
            Ok(postings) => postings,
            Err(e) => {
                tracing::debug!(term, error = %e, "unreadable postings line");
                Vec::new()
            }
        }
    }
}
