use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::IndexConfig;
use crate::engine::IndexMeta;
use crate::error::Result;
use crate::paths::{self, IndexPaths};
use crate::spimi::coordinator::BuildResult;
use crate::Posting;

/// Doc-offset entries applied to sled per batch.
const DOC_INDEX_BATCH: usize = 5_000;

/// Merges worker outputs into the final index. Steps run in order: doc-store
/// concatenation, doc-offset index, k-way block merge with df bounds, meta
/// descriptor last. Transient files are removed unless `cfg.keep_blocks`.
pub(crate) fn finalize(
    mut block_paths: Vec<PathBuf>,
    mut part_paths: Vec<PathBuf>,
    out_dir: &Path,
    total_docs: u64,
    cfg: &IndexConfig,
) -> Result<BuildResult> {
    fs::create_dir_all(out_dir)?;
    block_paths.sort();
    part_paths.sort();
    let paths = IndexPaths::new(out_dir);

    merge_doc_store_parts(&part_paths, &paths)?;
    build_doc_index(&paths)?;
    let vocab_size = merge_blocks(&block_paths, &paths, total_docs, cfg)?;
    let meta_path = write_meta(&paths, total_docs, vocab_size)?;

    if !cfg.keep_blocks {
        cleanup(&block_paths, paths.block_dir());
        cleanup(&part_paths, paths.parts_dir());
    }

    Ok(BuildResult {
        n_docs: total_docs,
        vocab_size,
        meta_path,
    })
}

/// Byte-exact concatenation of the sorted partition files.
fn merge_doc_store_parts(part_paths: &[PathBuf], paths: &IndexPaths) -> Result<()> {
    let mut out = BufWriter::new(File::create(paths.doc_store())?);
    for part in part_paths {
        let mut reader = File::open(part)?;
        io::copy(&mut reader, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

/// Streams the merged doc store and records `doc_uid -> byte offset` in a
/// sled tree, applied in batches. Unparseable lines and lines missing both
/// keys are skipped; a duplicate uid overwrites and is reported.
fn build_doc_index(paths: &IndexPaths) -> Result<()> {
    let db_path = paths.doc_index();
    if db_path.exists() {
        fs::remove_dir_all(&db_path)?;
    }
    let db = sled::open(&db_path)?;

    let mut reader = BufReader::new(File::open(paths.doc_store())?);
    let mut offset = 0u64;
    let mut buf = Vec::new();
    let mut batch = sled::Batch::default();
    let mut pending = 0usize;
    let mut pending_keys: HashSet<String> = HashSet::new();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        let line_offset = offset;
        offset += n as u64;

        let obj: serde_json::Value = match serde_json::from_slice(&buf) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let key = obj
            .get("doc_uid")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| obj.get("doc_id").and_then(serde_json::Value::as_str));
        let Some(key) = key else { continue };

        if pending_keys.contains(key) || db.contains_key(key.as_bytes())? {
            tracing::warn!(doc_uid = key, "doc_uid collision, later document wins");
        }
        batch.insert(key.as_bytes(), &line_offset.to_be_bytes()[..]);
        pending_keys.insert(key.to_string());
        pending += 1;
        if pending >= DOC_INDEX_BATCH {
            db.apply_batch(std::mem::take(&mut batch))?;
            pending_keys.clear();
            pending = 0;
        }
    }
    if pending > 0 {
        db.apply_batch(batch)?;
    }
    db.flush()?;
    Ok(())
}

/// Heap entry for the k-way merge; min-ordered on `(term, block index)` so
/// equal terms drain in stable left-to-right block order.
struct MergeEntry {
    term: String,
    block: usize,
    postings: Vec<Posting>,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term && self.block == other.block
    }
}
impl Eq for MergeEntry {}
impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the merge needs the minimum.
        other
            .term
            .cmp(&self.term)
            .then_with(|| other.block.cmp(&self.block))
    }
}

struct BlockReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl BlockReader {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            buf: Vec::new(),
        })
    }

    fn next_line(&mut self) -> Result<Option<(String, Vec<Posting>)>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
        let tab = line
            .iter()
            .position(|&b| b == b'\t')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "block line missing tab"))?;
        let term = String::from_utf8_lossy(&line[..tab]).into_owned();
        let postings: Vec<Posting> = serde_json::from_slice(&line[tab + 1..])?;
        Ok(Some((term, postings)))
    }
}

/// Two passes over the sorted blocks: count document frequencies, then merge
/// through a min-heap writing retained terms and their byte extents.
fn merge_blocks(
    block_paths: &[PathBuf],
    paths: &IndexPaths,
    total_docs: u64,
    cfg: &IndexConfig,
) -> Result<u64> {
    let mut df_counts: HashMap<String, u64> = HashMap::new();
    for path in block_paths {
        let mut reader = BlockReader::open(path)?;
        while let Some((term, postings)) = reader.next_line()? {
            *df_counts.entry(term).or_insert(0) += postings.len() as u64;
        }
    }

    let max_df = if total_docs > 0 {
        (cfg.max_df_ratio * total_docs as f64) as u64
    } else {
        0
    };
    let max_df = max_df.max(cfg.min_df);

    let mut readers = Vec::with_capacity(block_paths.len());
    for path in block_paths {
        readers.push(BlockReader::open(path)?);
    }
    let mut heap = BinaryHeap::new();
    for (block, reader) in readers.iter_mut().enumerate() {
        if let Some((term, postings)) = reader.next_line()? {
            heap.push(MergeEntry {
                term,
                block,
                postings,
            });
        }
    }

    let mut out = BufWriter::new(File::create(paths.postings())?);
    let mut pos = 0u64;
    let mut terms_index: IndexMap<String, (u64, u64)> = IndexMap::new();
    // (term, retained, start offset) of the line currently being emitted.
    let mut current: Option<(String, bool, u64)> = None;
    let mut first_posting = true;

    while let Some(entry) = heap.pop() {
        let MergeEntry {
            term,
            block,
            postings,
        } = entry;

        let term_changed = current.as_ref().map_or(true, |(t, _, _)| *t != term);
        if term_changed {
            close_term(&mut current, &mut out, &mut pos, &mut terms_index)?;
            let df = df_counts.get(&term).copied().unwrap_or(0);
            let retained = df >= cfg.min_df && df <= max_df;
            if retained {
                let start = pos;
                out.write_all(term.as_bytes())?;
                out.write_all(b"\t[")?;
                pos += term.len() as u64 + 2;
                first_posting = true;
                current = Some((term, true, start));
            } else {
                current = Some((term, false, 0));
            }
        }

        if matches!(current, Some((_, true, _))) {
            for posting in &postings {
                if !first_posting {
                    out.write_all(b",")?;
                    pos += 1;
                }
                let encoded = serde_json::to_string(posting)?;
                out.write_all(encoded.as_bytes())?;
                pos += encoded.len() as u64;
                first_posting = false;
            }
        }

        if let Some((term, postings)) = readers[block].next_line()? {
            heap.push(MergeEntry {
                term,
                block,
                postings,
            });
        }
    }
    close_term(&mut current, &mut out, &mut pos, &mut terms_index)?;
    out.flush()?;

    let vocab_size = terms_index.len() as u64;
    write_terms_index(&terms_index, paths)?;
    Ok(vocab_size)
}

fn close_term(
    current: &mut Option<(String, bool, u64)>,
    out: &mut BufWriter<File>,
    pos: &mut u64,
    terms_index: &mut IndexMap<String, (u64, u64)>,
) -> Result<()> {
    if let Some((term, retained, start)) = current.take() {
        if retained {
            out.write_all(b"]\n")?;
            *pos += 2;
            terms_index.insert(term, (start, *pos - start));
        }
    }
    Ok(())
}

/// `{term: [offset, length]}`, terms in postings-file order.
fn write_terms_index(terms_index: &IndexMap<String, (u64, u64)>, paths: &IndexPaths) -> Result<()> {
    let mut out = BufWriter::new(File::create(paths.terms_index())?);
    serde_json::to_writer(&mut out, terms_index)?;
    out.flush()?;
    Ok(())
}

/// Written last: its presence is what marks the index ready.
fn write_meta(paths: &IndexPaths, total_docs: u64, vocab_size: u64) -> Result<PathBuf> {
    let meta = IndexMeta {
        format: "block".to_string(),
        n_docs: total_docs,
        vocab_size,
        postings_path: paths::POSTINGS_NAME.to_string(),
        terms_index_path: paths::TERMS_INDEX_NAME.to_string(),
        doc_store_path: paths::DOC_STORE_NAME.to_string(),
        doc_index_path: paths::DOC_INDEX_NAME.to_string(),
        doc_index_type: "sled".to_string(),
    };
    let meta_path = paths.meta();
    let mut out = BufWriter::new(File::create(&meta_path)?);
    serde_json::to_writer(&mut out, &meta)?;
    out.flush()?;
    Ok(meta_path)
}

fn cleanup(files: &[PathBuf], dir: PathBuf) {
    for path in files {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove transient file");
            }
        }
    }
    // Best effort; the directory may legitimately be non-empty.
    let _ = fs::remove_dir(dir);
}
