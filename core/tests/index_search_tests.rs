use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use rastro_core::paths::{IndexPaths, META_NAME};
use rastro_core::{build, Error, IndexConfig, Language, SearchEngine};
use tempfile::TempDir;

fn write_corpus(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("corpus.jsonl");
    let mut f = fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

fn english_config() -> IndexConfig {
    IndexConfig {
        default_language: Language::English,
        min_df: 1,
        max_df_ratio: 1.0,
        workers: 1,
        max_in_flight: 2,
        ..Default::default()
    }
}

fn open_engine(out_dir: &Path) -> SearchEngine {
    SearchEngine::open(&out_dir.join(META_NAME)).unwrap()
}

const WIKI_CORPUS: [&str; 2] = [
    r#"{"doc_id":"1","text":"the cat sat","url":"https://en.wiki/a"}"#,
    r#"{"doc_id":"2","text":"the dog ran","url":"https://en.wiki/b"}"#,
];

#[test]
fn builds_and_searches_a_tiny_corpus() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");

    let result = build(&corpus, &out, &english_config()).unwrap();
    assert_eq!(result.n_docs, 2);

    let terms: HashMap<String, (u64, u64)> =
        serde_json::from_str(&fs::read_to_string(out.join("index.terms.json")).unwrap()).unwrap();
    for term in ["cat", "dog"] {
        assert!(terms.contains_key(term), "missing term {term}");
    }
    assert!(!terms.contains_key("the"), "stop word survived");

    let mut engine = open_engine(&out);
    assert_eq!(engine.n_docs(), 2);
    let hits = engine.search(&["cat".to_string()], 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "en.wiki:1");
    assert!(hits[0].1 > 0.0);
}

#[test]
fn min_df_two_empties_a_two_doc_vocabulary() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");

    let cfg = IndexConfig {
        min_df: 2,
        ..english_config()
    };
    let result = build(&corpus, &out, &cfg).unwrap();
    assert_eq!(result.vocab_size, 0);

    let mut engine = open_engine(&out);
    assert_eq!(engine.vocab_size(), 0);
    assert!(engine.search(&["cat".to_string()], 10).is_empty());
}

#[test]
fn tf_is_normalized_and_rounded_to_six_decimals() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &[r#"{"doc_id":"1","text":"aaa aaa bbb"}"#]);
    let out = tmp.path().join("index");

    build(&corpus, &out, &english_config()).unwrap();
    let postings = fs::read_to_string(out.join("index.postings")).unwrap();
    assert!(postings.contains("0.666667"), "postings: {postings}");
    assert!(postings.contains("0.333333"), "postings: {postings}");
}

#[test]
fn duplicate_query_terms_accumulate() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");
    build(&corpus, &out, &english_config()).unwrap();

    let mut engine = open_engine(&out);
    let single = engine.search(&["cat".to_string()], 10)[0].1;
    let double = engine.search(&["cat".to_string(), "cat".to_string()], 10)[0].1;
    assert!((double - 2.0 * single).abs() < 1e-9);
}

#[test]
fn empty_corpus_builds_a_valid_empty_index() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &[]);
    let out = tmp.path().join("index");

    let result = build(&corpus, &out, &english_config()).unwrap();
    assert_eq!(result.n_docs, 0);
    assert_eq!(result.vocab_size, 0);
    assert!(out.join(META_NAME).is_file());

    let mut engine = open_engine(&out);
    assert!(engine.search(&["anything".to_string()], 10).is_empty());
}

#[test]
fn df_bounds_are_inclusive() {
    let tmp = TempDir::new().unwrap();
    // alpha df=4, delta df=3, beta df=2, gamma df=1.
    let corpus = write_corpus(
        tmp.path(),
        &[
            r#"{"doc_id":"1","text":"alpha beta delta"}"#,
            r#"{"doc_id":"2","text":"alpha beta delta"}"#,
            r#"{"doc_id":"3","text":"alpha delta gamma"}"#,
            r#"{"doc_id":"4","text":"alpha"}"#,
        ],
    );
    let out = tmp.path().join("index");
    let cfg = IndexConfig {
        min_df: 2,
        max_df_ratio: 0.75, // max_df = floor(0.75 * 4) = 3
        ..english_config()
    };
    build(&corpus, &out, &cfg).unwrap();

    let terms: HashMap<String, (u64, u64)> =
        serde_json::from_str(&fs::read_to_string(out.join("index.terms.json")).unwrap()).unwrap();
    assert!(terms.contains_key("beta"), "df == min_df must be retained");
    assert!(terms.contains_key("delta"), "df == max_df must be retained");
    assert!(!terms.contains_key("alpha"), "df == max_df + 1 must be dropped");
    assert!(!terms.contains_key("gamma"), "df < min_df must be dropped");
}

#[test]
fn terms_table_extents_frame_complete_lines() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");
    build(&corpus, &out, &english_config()).unwrap();

    let postings = fs::read(out.join("index.postings")).unwrap();
    let terms: HashMap<String, (u64, u64)> =
        serde_json::from_str(&fs::read_to_string(out.join("index.terms.json")).unwrap()).unwrap();
    assert!(!terms.is_empty());
    for (term, (offset, length)) in &terms {
        let slice = &postings[*offset as usize..(*offset + *length) as usize];
        let head = format!("{term}\t[");
        assert!(slice.starts_with(head.as_bytes()), "bad frame for {term}");
        assert!(slice.ends_with(b"]\n"), "unterminated frame for {term}");
    }
}

#[test]
fn doc_store_has_one_line_per_document() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");
    let result = build(&corpus, &out, &english_config()).unwrap();

    let store = fs::read_to_string(out.join("doc_store.jsonl")).unwrap();
    assert_eq!(store.lines().count() as u64, result.n_docs);
}

#[test]
fn doc_meta_round_trips_title_url_and_snippet() {
    let tmp = TempDir::new().unwrap();
    let long_text = format!("word {}", "x".repeat(500));
    let corpus = write_corpus(
        tmp.path(),
        &[&format!(
            r#"{{"doc_id":"1","title":"A Title","text":"{long_text}","url":"https://en.wiki/a"}}"#
        )],
    );
    let out = tmp.path().join("index");
    build(&corpus, &out, &english_config()).unwrap();

    let mut engine = open_engine(&out);
    let meta = engine.get_doc_meta("en.wiki:1");
    assert_eq!(meta.get("title").unwrap().as_str(), Some("A Title"));
    assert_eq!(meta.get("url").unwrap().as_str(), Some("https://en.wiki/a"));
    let snippet = meta.get("snippet").unwrap().as_str().unwrap();
    assert_eq!(snippet.chars().count(), 240);
    assert_eq!(snippet, &long_text.chars().take(240).collect::<String>());
    assert!(meta.get("doc_id").is_none(), "doc_id must be stripped");
    assert_eq!(meta.get("doc_uid").unwrap().as_str(), Some("en.wiki:1"));

    assert!(engine.get_doc_meta("nope:0").is_empty());
}

#[test]
fn zero_token_documents_keep_metadata_but_no_postings() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(
        tmp.path(),
        &[
            r#"{"doc_id":"1","text":"","url":"https://en.wiki/a"}"#,
            r#"{"doc_id":"2","text":"cat","url":"https://en.wiki/b"}"#,
        ],
    );
    let out = tmp.path().join("index");
    let result = build(&corpus, &out, &english_config()).unwrap();
    assert_eq!(result.n_docs, 2);

    let mut engine = open_engine(&out);
    let meta = engine.get_doc_meta("en.wiki:1");
    assert!(meta.get("snippet").unwrap().is_null());
    let hits = engine.search(&["cat".to_string()], 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "en.wiki:2");
}

#[test]
fn identical_doc_ids_in_different_namespaces_stay_distinct() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(
        tmp.path(),
        &[
            r#"{"doc_id":"1","text":"shared topic words","url":"https://en.wiki/a"}"#,
            r#"{"doc_id":"1","text":"shared topic words","url":"https://fr.wiki/a"}"#,
        ],
    );
    let out = tmp.path().join("index");
    build(&corpus, &out, &english_config()).unwrap();

    let mut engine = open_engine(&out);
    let hits = engine.search(&["topic".to_string()], 10);
    let uids: Vec<&str> = hits.iter().map(|(uid, _)| uid.as_str()).collect();
    assert!(uids.contains(&"en.wiki:1"));
    assert!(uids.contains(&"fr.wiki:1"));
}

#[test]
fn multi_block_builds_merge_term_postings() {
    let tmp = TempDir::new().unwrap();
    let lines: Vec<String> = (0..6)
        .map(|i| format!(r#"{{"doc_id":"{i}","text":"zebra mango violin","url":"https://en.wiki/{i}"}}"#))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let corpus = write_corpus(tmp.path(), &refs);
    let out = tmp.path().join("index");

    // One document per block forces a six-way merge.
    let cfg = IndexConfig {
        block_docs: 1,
        workers: 2,
        max_tasks_per_child: 2,
        ..english_config()
    };
    let result = build(&corpus, &out, &cfg).unwrap();
    assert_eq!(result.n_docs, 6);

    let mut engine = open_engine(&out);
    let hits = engine.search(&["zebra".to_string()], 10);
    assert_eq!(hits.len(), 6);

    // Transient outputs are gone after finalize.
    assert!(!out.join("blocks").exists());
    assert!(!out.join("doc_store_parts").exists());
}

#[test]
fn keep_blocks_retains_transient_files() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");
    let cfg = IndexConfig {
        keep_blocks: true,
        ..english_config()
    };
    build(&corpus, &out, &cfg).unwrap();

    let paths = IndexPaths::new(&out);
    assert!(paths.block_dir().is_dir());
    assert!(fs::read_dir(paths.block_dir()).unwrap().count() > 0);
    assert!(paths.parts_dir().is_dir());
}

#[test]
fn worker_pool_indexes_many_batches() {
    let tmp = TempDir::new().unwrap();
    let lines: Vec<String> = (0..100)
        .map(|i| format!(r#"{{"doc_id":"{i}","text":"document number {i} about topic {}","url":"https://en.wiki/{i}"}}"#, i % 7))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let corpus = write_corpus(tmp.path(), &refs);
    let out = tmp.path().join("index");

    let cfg = IndexConfig {
        block_docs: 10,
        workers: 4,
        max_in_flight: 3,
        max_tasks_per_child: 2,
        ..english_config()
    };
    let result = build(&corpus, &out, &cfg).unwrap();
    assert_eq!(result.n_docs, 100);
    let store = fs::read_to_string(out.join("doc_store.jsonl")).unwrap();
    assert_eq!(store.lines().count(), 100);
}

#[test]
fn failed_build_leaves_no_meta_and_engine_refuses_to_open() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(
        tmp.path(),
        &[r#"{"doc_id":"1","text":"fine"}"#, "{this is not json"],
    );
    let out = tmp.path().join("index");

    let err = build(&corpus, &out, &english_config()).unwrap_err();
    assert!(matches!(err, Error::MalformedRecord { .. }), "got {err:?}");
    assert!(!out.join(META_NAME).exists());

    let opened = SearchEngine::open(&out.join(META_NAME));
    assert!(matches!(opened, Err(Error::IndexNotReady(_))));
}

#[test]
fn missing_corpus_is_reported_with_its_path() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.jsonl");
    let err = build(&missing, &tmp.path().join("index"), &english_config()).unwrap_err();
    assert!(matches!(err, Error::CorpusNotFound(p) if p == missing));
}

#[test]
fn postings_count_matches_retained_document_frequencies() {
    let tmp = TempDir::new().unwrap();
    let corpus = write_corpus(tmp.path(), &WIKI_CORPUS);
    let out = tmp.path().join("index");
    build(&corpus, &out, &english_config()).unwrap();

    let terms: HashMap<String, (u64, u64)> =
        serde_json::from_str(&fs::read_to_string(out.join("index.terms.json")).unwrap()).unwrap();
    let term_names: Vec<String> = terms.keys().cloned().collect();
    let mut engine = open_engine(&out);
    let mut total_postings = 0usize;
    for term in term_names {
        total_postings += engine.search(&[term], 100).len();
    }
    // Every retained term in the two-doc corpus occurs in exactly one doc.
    assert_eq!(total_postings, terms.len());
}
