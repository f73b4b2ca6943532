use rastro_core::analyzer::{
    analyze, filter_meaningful, normalize, remove_stopwords, stem, tokenize,
};
use rastro_core::Language;

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn normalize_applies_nfkc_lowercase_and_trim() {
    // U+FB01 LATIN SMALL LIGATURE FI decomposes under NFKC.
    assert_eq!(normalize("ﬁle   NAME\n"), "file name");
    assert_eq!(normalize("  Árbol   GRANDE  "), "árbol grande");
}

#[test]
fn tokenize_matches_letter_runs_with_apostrophes() {
    assert_eq!(
        tokenize("l'été llegó, madrid 2024!"),
        owned(&["l'été", "llegó", "madrid"])
    );
}

#[test]
fn stopwords_per_language() {
    let toks = owned(&["the", "cat", "sat"]);
    assert_eq!(
        remove_stopwords(toks, Language::English),
        owned(&["cat", "sat"])
    );
    let toks = owned(&["el", "perro", "de", "madrid"]);
    assert_eq!(
        remove_stopwords(toks, Language::Spanish),
        owned(&["perro", "madrid"])
    );
}

#[test]
fn meaningful_filter_drops_short_and_numeric() {
    let toks = owned(&["a", "ab", "abc", "1234"]);
    assert_eq!(filter_meaningful(toks, 2), owned(&["ab", "abc"]));
}

#[test]
fn stemming_is_language_aware() {
    assert_eq!(
        stem(owned(&["running", "runners"]), Language::English),
        owned(&["run", "runner"])
    );
    assert_eq!(
        stem(owned(&["corriendo"]), Language::Spanish),
        owned(&["corr"])
    );
}

#[test]
fn full_pipeline_in_english() {
    let normalized = normalize("The cats were RUNNING fast!");
    let terms = analyze(&normalized, Language::English, 2);
    assert!(terms.contains(&"cat".to_string()));
    assert!(terms.contains(&"run".to_string()));
    assert!(!terms.contains(&"the".to_string()));
}

#[test]
fn unknown_language_only_tokenizes_and_filters() {
    let normalized = normalize("The cats were running");
    let terms = analyze(&normalized, Language::Unknown, 2);
    assert_eq!(terms, owned(&["the", "cats", "were", "running"]));
}
