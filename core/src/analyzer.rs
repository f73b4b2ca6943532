//! The linguistic pipeline: normalize -> tokenize -> remove_stopwords ->
//! filter_meaningful -> stem. Every operation is total; an unsupported
//! language degrades to the identity for the language-dependent stages.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::Stemmer;
use stop_words::{get as stop_words_for, LANGUAGE as SwLang};
use unicode_normalization::UnicodeNormalization;

use crate::lang::{Language, SUPPORTED};

lazy_static! {
    static ref TOKEN_RE: Regex =
        Regex::new(r"[A-Za-zÁÉÍÓÚÜÑáéíóúüñ]+(?:'[A-Za-zÁÉÍÓÚÜÑáéíóúüñ]+)?").expect("valid regex");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref STOPWORDS: HashMap<Language, HashSet<String>> = {
        let mut map = HashMap::new();
        for lang in SUPPORTED {
            let words = match lang {
                Language::Spanish => stop_words_for(SwLang::Spanish),
                Language::English => stop_words_for(SwLang::English),
                Language::French => stop_words_for(SwLang::French),
                Language::German => stop_words_for(SwLang::German),
                Language::Italian => stop_words_for(SwLang::Italian),
                Language::Portuguese => stop_words_for(SwLang::Portuguese),
                Language::Unknown => unreachable!(),
            };
            map.insert(lang, words.into_iter().collect());
        }
        map
    };
    static ref STEMMERS: HashMap<Language, Stemmer> = SUPPORTED
        .iter()
        .filter_map(|&lang| lang.algorithm().map(|alg| (lang, Stemmer::create(alg))))
        .collect();
}

/// Unicode compatibility normalization (NFKC), lowercasing, whitespace
/// collapsing, trimming.
pub fn normalize(text: &str) -> String {
    let text = text.nfkc().collect::<String>().to_lowercase();
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Extracts maximal alphabetic runs, allowing one apostrophe-joined suffix.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Filters out the language's stop words; unsupported languages pass through.
pub fn remove_stopwords(tokens: Vec<String>, lang: Language) -> Vec<String> {
    match STOPWORDS.get(&lang) {
        Some(set) => tokens.into_iter().filter(|t| !set.contains(t)).collect(),
        None => tokens,
    }
}

/// Drops tokens shorter than `min_len` chars and tokens that are all digits.
pub fn filter_meaningful(tokens: Vec<String>, min_len: usize) -> Vec<String> {
    tokens
        .into_iter()
        .filter(|t| t.chars().count() >= min_len && !t.chars().all(char::is_numeric))
        .collect()
}

/// Snowball stemming by language; unsupported languages pass through.
pub fn stem(tokens: Vec<String>, lang: Language) -> Vec<String> {
    match STEMMERS.get(&lang) {
        Some(stemmer) => tokens
            .into_iter()
            .map(|t| stemmer.stem(&t).into_owned())
            .collect(),
        None => tokens,
    }
}

/// The full pipeline over already-normalized text.
pub fn analyze(normalized: &str, lang: Language, min_token_len: usize) -> Vec<String> {
    let tokens = tokenize(normalized);
    let tokens = remove_stopwords(tokens, lang);
    let tokens = filter_meaningful(tokens, min_token_len);
    stem(tokens, lang)
}
