use lazy_static::lazy_static;
use rust_stemmers::Algorithm;
use whatlang::{Detector, Lang};

/// Minimum detector confidence; anything below maps to `Unknown`.
pub const MIN_CONFIDENCE: f64 = 0.60;

/// Texts shorter than this (in chars, after trimming) are not worth detecting.
const MIN_DETECT_CHARS: usize = 20;

/// The closed set of analyzer languages. `Unknown` selects the identity
/// analyzer: stop-word removal and stemming pass tokens through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Spanish,
    English,
    French,
    German,
    Italian,
    Portuguese,
    Unknown,
}

pub const SUPPORTED: [Language; 6] = [
    Language::Spanish,
    Language::English,
    Language::French,
    Language::German,
    Language::Italian,
    Language::Portuguese,
];

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Spanish => "spanish",
            Language::English => "english",
            Language::French => "french",
            Language::German => "german",
            Language::Italian => "italian",
            Language::Portuguese => "portuguese",
            Language::Unknown => "unknown",
        }
    }

    /// Parses a supported language code; `Unknown` is not accepted here so
    /// that query-time overrides can be rejected outright.
    pub fn from_code(code: &str) -> Option<Language> {
        match code.to_ascii_lowercase().as_str() {
            "spanish" => Some(Language::Spanish),
            "english" => Some(Language::English),
            "french" => Some(Language::French),
            "german" => Some(Language::German),
            "italian" => Some(Language::Italian),
            "portuguese" => Some(Language::Portuguese),
            _ => None,
        }
    }

    pub(crate) fn algorithm(self) -> Option<Algorithm> {
        match self {
            Language::Spanish => Some(Algorithm::Spanish),
            Language::English => Some(Algorithm::English),
            Language::French => Some(Algorithm::French),
            Language::German => Some(Algorithm::German),
            Language::Italian => Some(Algorithm::Italian),
            Language::Portuguese => Some(Algorithm::Portuguese),
            Language::Unknown => None,
        }
    }

    fn from_whatlang(lang: Lang) -> Language {
        match lang {
            Lang::Spa => Language::Spanish,
            Lang::Eng => Language::English,
            Lang::Fra => Language::French,
            Lang::Deu => Language::German,
            Lang::Ita => Language::Italian,
            Lang::Por => Language::Portuguese,
            _ => Language::Unknown,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

lazy_static! {
    static ref DETECTOR: Detector = Detector::with_allowlist(vec![
        Lang::Spa,
        Lang::Eng,
        Lang::Fra,
        Lang::Deu,
        Lang::Ita,
        Lang::Por,
    ]);
}

/// Detects the language of `text`, returning `(language, confidence)`.
pub fn detect(text: &str) -> (Language, f64) {
    let text = text.trim();
    if text.chars().count() < MIN_DETECT_CHARS {
        return (Language::Unknown, 0.0);
    }
    match DETECTOR.detect(text) {
        Some(info) if info.confidence() >= MIN_CONFIDENCE => {
            (Language::from_whatlang(info.lang()), info.confidence())
        }
        Some(info) => (Language::Unknown, info.confidence()),
        None => (Language::Unknown, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unknown() {
        assert_eq!(detect("hola mundo"), (Language::Unknown, 0.0));
        assert_eq!(detect("   "), (Language::Unknown, 0.0));
    }

    #[test]
    fn detects_english_prose() {
        let (lang, conf) = detect(
            "the quick brown fox jumps over the lazy dog while the farmer watches from the porch",
        );
        assert_eq!(lang, Language::English);
        assert!(conf >= MIN_CONFIDENCE);
    }

    #[test]
    fn detects_spanish_prose() {
        let (lang, _) = detect(
            "el rápido zorro marrón salta sobre el perro perezoso mientras el granjero observa",
        );
        assert_eq!(lang, Language::Spanish);
    }

    #[test]
    fn code_round_trip() {
        for lang in SUPPORTED {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Language::from_code("unknown"), None);
        assert_eq!(Language::from_code("klingon"), None);
    }
}
