use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::sentinels::{strip_highlight_markers, WRAPPED_PLACEHOLDER_RE};

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws"));
static TOKEN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("token split"));

/// Collapse whitespace runs (including nbsp) to one space and trim.
pub fn collapse_ws(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Whitespace-collapsed, trimmed, lower-cased.
pub fn normalize_name(text: &str) -> String {
    collapse_ws(text).to_lowercase()
}

pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'å' | 'ä' | 'á' | 'à' | 'â' | 'ã' => 'a',
            'Å' | 'Ä' | 'Á' | 'À' | 'Â' | 'Ã' => 'A',
            'ö' | 'ø' | 'ó' | 'ò' | 'ô' | 'õ' => 'o',
            'Ö' | 'Ø' | 'Ó' | 'Ò' | 'Ô' | 'Õ' => 'O',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'ü' | 'ú' | 'ù' | 'û' => 'u',
            'Ü' | 'Ú' | 'Ù' | 'Û' => 'U',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            _ => c,
        })
        .collect()
}

/// Lower-cased, diacritic-folded word tokens with `stopwords` removed.
pub fn content_tokens(text: &str, stopwords: &[String]) -> BTreeSet<String> {
    let folded = fold_diacritics(&text.to_lowercase());
    let stop: BTreeSet<String> = stopwords
        .iter()
        .map(|w| fold_diacritics(&w.to_lowercase()))
        .collect();
    TOKEN_SPLIT_RE
        .split(&folded)
        .filter(|t| !t.is_empty())
        .filter(|t| !stop.contains(*t))
        .map(str::to_string)
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_placeholder_text(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && WRAPPED_PLACEHOLDER_RE.is_match(t)
}

/// Headers are short labels: no sentence punctuation, or a single trailing period.
pub fn looks_like_label(text: &str) -> bool {
    let t = text.trim();
    let enders = t.chars().filter(|c| matches!(c, '.' | '?' | '!')).count();
    enders == 0 || (enders == 1 && t.ends_with('.'))
}

/// Text of a bullet with highlight markers removed, trimmed and lower-cased.
pub fn bullet_plain(text: &str) -> String {
    normalize_name(&strip_highlight_markers(text))
}

pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_folds_case() {
        assert_eq!(normalize_name("  Psykisk\n\t HÄLSA  "), "psykisk hälsa");
        assert_eq!(collapse_ws("a\u{a0} b"), "a b");
    }

    #[test]
    fn tokens_drop_stopwords_and_diacritics() {
        let stop = vec!["och".to_string(), "i".to_string()];
        let toks = content_tokens("Hälsa och Välmående", &stop);
        assert_eq!(
            toks.into_iter().collect::<Vec<_>>(),
            vec!["halsa".to_string(), "valmaende".to_string()]
        );
    }

    #[test]
    fn label_heuristic_rejects_sentences() {
        assert!(looks_like_label("Skola och utbildning"));
        assert!(looks_like_label("Bakgrund."));
        assert!(!looks_like_label("Han går i skolan. Det går bra."));
        assert!(!looks_like_label("Hur mår barnet?"));
    }

    #[test]
    fn placeholder_text_is_wrapped() {
        assert!(is_placeholder_text("(Beskriv skolgång)"));
        assert!(!is_placeholder_text(""));
        assert!(!is_placeholder_text("Utbildning"));
    }
}
