//! Whole-text pattern scans used by the fallback stage, and shared by the
//! section parser for code lists.

use std::sync::LazyLock;

use regex::Regex;

use crate::source::compile_static_regex;

use super::record::{SignalWord, StructuredHazards};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));
static SIGNAL_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)signal\s+word[:\s]+(danger|warning)"));
static HAZARD_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\bH[2-4][0-9]{2}[0-9H+]*"));
static PRECAUTION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\bP[1-9][0-9]{2}[0-9P+]*"));
static PICTOGRAM_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\bGHS[0-9]{2}\b"));
static HAZARD_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"[A-Z][a-zA-Z. ]+\s[1-3][AB]?"));

/// Collapses every whitespace run to a single space.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// First `Danger`/`Warning` following "Signal word".
#[must_use]
pub fn signal_word(text: &str) -> Option<SignalWord> {
    SIGNAL_WORD_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// H-codes, including combined codes such as `H300+H310`.
#[must_use]
pub fn hazard_codes(text: &str) -> Vec<String> {
    codes(&HAZARD_CODE_RE, text)
}

/// P-codes, including combined codes such as `P305+P351+P338`.
#[must_use]
pub fn precautionary_codes(text: &str) -> Vec<String> {
    codes(&PRECAUTION_CODE_RE, text)
}

/// `GHS` followed by exactly two digits.
#[must_use]
pub fn pictograms(text: &str) -> Vec<String> {
    PICTOGRAM_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Capitalized word runs followed by a category number, e.g. `Flam. Liq. 2`
/// or `Carc. 1B`. Heuristic; may over-match free text.
#[must_use]
pub fn hazard_classes(text: &str) -> Vec<String> {
    HAZARD_CLASS_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|class| class.len() > 3)
        .collect()
}

/// Runs every scan over whitespace-normalized `text`.
#[must_use]
pub fn scan(text: &str) -> StructuredHazards {
    let text = normalize_whitespace(text);
    StructuredHazards {
        signal_word: signal_word(&text),
        hazard_statements: hazard_codes(&text),
        precautionary_statements: precautionary_codes(&text),
        pictograms: pictograms(&text),
        hazard_classes: hazard_classes(&text),
    }
}

fn codes(regex: &Regex, text: &str) -> Vec<String> {
    regex
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches('+').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_word_is_case_insensitive_and_first_wins() {
        assert_eq!(
            signal_word("Signal word: DANGER ... signal word Warning"),
            Some(SignalWord::Danger)
        );
        assert_eq!(signal_word("Signal word : Warning"), Some(SignalWord::Warning));
        assert_eq!(signal_word("Danger! no label here"), None);
    }

    #[test]
    fn test_hazard_codes_keep_combinations_and_stop_at_period() {
        assert_eq!(
            hazard_codes("H225 Highly flammable. H300+H310+H330. EUH066 H319."),
            ["H225", "H300+H310+H330", "H319"]
        );
        assert!(hazard_codes("H100 H500 H2O").is_empty());
    }

    #[test]
    fn test_precautionary_codes() {
        assert_eq!(
            precautionary_codes("P210 Keep away. P305+P351+P338 IF IN EYES. P099"),
            ["P210", "P305+P351+P338"]
        );
    }

    #[test]
    fn test_pictograms_need_exactly_two_digits() {
        assert_eq!(pictograms("GHS02, GHS07 GHS123 GHS5"), ["GHS02", "GHS07"]);
    }

    #[test]
    fn test_hazard_classes_match_abbreviated_categories() {
        let classes = hazard_classes("Flam. Liq. 2 Eye Irrit. 2 Carc. 1B");
        assert!(classes.iter().any(|c| c.ends_with("Carc. 1B")), "{classes:?}");
        assert!(classes.iter().all(|c| c.len() > 3));
    }

    #[test]
    fn test_scan_normalizes_whitespace_first() {
        let hazards = scan("Signal\nword:\n\tDanger\nH225,\nH225, H315");
        assert_eq!(hazards.signal_word, Some(SignalWord::Danger));
        assert_eq!(hazards.hazard_statements, ["H225", "H225", "H315"]);
    }
}
