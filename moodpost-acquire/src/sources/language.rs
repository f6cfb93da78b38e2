//! Lightweight language heuristics
//!
//! Alphabet/diacritic and keyword hints; good enough to bias a search, not
//! to classify text reliably.

struct LanguageHints {
    code: &'static str,
    /// Letters characteristic of the language
    letters: &'static [char],
    /// Lower-case keyword fragments (place names, self-names)
    keywords: &'static [&'static str],
}

const HINTS: &[LanguageHints] = &[
    LanguageHints {
        code: "uk",
        letters: &['ї', 'є', 'ґ', 'і'],
        keywords: &["україн", "ukrain", "київ", "kyiv", "львів", "lviv"],
    },
    LanguageHints {
        code: "ru",
        letters: &['ы', 'э', 'ё', 'ъ'],
        keywords: &["рус", "russian", "moscow", "москв", "питер"],
    },
    LanguageHints {
        code: "pl",
        letters: &['ł', 'ą', 'ę', 'ż', 'ź', 'ć', 'ń', 'ś'],
        keywords: &["polsk", "polish", "warsz", "krak"],
    },
];

fn hints_for(code: &str) -> Option<&'static LanguageHints> {
    HINTS.iter().find(|h| h.code == code)
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

fn has_hint(text: &str, hints: &LanguageHints) -> bool {
    text.chars().any(|c| hints.letters.contains(&c))
        || hints.keywords.iter().any(|k| text.contains(k))
}

/// Whether the language code has dedicated heuristics
pub fn is_supported(code: &str) -> bool {
    code == "en" || hints_for(code).is_some()
}

/// Best-effort check that `text` is written in (or about) `language`
///
/// - `uk`, `ru`, `pl`: characteristic letters or keywords. Cyrillic text
///   without Ukrainian-specific letters also counts as Russian.
/// - `en`: Latin letters, no Cyrillic and no Polish diacritics.
/// - anything else never matches.
pub fn matches_language(text: &str, language: &str) -> bool {
    let lower = text.to_lowercase();
    let code = language.trim().to_lowercase();

    if code == "en" {
        let has_latin = lower.chars().any(|c| c.is_ascii_alphabetic());
        let foreign = lower.chars().any(is_cyrillic)
            || hints_for("pl").is_some_and(|pl| lower.chars().any(|c| pl.letters.contains(&c)));
        return has_latin && !foreign;
    }

    let Some(hints) = hints_for(&code) else {
        return false;
    };

    if has_hint(&lower, hints) {
        return true;
    }

    if code == "ru" {
        let ukrainian = hints_for("uk").is_some_and(|uk| has_hint(&lower, uk));
        return lower.chars().any(is_cyrillic) && !ukrainian;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ukrainian_letters() {
        assert!(matches_language("Пісня про весну", "uk"));
        assert!(matches_language("Live in Kyiv", "uk"));
        assert!(!matches_language("Song about spring", "uk"));
    }

    #[test]
    fn test_russian_fallback_on_plain_cyrillic() {
        assert!(matches_language("Тихий вечер", "ru"));
        assert!(matches_language("Мы были", "ru"));
        assert!(!matches_language("Тиха ніч", "ru"));
    }

    #[test]
    fn test_polish_diacritics() {
        assert!(matches_language("Cisza nad jeziorem łodzi", "pl"));
        assert!(matches_language("Live in Kraków", "pl"));
        assert!(!matches_language("Quiet lake", "pl"));
    }

    #[test]
    fn test_english() {
        assert!(matches_language("Quiet lake", "en"));
        assert!(!matches_language("Тиха ніч", "en"));
        assert!(!matches_language("Cisza łodzi", "en"));
    }

    #[test]
    fn test_unknown_language_never_matches() {
        assert!(!matches_language("anything", "xx"));
        assert!(!is_supported("xx"));
        assert!(is_supported("UK".to_lowercase().as_str()));
    }
}
