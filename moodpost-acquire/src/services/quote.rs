//! Quote composer
//!
//! Produces the 2–4 line text block of a bundle. Remote candidates come
//! from the configured quote feeds; when none qualifies a built-in pool is
//! used. Composition never fails.
//!
//! Line formatting falls through three strategies until the line count is
//! within bounds: sentence split, greedy fixed-width wrap, word bisection.
//! A one-word text is completed with a closing line.

use crate::sources::language;
use futures::future::join_all;
use moodpost_common::config::{NamedUrl, QuotesConfig};
use moodpost_common::text::{collapse_whitespace, strip_markup};
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::{debug, warn};

/// Line bounds of a composed quote
pub const MIN_LINES: usize = 2;
pub const MAX_LINES: usize = 4;

/// Remote entries longer than this are skipped
pub const MAX_QUOTE_LENGTH: usize = 600;

/// Narrowest wrap width tried
const MIN_WRAP_WIDTH: usize = 32;
const WRAP_WIDTH_STEP: usize = 8;

const UKRAINIAN_POOL: &[&str] = &[
    "Учітесь, брати мої! Думайте, читайте, і чужому научайтесь, й свого не цурайтесь.",
    "Борітеся — поборете! Вам Бог помагає!",
    "Хто не йде вперед, той іде назад. Стояти на місці не можна.",
    "Без надії сподіваюсь! Буду жити! Геть думи сумні!",
];

const ENGLISH_POOL: &[&str] = &[
    "Do not go where the path may lead. Go instead where there is no path and leave a trail.",
    "Keep your face always toward the sunshine. And shadows will fall behind you.",
    "Nothing is at last sacred but the integrity of your own mind.",
    "The best way out is always through.",
];

/// Closing line appended when a text cannot be split
pub fn closing_line(language: &str) -> &'static str {
    match language {
        "en" => "Enjoy the music.",
        _ => "Гарного дня і гарної музики!",
    }
}

/// Built-in quotes for a language (Ukrainian by default)
pub fn static_pool(language: &str) -> &'static [&'static str] {
    match language {
        "en" => ENGLISH_POOL,
        _ => UKRAINIAN_POOL,
    }
}

/// Composes bundle quotes from feeds or the static pool
pub struct QuoteComposer {
    http_client: reqwest::Client,
    feeds: Vec<NamedUrl>,
    min_length: usize,
    timeout: Duration,
}

impl QuoteComposer {
    pub fn new(http_client: reqwest::Client, config: &QuotesConfig, timeout: Duration) -> Self {
        Self {
            http_client,
            feeds: config.feeds.clone(),
            min_length: config.min_length,
            timeout,
        }
    }

    /// Static-pool-only composer
    pub fn offline() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            feeds: Vec::new(),
            min_length: 0,
            timeout: Duration::from_secs(1),
        }
    }

    /// Quote text with 2–4 newline-separated lines
    pub async fn compose(&self, language: &str) -> String {
        let language = language.trim().to_lowercase();
        let remote = self.remote_entries().await;

        let text = self
            .choose(remote, &language)
            .unwrap_or_else(|| self.choose_static(&language));

        format_lines(&text, closing_line(&language))
    }

    async fn remote_entries(&self) -> Vec<String> {
        if self.feeds.is_empty() {
            return Vec::new();
        }

        let fetched = join_all(self.feeds.iter().map(|feed| self.fetch_feed(feed))).await;
        fetched.into_iter().flatten().collect()
    }

    async fn fetch_feed(&self, feed: &NamedUrl) -> Vec<String> {
        let provider = format!("quotes:{}", feed.name);
        let body = match crate::sources::fetch_document(&self.http_client, &provider, &feed.url, self.timeout).await {
            Ok(body) => body,
            Err(e) => {
                warn!(feed = %feed.name, error = %e, "Quote feed unavailable");
                return Vec::new();
            }
        };

        match self.parse_feed(&body) {
            Ok(entries) => {
                debug!(feed = %feed.name, entries = entries.len(), "Quote feed parsed");
                entries
            }
            Err(e) => {
                warn!(feed = %feed.name, error = %e, "Quote feed unreadable");
                Vec::new()
            }
        }
    }

    /// Qualifying text entries of a feed document
    pub fn parse_feed(&self, body: &[u8]) -> Result<Vec<String>, rss::Error> {
        let channel = rss::Channel::read_from(body)?;

        Ok(channel
            .items()
            .iter()
            .filter_map(|item| item.content().or(item.description()))
            .map(strip_markup)
            .filter(|text| {
                let length = text.chars().count();
                length >= self.min_length && length <= MAX_QUOTE_LENGTH
            })
            .collect())
    }

    fn choose(&self, entries: Vec<String>, language: &str) -> Option<String> {
        if entries.is_empty() {
            return None;
        }

        let mut rng = rand::thread_rng();
        if language::is_supported(language) {
            let matching: Vec<&String> = entries
                .iter()
                .filter(|e| language::matches_language(e, language))
                .collect();
            if let Some(chosen) = matching.choose(&mut rng) {
                return Some((*chosen).clone());
            }
        }

        entries.choose(&mut rng).cloned()
    }

    fn choose_static(&self, language: &str) -> String {
        let pool = static_pool(language);
        pool.choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(UKRAINIAN_POOL[0])
            .to_string()
    }
}

/// Format text into 2–4 newline-separated lines
pub fn format_lines(text: &str, closing: &str) -> String {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return format_lines(UKRAINIAN_POOL[0], closing);
    }

    let sentences = split_sentences(&text);
    if (MIN_LINES..=MAX_LINES).contains(&sentences.len()) {
        return sentences.join("\n");
    }

    if let Some(lines) = wrap_to_fit(&text) {
        return lines.join("\n");
    }

    let words: Vec<&str> = text.split(' ').collect();
    if words.len() >= MIN_LINES {
        let middle = words.len() / 2;
        return format!("{}\n{}", words[..middle].join(" "), words[middle..].join(" "));
    }

    format!("{}\n{}", text, closing)
}

/// Split after `.`, `!`, `?` or `…` followed by whitespace
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?' | '…');
        if terminal && chars.peek().is_some_and(|next| next.is_whitespace()) {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Greedy word wrap, widening until at most four lines remain
///
/// `None` when no width yields at least two lines.
fn wrap_to_fit(text: &str) -> Option<Vec<String>> {
    let length = text.chars().count();
    let mut width = MIN_WRAP_WIDTH.max(length.div_ceil(MAX_LINES));

    while width < length {
        let lines = wrap(text, width);
        if lines.len() <= MAX_LINES {
            return (lines.len() >= MIN_LINES).then_some(lines);
        }
        width += WRAP_WIDTH_STEP;
    }
    None
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split(' ') {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_count(text: &str) -> usize {
        text.lines().count()
    }

    #[test]
    fn test_sentence_split() {
        let out = format_lines("First line here. Second one! Third?", "end");
        assert_eq!(out, "First line here.\nSecond one!\nThird?");
    }

    #[test]
    fn test_punctuation_free_text_wraps() {
        let text = format!("{}words", "word ".repeat(59));
        assert_eq!(text.chars().count(), 300);

        let out = format_lines(&text, "end");
        let lines = line_count(&out);
        assert!((MIN_LINES..=MAX_LINES).contains(&lines), "got {} lines", lines);
        assert_eq!(out.replace('\n', " "), text);
    }

    #[test]
    fn test_many_sentences_fall_back_to_wrap() {
        let out = format_lines("A. B. C. D. E. F. G.", "end");
        let lines = line_count(&out);
        assert!((MIN_LINES..=MAX_LINES).contains(&lines));
    }

    #[test]
    fn test_short_text_bisects() {
        assert_eq!(format_lines("hello world", "end"), "hello\nworld");
    }

    #[test]
    fn test_single_word_gets_closing_line() {
        assert_eq!(format_lines("Hello", "Enjoy."), "Hello\nEnjoy.");
    }

    #[test]
    fn test_static_pools_format_within_bounds() {
        for text in UKRAINIAN_POOL.iter().chain(ENGLISH_POOL) {
            let out = format_lines(text, closing_line("uk"));
            assert!((MIN_LINES..=MAX_LINES).contains(&line_count(&out)), "{}", out);
        }
    }

    #[test]
    fn test_parse_feed_filters_length() {
        let composer = QuoteComposer::new(
            reqwest::Client::new(),
            &QuotesConfig {
                feeds: Vec::new(),
                min_length: 20,
            },
            Duration::from_secs(1),
        );
        let feed = r#"<rss version="2.0"><channel><title>q</title><link>https://q.test</link><description>q</description>
            <item><description>&lt;p&gt;Short&lt;/p&gt;</description></item>
            <item><description>&lt;p&gt;A long enough quote. With two sentences.&lt;/p&gt;</description></item>
        </channel></rss>"#;

        let entries = composer.parse_feed(feed.as_bytes()).unwrap();
        assert_eq!(entries, vec!["A long enough quote. With two sentences.".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_compose_uses_static_pool() {
        let out = QuoteComposer::offline().compose("en").await;
        assert!((MIN_LINES..=MAX_LINES).contains(&line_count(&out)));
        let first = out.lines().next().unwrap_or_default();
        assert!(ENGLISH_POOL.iter().any(|q| q.starts_with(first)));
    }
}
