//! Text normalisation helpers
//!
//! Used for identity keys (deduplication), genre matching and cleaning up
//! markup-laden feed text.

/// Lower-case, trim and collapse internal whitespace runs to single spaces
pub fn normalize(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Collapse whitespace runs (including newlines) to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-case alphanumeric characters only
///
/// `"Lo-Fi"` and `"lofi"` fold to the same value.
pub fn alphanumeric_fold(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decode the common named entities and numeric character references
///
/// Unknown entities are left as written.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "hellip" => Some('…'),
        "laquo" => Some('«'),
        "raquo" => Some('»'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Remove markup tags, decode entities and collapse whitespace
///
/// Tags are replaced by a space so that words on either side of a
/// `<br>` or `</p>` do not run together.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    collapse_whitespace(&unescape_entities(&out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_and_lowercases() {
        assert_eq!(normalize("  Song   X \n"), "song x");
        assert_eq!(normalize("ARTIST\tA"), "artist a");
    }

    #[test]
    fn test_alphanumeric_fold() {
        assert_eq!(alphanumeric_fold("Lo-Fi"), "lofi");
        assert_eq!(alphanumeric_fold("Лоу Фай!"), "лоуфай");
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(unescape_entities("&#39;quoted&#x27;"), "'quoted'");
        assert_eq!(unescape_entities("AT&T rocks"), "AT&T rocks");
        assert_eq!(unescape_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<p>Hello<br/>world &amp; <b>friends</b></p>"),
            "Hello world & friends"
        );
    }
}
