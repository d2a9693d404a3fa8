use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Citation;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern is valid"));

/// Separators stripped from the end of the author fragment. Periods stay so
/// that trailing initials survive.
fn is_author_trailer(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '(' | '[')
}

/// Splits free citation text into author fragment and year.
pub fn parse_citation(text: &str) -> Citation {
    let text = text.trim();
    let mut citation = Citation {
        text: text.to_string(),
        author: None,
        year: None,
    };

    let Some(m) = YEAR_RE.find(text) else {
        return citation;
    };

    citation.year = m.as_str().parse().ok();
    let author = text[..m.start()].trim_end_matches(is_author_trailer);
    if !author.is_empty() {
        citation.author = Some(author.to_string());
    }
    citation
}
