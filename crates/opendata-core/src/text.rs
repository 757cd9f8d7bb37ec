//! Text helpers for slugs and plain-text summaries

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"))
}

/// Build an ASCII URL slug: lowercase `[a-z0-9]` runs joined by `-`.
///
/// Accents are stripped through compatibility decomposition. Characters
/// with no ASCII decomposition act as separators.
pub fn slugify(input: &str) -> String {
    let folded: String = input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    separator_re()
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

struct MarkdownPatterns {
    image: Regex,
    link: Regex,
    markup: Regex,
    whitespace: Regex,
}

fn markdown_patterns() -> &'static MarkdownPatterns {
    static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MarkdownPatterns {
        image: Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid image regex"),
        link: Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link regex"),
        markup: Regex::new(r"(?m)^\s{0,3}(#{1,6}|>|[-*+]|\d+\.)\s+|[*_`~]")
            .expect("valid markup regex"),
        whitespace: Regex::new(r"\s+").expect("valid whitespace regex"),
    })
}

/// Strip markdown markup, keeping the readable text on one line.
pub fn strip_markdown(input: &str) -> String {
    let patterns = markdown_patterns();
    let text = patterns.image.replace_all(input, "$1");
    let text = patterns.link.replace_all(&text, "$1");
    let text = patterns.markup.replace_all(&text, "");
    patterns.whitespace.replace_all(text.trim(), " ").into_owned()
}
