use regex::RegexSet;
use std::sync::LazyLock;

use crate::entities::{BasicEntityDecoder, EntityDecoder};

static MARKDOWN_SIGNATURES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\*\*[^*]+\*\*",
        r"__[^_]+__",
        r"(?s)```.*?```",
        r"`[^`]+`",
        r"(?m)^\|.+\|\r?$",
        r"(?m)^---+\r?$",
        r"~~[^~]+~~",
    ])
    .expect("MARKDOWN_SIGNATURES should compile")
});

/// Heuristic: does the text use common Markdown syntax?
pub fn looks_like_markdown(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    MARKDOWN_SIGNATURES.is_match(&BasicEntityDecoder.decode(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_syntax() {
        assert!(looks_like_markdown("**bold**"));
        assert!(looks_like_markdown("`code`"));
        assert!(looks_like_markdown("~~strike~~"));
        assert!(looks_like_markdown("above\n---\nbelow"));
        assert!(looks_like_markdown("__under__"));
        assert!(looks_like_markdown("x\n| a | b |\ny"));
        assert!(looks_like_markdown("```\nfn x() {}\n```"));
    }

    #[test]
    fn rejects_plain_text() {
        assert!(!looks_like_markdown(""));
        assert!(!looks_like_markdown("plain text"));
        assert!(!looks_like_markdown("a lone ** marker"));
        assert!(!looks_like_markdown("a - b -- c"));
    }

    #[test]
    fn decodes_entities_first() {
        assert!(looks_like_markdown("&#39;x&#39;\n|a|b|"));
        assert!(looks_like_markdown("&lt;**a** &amp; b&gt;"));
        assert!(!looks_like_markdown("&lt;b&gt;"));
        assert!(looks_like_markdown("&lt;tag&gt; ~~gone~~"));
    }
}
