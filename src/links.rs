//! Rewriting of the platform's pseudo-HTML anchors.
//!
//! Feed text carries three kinds of `<a class="feed-link-…">` tags. They are
//! rewritten into plain anchors for HTML output, or into Markdown links
//! before a Markdown document is parsed.

use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const SOURCE_ORIGIN: &str = "https://www.coolapk.com";
pub const MIRROR_ORIGIN: &str = "https://coolapk1s.com";

static FEED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.)?coolapk\.com/feed/(\d+)").expect("FEED_URL_RE should compile")
});

// Anchor text never spans another `<a`, so a nested pseudo anchor is left
// for neither pass to rewrite.
static URL_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-url"[^>]*?href="([^"]*)"[^>]*>(?:[^<]|<[^a])*?</a>"#)
        .expect("URL_LINK_RE should compile")
});
static TAG_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-tag"[^>]*?href="([^"]*)"[^>]*>#((?:[^<]|<[^a])*?)#</a>"#)
        .expect("TAG_LINK_RE should compile")
});
static UNAME_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-uname"[^>]*?href="([^"]*)"[^>]*>((?:[^<]|<[^a])*?)</a>"#)
        .expect("UNAME_LINK_RE should compile")
});

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("HTML_TAG_RE should compile"));
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([\p{Han}A-Za-z]{1,8})\]").expect("EMOJI_RE should compile")
});
const EMOJI_OPEN: &str = r#"<span class="coolapk-emoji">"#;

static MD_LABELLED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]+)\]\(<a class="feed-link-url"[^>]*?href="([^"]*)"[^>]*?>.*?</a>\)"#)
        .expect("MD_LABELLED_URL_RE should compile")
});
static MD_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-url"[^>]*?href="([^"]*)"[^>]*?>.*?</a>"#)
        .expect("MD_URL_RE should compile")
});
static MD_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-tag"[^>]*?href="([^"]*)"[^>]*?>#(.*?)#</a>"#)
        .expect("MD_TAG_RE should compile")
});
static MD_UNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a class="feed-link-uname"[^>]*?href="([^"]*)"[^>]*?>(.*?)</a>"#)
        .expect("MD_UNAME_RE should compile")
});

/// Point links to a feed on the source platform at the mirror.
pub fn convert_feed_url(url: &str) -> String {
    match FEED_URL_RE.captures(url) {
        Some(caps) => format!("{}/feed/{}", MIRROR_ORIGIN, &caps[1]),
        None => url.to_owned(),
    }
}

fn anchor(href: &str, text: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
        href, text
    )
}

/// Rewrite pseudo anchors into plain anchors. Idempotent.
pub fn sanitize_links(html: &str, enable_emoji_pass: bool) -> String {
    let out = URL_LINK_RE.replace_all(html, |caps: &Captures| {
        let url = convert_feed_url(&caps[1]);
        anchor(&url, &url)
    });
    let out = TAG_LINK_RE.replace_all(&out, |caps: &Captures| {
        anchor(
            &format!("{}{}", SOURCE_ORIGIN, &caps[1]),
            &format!("#{}#", &caps[2]),
        )
    });
    let out = UNAME_LINK_RE.replace_all(&out, |caps: &Captures| {
        anchor(&format!("{}{}", SOURCE_ORIGIN, &caps[1]), &caps[2])
    });

    if !enable_emoji_pass {
        return out.into_owned();
    }
    wrap_emoji(&out)
}

/// Wrap `[code]` emoji in text outside tags. Text that already sits in an
/// emoji span is copied as is.
fn wrap_emoji(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_emoji = false;
    let mut last = 0;
    for tag in HTML_TAG_RE.find_iter(html) {
        push_text(&mut out, &html[last..tag.start()], in_emoji);
        out.push_str(tag.as_str());
        in_emoji = tag.as_str() == EMOJI_OPEN;
        last = tag.end();
    }
    push_text(&mut out, &html[last..], in_emoji);
    out
}

fn push_text(out: &mut String, text: &str, in_emoji: bool) {
    if in_emoji {
        out.push_str(text);
        return;
    }
    out.push_str(&EMOJI_RE.replace_all(text, |caps: &Captures| {
        format!("{}[{}]</span>", EMOJI_OPEN, &caps[1])
    }));
}

/// Turn pseudo anchors into Markdown links, ahead of Markdown parsing.
pub fn to_markdown_links(src: &str) -> String {
    let out = MD_LABELLED_URL_RE.replace_all(src, |caps: &Captures| {
        format!("[{}](<{}>)", &caps[1], &caps[2])
    });
    let out = MD_URL_RE.replace_all(&out, |caps: &Captures| {
        let url = convert_feed_url(&caps[1]);
        format!("[{}](<{}>)", url, url)
    });
    let out = MD_TAG_RE.replace_all(&out, |caps: &Captures| {
        format!("[#{}#](<{}{}>)", &caps[2], SOURCE_ORIGIN, &caps[1])
    });
    MD_UNAME_RE
        .replace_all(&out, |caps: &Captures| {
            format!("[{}](<{}{}>)", &caps[2], SOURCE_ORIGIN, &caps[1])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = concat!(
        r#"看看 <a class="feed-link-url" href="https://www.coolapk.com/feed/123?s=abc" target="_blank">网页链接</a>"#,
        r#" 和 <a class="feed-link-tag" href="/t/数码?type=8">#数码#</a>"#,
        r#" 来自 <a class="feed-link-uname" href="/u/42">@小明</a>"#,
        " [doge]"
    );

    #[test]
    fn converts_only_source_feed_urls() {
        assert_eq!(
            convert_feed_url("https://www.coolapk.com/feed/123?shareKey=x"),
            "https://coolapk1s.com/feed/123"
        );
        assert_eq!(
            convert_feed_url("coolapk.com/feed/9"),
            "https://coolapk1s.com/feed/9"
        );
        assert_eq!(
            convert_feed_url("https://example.com/feed/9"),
            "https://example.com/feed/9"
        );
    }

    #[test]
    fn rewrites_all_three_link_kinds() {
        let out = sanitize_links(MIXED, false);
        assert!(out.contains(
            r#"<a href="https://coolapk1s.com/feed/123" target="_blank" rel="noopener noreferrer">https://coolapk1s.com/feed/123</a>"#
        ));
        assert!(out.contains(
            r#"<a href="https://www.coolapk.com/t/数码?type=8" target="_blank" rel="noopener noreferrer">#数码#</a>"#
        ));
        assert!(out.contains(
            r#"<a href="https://www.coolapk.com/u/42" target="_blank" rel="noopener noreferrer">@小明</a>"#
        ));
        assert!(out.ends_with(" [doge]"));
        assert!(!out.contains("feed-link"));
    }

    #[test]
    fn leaves_unmatched_input_alone() {
        let plain = r#"hello <a href="https://example.com">x</a> <b>bold</b>"#;
        assert_eq!(sanitize_links(plain, false), plain);
    }

    #[test]
    fn emoji_pass_wraps_codes_once() {
        let out = sanitize_links("好 [doge] [笑哭]", true);
        assert_eq!(
            out,
            r#"好 <span class="coolapk-emoji">[doge]</span> <span class="coolapk-emoji">[笑哭]</span>"#
        );
    }

    #[test]
    fn emoji_pass_skips_attribute_values() {
        let out = sanitize_links(r#"<a href="https://example.com/[ab]" title="[cd]">[ab]</a>"#, true);
        assert_eq!(
            out,
            r#"<a href="https://example.com/[ab]" title="[cd]"><span class="coolapk-emoji">[ab]</span></a>"#
        );
    }

    #[test]
    fn nested_pseudo_anchor_rewrites_inner_only() {
        let out = sanitize_links(
            r#"<a class="feed-link-uname" href="/u/1"><a class="feed-link-uname" href="/u/2">b</a></a>"#,
            false,
        );
        assert_eq!(
            out,
            r#"<a class="feed-link-uname" href="/u/1"><a href="https://www.coolapk.com/u/2" target="_blank" rel="noopener noreferrer">b</a></a>"#
        );
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let inputs = [
            MIXED,
            "",
            "plain text",
            r#"<a class="feed-link-url" href="not a feed">t</a>"#,
            r#"<a class="feed-link-uname" href="/u/1">a</a><a class="feed-link-uname" href="/u/2">b</a>"#,
            r#"<a class="feed-link-uname" href="/u/1"><a class="feed-link-uname" href="/u/2">b</a></a>"#,
            r#"<a class="feed-link-tag" href="/t/x"><a class="feed-link-url" href="/feed/1">#y#</a></a>"#,
            r#"<a href="https://example.com/[ab]">[ab]</a>"#,
        ];
        for input in inputs {
            for emoji in [false, true] {
                let once = sanitize_links(input, emoji);
                assert_eq!(sanitize_links(&once, emoji), once, "input: {input}");
            }
        }
    }

    #[test]
    fn markdown_links_from_pseudo_anchors() {
        let out = to_markdown_links(MIXED);
        assert!(out.contains("[https://coolapk1s.com/feed/123](<https://coolapk1s.com/feed/123>)"));
        assert!(out.contains("[#数码#](<https://www.coolapk.com/t/数码?type=8>)"));
        assert!(out.contains("[@小明](<https://www.coolapk.com/u/42>)"));
    }

    #[test]
    fn markdown_link_wrapping_pseudo_anchor_keeps_label() {
        let src = r#"[官网](<a class="feed-link-url" href="https://example.com/a">https://example.com/a</a>)"#;
        assert_eq!(to_markdown_links(src), "[官网](<https://example.com/a>)");
    }
}
