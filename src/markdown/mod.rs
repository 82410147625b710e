//! Markdown rendering for feed text.

pub mod detect;
pub mod highlight;
pub mod table;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag};
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::links;
pub use detect::looks_like_markdown;
use highlight::Highlighter;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("FENCE_RE should compile"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]+`").expect("INLINE_CODE_RE should compile"));
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}([FI])(\\d+)\u{E001}").expect("PLACEHOLDER_RE should compile")
});
static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'`\p{Han}\u{3000}-\u{303F}\u{FF00}-\u{FFEF}]+"#)
        .expect("BARE_URL_RE should compile")
});

/// Code stashed away while the link and table passes run over the text.
struct Stash {
    text: String,
    fences: Vec<String>,
    inline: Vec<String>,
}

impl Stash {
    fn new(source: &str) -> Self {
        let mut fences = Vec::new();
        let text = FENCE_RE.replace_all(source, |caps: &Captures| {
            fences.push(caps[0].to_owned());
            format!("\u{E000}F{}\u{E001}", fences.len() - 1)
        });
        let mut inline = Vec::new();
        let text = INLINE_CODE_RE.replace_all(&text, |caps: &Captures| {
            inline.push(caps[0].to_owned());
            format!("\u{E000}I{}\u{E001}", inline.len() - 1)
        });
        Self {
            text: text.into_owned(),
            fences,
            inline,
        }
    }

    fn restore(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &Captures| {
                let stash = if &caps[1] == "F" { &self.fences } else { &self.inline };
                caps[2]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| stash.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }
}

fn is_external(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

fn open_link(href: &str, title: &str) -> String {
    let mut tag = format!(
        r#"<a href="{}""#,
        html_escape::encode_double_quoted_attribute(href)
    );
    if !title.is_empty() {
        tag.push_str(&format!(
            r#" title="{}""#,
            html_escape::encode_double_quoted_attribute(title)
        ));
    }
    if is_external(href) {
        tag.push_str(r#" target="_blank" rel="noopener noreferrer""#);
    }
    tag.push('>');
    tag
}

/// Split a text event around bare URLs.
fn linkify<'a>(text: CowStr<'a>, out: &mut Vec<Event<'a>>) {
    if !text.contains("http") {
        out.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for m in BARE_URL_RE.find_iter(&text) {
        let url = m
            .as_str()
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}'));
        if url.len() <= "https://".len() {
            continue;
        }
        if m.start() > last {
            out.push(Event::Text(text[last..m.start()].to_owned().into()));
        }
        out.push(Event::Html(
            format!(
                "{}{}</a>",
                open_link(url, ""),
                html_escape::encode_text(url)
            )
            .into(),
        ));
        last = m.start() + url.len();
    }

    if last == 0 {
        out.push(Event::Text(text));
    } else if last < text.len() {
        out.push(Event::Text(text[last..].to_owned().into()));
    }
}

/// Adjacent text events are merged so URLs are seen whole.
fn coalesce_text<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::new();
    for event in events {
        if let Event::Text(text) = &event {
            if let Some(Event::Text(prev)) = out.last_mut() {
                *prev = format!("{}{}", &**prev, &**text).into();
                continue;
            }
        }
        out.push(event);
    }
    out
}

/// Drop the `<p>` around a lone paragraph, for table cells.
fn strip_paragraph(html: &str) -> &str {
    let trimmed = html.trim_end();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|rest| rest.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => trimmed,
    }
}

/// Renders Markdown to HTML. Built once and shared, rendering keeps all
/// intermediate state on the stack.
pub struct MarkdownRenderer {
    highlighter: Highlighter,
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self {
            highlighter: Highlighter::new(),
            options,
        }
    }

    pub fn highlight_css(&self) -> &str {
        self.highlighter.css()
    }

    pub fn render(&self, source: &str) -> String {
        self.render_with(source, false)
    }

    /// Like [`render`](Self::render), but every line break in a paragraph
    /// is kept as `<br />`.
    pub fn render_with_breaks(&self, source: &str) -> String {
        self.render_with(source, true)
    }

    fn render_with(&self, source: &str, hard_breaks: bool) -> String {
        let stash = Stash::new(source);
        let text = links::to_markdown_links(&stash.text);
        let render_cell = |cell: &str| {
            let html = self.to_html(&stash.restore(cell), hard_breaks);
            strip_paragraph(&html).to_owned()
        };
        let text = table::convert_tables(&text, &render_cell);
        let text = stash.restore(&text);
        self.to_html(&text, hard_breaks)
    }

    fn code_block(&self, language: Option<&str>, code: &str) -> String {
        let body = self.highlighter.highlight(code, language);
        match language {
            Some(lang) => format!(
                "<pre><code class=\"hljs language-{}\">{}</code></pre>\n",
                html_escape::encode_double_quoted_attribute(lang),
                body
            ),
            None => format!("<pre><code class=\"hljs\">{}</code></pre>\n", body),
        }
    }

    fn to_html(&self, text: &str, hard_breaks: bool) -> String {
        let events = coalesce_text(Parser::new_ext(text, self.options));

        let mut out: Vec<Event> = Vec::with_capacity(events.len());
        let mut code: Option<(Option<String>, String)> = None;
        let mut in_link = 0usize;
        let mut in_image = 0usize;

        for event in events {
            if let Some((lang, mut buf)) = code.take() {
                match event {
                    Event::Text(text) => {
                        buf.push_str(&text);
                        code = Some((lang, buf));
                    }
                    Event::End(Tag::CodeBlock(_)) => {
                        out.push(Event::Html(self.code_block(lang.as_deref(), &buf).into()));
                    }
                    _ => code = Some((lang, buf)),
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_owned)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::Code(text) if in_image == 0 => out.push(Event::Html(
                    format!("<code>{}</code>", html_escape::encode_text(&text)).into(),
                )),
                Event::SoftBreak if hard_breaks => out.push(Event::HardBreak),
                Event::Start(Tag::Link(link_type, dest, title)) => {
                    in_link += 1;
                    let href = if link_type == LinkType::Email {
                        format!("mailto:{}", &*dest)
                    } else {
                        dest.into_string()
                    };
                    out.push(Event::Html(open_link(&href, &title).into()));
                }
                Event::End(Tag::Link(..)) => {
                    in_link = in_link.saturating_sub(1);
                    out.push(Event::Html("</a>".into()));
                }
                Event::Start(Tag::Image(..)) => {
                    in_image += 1;
                    out.push(event);
                }
                Event::End(Tag::Image(..)) => {
                    in_image = in_image.saturating_sub(1);
                    out.push(event);
                }
                Event::Text(text) if in_link == 0 && in_image == 0 => linkify(text, &mut out),
                other => out.push(other),
            }
        }

        let mut html_out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut html_out, out.into_iter());
        html_out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new()
    }

    #[test]
    fn renders_basic_markdown() {
        let html = renderer().render("**bold** and ~~gone~~\n\n- [x] done");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn pseudo_links_inside_fences_are_untouched() {
        let anchor = r#"<a class="feed-link-url" href="https://www.coolapk.com/feed/1">link</a>"#;
        let src = format!(
            "before\n```\n{anchor}\n```\nafter <a class=\"feed-link-tag\" href=\"/t/x\">#x#</a>"
        );
        let html = renderer().render(&src);
        assert!(html.contains(&*html_escape::encode_text(anchor)), "{html}");
        assert!(html.contains(r#"<a href="https://www.coolapk.com/t/x" target="_blank" rel="noopener noreferrer">#x#</a>"#));
    }

    #[test]
    fn pseudo_links_inside_inline_code_are_untouched() {
        let src = r#"see `<a class="feed-link-uname" href="/u/1">@a</a>` here"#;
        let html = renderer().render(src);
        assert!(html.contains("<code>&lt;a class=\"feed-link-uname\" href=\"/u/1\"&gt;@a&lt;/a&gt;</code>"), "{html}");
    }

    #[test]
    fn fenced_code_is_highlighted() {
        let html = renderer().render("```rust\nlet x = 1;\n```");
        assert!(html.contains(r#"<pre><code class="hljs language-rust">"#), "{html}");
        assert!(html.contains("hljs-"));
    }

    #[test]
    fn unknown_language_degrades_to_text() {
        let html = renderer().render("```nope\n<b>\n```");
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn hard_breaks_only_when_asked() {
        let r = renderer();
        assert!(r.render_with_breaks("a\nb").contains("<br />"));
        assert!(!r.render("a\nb").contains("<br />"));
        let code = r.render_with_breaks("```\nx\ny\n```");
        assert!(!code.contains("<br />"));
    }

    #[test]
    fn bare_urls_are_linked() {
        let html = renderer().render("visit https://example.com/a?b=1. 然后");
        assert!(html.contains(r#"<a href="https://example.com/a?b=1" target="_blank" rel="noopener noreferrer">https://example.com/a?b=1</a>."#), "{html}");
    }

    #[test]
    fn explicit_links_open_in_new_tab() {
        let html = renderer().render("[home](https://example.com) [rel](/x)");
        assert!(html.contains(r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">home</a>"#));
        assert!(html.contains(r#"<a href="/x">rel</a>"#));
    }

    #[test]
    fn tables_render_with_inline_markdown_cells() {
        let html = renderer().render("| a | b |\n|---|:-:|\n| **x** | `y|z` |");
        assert!(html.contains("<table>"), "{html}");
        assert!(html.contains("<td><strong>x</strong></td>"), "{html}");
        assert!(html.contains(r#"<td class="align-center"><code>y|z</code></td>"#), "{html}");
    }
}
