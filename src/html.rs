use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use regex::Regex;
use std::borrow::Cow;
use std::io::Write;
use std::sync::LazyLock;
use url::Url;

use crate::abbrev::ellipsize;
use crate::error::Result;
use crate::feed::FeedRecord;
use crate::goods;
use crate::image_proxy::ImageProxy;
use crate::links::SOURCE_ORIGIN;
use crate::render::{markdown_by_default, FeedRenderer, RenderNode, RenderOptions};
use crate::summary::DISCLAIMER;
use crate::theme;
use crate::viewer::ViewerConfig;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("TAG_RE should compile"));

const OG_DESCRIPTION_CHARS: usize = 200;
const SITE_NAME: &str = "Coolapk1s";
/// Source timezone of the platform (UTC+8).
const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

fn esc(s: &str) -> Cow<'_, str> {
    html_escape::encode_text(s)
}

fn attr(s: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(s)
}

pub fn og_description(message: &str) -> String {
    let without_break = message.replace("<!--break-->", "");
    let text = TAG_RE.replace_all(&without_break, "");
    ellipsize(text.trim(), OG_DESCRIPTION_CHARS).into_owned()
}

/// `dateline` as shown on the feed page, in the platform's timezone.
pub fn format_dateline(dateline: u64) -> String {
    let Some(utc) = i64::try_from(dateline)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    else {
        return String::new();
    };
    match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(offset) => utc
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => utc.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

pub fn published_time(dateline: u64) -> String {
    i64::try_from(dateline)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Turn a pasted share link or bare id into a mirror URL.
pub fn clean_link(origin: &str, input: &str) -> Option<String> {
    let input = input.trim();
    if input.contains("coolapk.com") {
        if let Ok(url) = Url::parse(input) {
            return Some(format!("{}{}", origin, url.path()));
        }
    }
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{}/feed/{}", origin, input));
    }
    None
}

fn write_head(body: &mut Vec<u8>, title: &str) -> Result<()> {
    write!(
        body,
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{}</title>
"#,
        esc(title)
    )?;
    Ok(())
}

fn write_style(body: &mut Vec<u8>, css: &str) -> Result<()> {
    write!(body, "  <style>{}</style>\n</head>\n<body>\n", css)?;
    Ok(())
}

fn write_meta(
    body: &mut Vec<u8>,
    feed: &FeedRecord,
    proxy: &ImageProxy,
    instant_view: bool,
) -> Result<()> {
    write!(
        body,
        r#"  <meta property="og:title" content="{}">
  <meta property="og:description" content="{}">
  <meta property="og:site_name" content="{}">
  <meta name="twitter:card" content="summary_large_image">
"#,
        attr(feed.title()),
        attr(&og_description(&feed.message)),
        SITE_NAME
    )?;

    if let Some(cover) = feed.cover_image() {
        let image = proxy.proxy(cover);
        write!(
            body,
            r#"  <meta property="og:image" content="{0}">
  <meta property="twitter:image" content="{0}">
"#,
            attr(&image)
        )?;
    }

    if instant_view {
        write!(
            body,
            r#"  <meta property="al:android:app_name" content="Medium">
  <meta property="article:published_time" content="{}">
  <meta name="author" content="{}">
"#,
            published_time(feed.dateline),
            attr(&feed.username)
        )?;
    }
    Ok(())
}

/// Everything the interactive page shows for one feed.
pub struct FeedPage<'a> {
    pub id: u64,
    pub feed: &'a FeedRecord,
    pub summary: Option<&'a str>,
    /// Requested from an Android browser; the open link targets the app.
    pub android: bool,
}

fn open_original(page: &FeedPage) -> (String, &'static str) {
    if page.android {
        (
            format!(
                "intent://www.coolapk.com/feed/{}#Intent;scheme=https;package=com.coolapk.market;end",
                page.id
            ),
            "APP 内打开",
        )
    } else {
        (page.feed.source_url(page.id), "打开原链接")
    }
}

/// Write content with both Markdown and plain variants of every text node,
/// switched by the `md-toggle` checkbox.
fn write_toggled_content(
    body: &mut Vec<u8>,
    renderer: &FeedRenderer,
    markdown: &[RenderNode],
    plain: &[RenderNode],
) -> Result<()> {
    for (md_node, plain_node) in markdown.iter().zip(plain) {
        match (md_node, plain_node) {
            (RenderNode::Text { .. }, RenderNode::Text { .. }) => {
                write!(body, r#"<div class="variant-markdown">"#)?;
                renderer.write_nodes(body, std::slice::from_ref(md_node))?;
                write!(body, r#"</div><div class="variant-plain">"#)?;
                renderer.write_nodes(body, std::slice::from_ref(plain_node))?;
                write!(body, "</div>")?;
            }
            _ => renderer.write_nodes(body, std::slice::from_ref(md_node))?,
        }
    }
    Ok(())
}

pub fn feed_page(renderer: &FeedRenderer, page: &FeedPage) -> Result<Vec<u8>> {
    let feed = page.feed;
    let proxy = renderer.proxy();
    let mut body = Vec::new();

    write_head(&mut body, feed.title())?;
    write_meta(&mut body, feed, proxy, false)?;
    write_style(
        &mut body,
        &theme::feed_css(renderer.markdown().highlight_css(), renderer.viewer()),
    )?;

    let checked = if markdown_by_default(feed) { " checked" } else { "" };
    write!(
        body,
        r#"<div class="container">
<input type="checkbox" id="md-toggle" class="toggle"{}>
<input type="checkbox" id="bar-close" class="toggle">
<div class="header">
  <h1 class="title">{}</h1>
  <div class="user-info">
    <img src="{}" alt="{}" class="avatar">
    <div><strong class="username">{}</strong><div class="dateline">{}</div></div>
    <div class="controls"><span>Markdown</span><label class="switch" for="md-toggle"><span class="slider"></span></label></div>
  </div>
</div>
<div class="content">
"#,
        checked,
        esc(feed.title()),
        attr(&proxy.proxy(&feed.user_avatar)),
        attr(&feed.username),
        esc(&feed.username),
        format_dateline(feed.dateline),
    )?;

    if let Some(summary) = page.summary {
        write!(
            body,
            r#"<div class="ai-summary"><p class="ai-summary-text">{}</p><p class="ai-summary-disclaimer">{}</p></div>"#,
            esc(summary),
            DISCLAIMER
        )?;
    }

    let markdown = renderer.render(feed, RenderOptions { markdown: true });
    let plain = renderer.render(feed, RenderOptions { markdown: false });
    write_toggled_content(&mut body, renderer, &markdown, &plain)?;
    goods::write_cards(&mut body, &feed.product_album, proxy)?;

    let (href, label) = open_original(page);
    write!(
        body,
        r#"
</div>
<div class="floating-bar-container"><div class="floating-bar"><a href="{}" target="_blank" rel="noopener noreferrer" class="original-link-button">{}</a><label for="bar-close" class="close-button">&times;</label></div></div>
</div>
"#,
        attr(&href),
        label
    )?;
    renderer.write_lightbox(&mut body, &markdown)?;
    write!(body, "</body>\n</html>\n")?;

    Ok(body)
}

/// Script-free page for Telegram Instant View.
pub fn instant_view_page(renderer: &FeedRenderer, id: u64, feed: &FeedRecord) -> Result<Vec<u8>> {
    let proxy = renderer.proxy();
    let mut body = Vec::new();

    write_head(&mut body, feed.title())?;
    write_meta(&mut body, feed, proxy, true)?;
    write_style(
        &mut body,
        &theme::instant_view_css(renderer.markdown().highlight_css()),
    )?;

    write!(
        body,
        r#"<div class="iv-container">
<header class="iv-page-header"></header>
<article>
"#
    )?;
    if let Some(cover) = feed.message_cover.as_deref().filter(|c| !c.is_empty()) {
        write!(
            body,
            r#"<section class="is-imageBackgrounded iv-cover-section"><figure class="iv-cover-figure"><img src="{}" alt="cover" class="iv-cover-image"></figure></section>
"#,
            attr(&proxy.proxy(cover))
        )?;
    }
    write!(
        body,
        r#"<h1 class="iv-title">{}</h1>
<section class="iv-content-section">
<p class="iv-source-link"><a href="{}" rel="noopener noreferrer" class="iv-link">查看原文</a></p>
<p></p>
"#,
        esc(feed.title()),
        attr(&feed.source_url(id))
    )?;

    let nodes = renderer.render(
        feed,
        RenderOptions {
            markdown: markdown_by_default(feed),
        },
    );
    renderer.write_nodes(&mut body, &nodes)?;
    goods::write_list(&mut body, &feed.product_album)?;

    write!(
        body,
        r#"
</section>
</article>
<footer class="iv-footer"><p>From {}</p></footer>
</div>
</body>
</html>
"#,
        SITE_NAME
    )?;
    Ok(body)
}

/// Page for a failed fetch or a missing feed, on either target.
pub fn message_page(message: &str, instant_view: bool, highlight_css: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let title = if message.starts_with("Error") {
        "Error"
    } else {
        "Not Found"
    };
    write_head(&mut body, title)?;
    let (css, container) = if instant_view {
        (theme::instant_view_css(highlight_css), "iv-container")
    } else {
        (
            theme::feed_css(highlight_css, &ViewerConfig::default()),
            "container",
        )
    };
    write_style(&mut body, &css)?;
    write!(
        body,
        r#"<div class="{}"><div class="centered">{}</div></div>
</body>
</html>
"#,
        container,
        esc(message)
    )?;
    Ok(body)
}

pub fn error_message(err: &crate::error::Error) -> String {
    format!("Error: {}", err)
}

pub const NOT_FOUND_MESSAGE: &str = "No feed data found.";

/// Landing page with the link-cleaning form.
pub fn index_page(origin: &str, link: Option<&str>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    write_head(&mut body, "Coolapk1s")?;
    write!(
        body,
        r#"  <meta property="og:site_name" content="{}">
"#,
        SITE_NAME
    )?;
    write_style(&mut body, &theme::index_css())?;

    let link = link.unwrap_or("");
    write!(
        body,
        r#"<div class="home">
<h1>Coolapk1s</h1>
<p class="hint">粘贴酷安分享链接或动态 ID，生成无追踪的浏览链接。</p>
<form method="get" action="/">
  <input type="text" name="link" value="{}" placeholder="{}/feed/..." autocomplete="off">
  <button type="submit">转换</button>
</form>
"#,
        attr(link),
        attr(SOURCE_ORIGIN)
    )?;

    if !link.trim().is_empty() {
        match clean_link(origin, link) {
            Some(clean) => write!(
                body,
                r#"<p class="output"><a href="{0}" id="output-link-text">{1}</a></p>
"#,
                attr(&clean),
                esc(&clean)
            )?,
            None => write!(body, "<p class=\"output hint\">无法识别的链接</p>\n")?,
        }
    }

    write!(body, "</div>\n</body>\n</html>\n")?;
    Ok(body)
}
