use std::io::Write;
use std::sync::Arc;

use crate::entities::{BasicEntityDecoder, EntityDecoder, FullEntityDecoder};
use crate::error::Result;
use crate::feed::{ContentBlock, FeedRecord, FeedType};
use crate::image_proxy::ImageProxy;
use crate::links::sanitize_links;
use crate::markdown::{looks_like_markdown, MarkdownRenderer};
use crate::viewer::{carousel, grid, lightbox, ViewerConfig};

/// Which page the content ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// `/feed/:id`, lazy images and galleries.
    Interactive,
    /// `/iv/:id`, no script and every image inline.
    Static,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub markdown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    pub src: String,
    pub alt: String,
    pub caption: Option<String>,
    pub lazy: bool,
    /// Lightbox slide the image opens, interactive target only.
    pub slide: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryLayout {
    Grid,
    Carousel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Text { html: String, markdown: bool },
    Image(ImageNode),
    Gallery {
        images: Vec<String>,
        layout: GalleryLayout,
        first_slide: usize,
    },
    /// Article whose structured content could not be parsed.
    Fallback { html: String },
    Unsupported { feed_type: String },
}

/// Image sources in lightbox slide order.
pub fn lightbox_slides(nodes: &[RenderNode]) -> Vec<String> {
    let mut slides = Vec::new();
    for node in nodes {
        match node {
            RenderNode::Image(ImageNode {
                src,
                slide: Some(_),
                ..
            }) => slides.push(src.clone()),
            RenderNode::Gallery { images, .. } => slides.extend(images.iter().cloned()),
            _ => {}
        }
    }
    slides
}

/// Whether a feed should open in Markdown mode.
pub fn markdown_by_default(feed: &FeedRecord) -> bool {
    looks_like_markdown(&feed.text_content())
}

fn cleaner() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .add_tag_attributes("a", &["target"])
        .add_generic_attributes(&["class"]);
    builder
}

/// Turns a feed record into render nodes for one target.
pub struct FeedRenderer {
    target: RenderTarget,
    decoder: Box<dyn EntityDecoder>,
    markdown: Arc<MarkdownRenderer>,
    proxy: ImageProxy,
    cleaner: ammonia::Builder<'static>,
    viewer: ViewerConfig,
}

impl FeedRenderer {
    pub fn new(
        target: RenderTarget,
        decoder: Box<dyn EntityDecoder>,
        markdown: Arc<MarkdownRenderer>,
        proxy: ImageProxy,
    ) -> Self {
        Self {
            target,
            decoder,
            markdown,
            proxy,
            cleaner: cleaner(),
            viewer: ViewerConfig::default(),
        }
    }

    pub fn interactive(markdown: Arc<MarkdownRenderer>, proxy: ImageProxy) -> Self {
        Self::new(
            RenderTarget::Interactive,
            Box::new(FullEntityDecoder),
            markdown,
            proxy,
        )
    }

    pub fn instant_view(markdown: Arc<MarkdownRenderer>, proxy: ImageProxy) -> Self {
        Self::new(
            RenderTarget::Static,
            Box::new(BasicEntityDecoder),
            markdown,
            proxy,
        )
    }

    pub fn target(&self) -> RenderTarget {
        self.target
    }

    pub fn proxy(&self) -> &ImageProxy {
        &self.proxy
    }

    pub fn markdown(&self) -> &MarkdownRenderer {
        &self.markdown
    }

    pub fn viewer(&self) -> &ViewerConfig {
        &self.viewer
    }

    fn emoji_pass(&self) -> bool {
        self.target == RenderTarget::Interactive
    }

    fn clean(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }

    fn text(&self, message: &str, markdown: bool) -> RenderNode {
        let html = if markdown {
            self.markdown
                .render_with_breaks(&self.decoder.decode(message))
        } else {
            sanitize_links(&message.replace('\n', "<br />"), self.emoji_pass())
        };
        RenderNode::Text {
            html: self.clean(&html),
            markdown,
        }
    }

    fn image(&self, url: &str, alt: String, caption: Option<String>, slide: usize) -> RenderNode {
        let interactive = self.target == RenderTarget::Interactive;
        RenderNode::Image(ImageNode {
            src: self.proxy.proxy(url),
            alt,
            caption,
            lazy: interactive,
            slide: interactive.then_some(slide),
        })
    }

    pub fn render(&self, feed: &FeedRecord, opts: RenderOptions) -> Vec<RenderNode> {
        match &feed.feed_type {
            FeedType::FeedArticle => self.render_article(feed, opts),
            FeedType::Feed
            | FeedType::Comment
            | FeedType::Picture
            | FeedType::Question
            | FeedType::Answer => self.render_standard(feed, opts),
            FeedType::Other(feed_type) => vec![RenderNode::Unsupported {
                feed_type: feed_type.clone(),
            }],
        }
    }

    fn render_article(&self, feed: &FeedRecord, opts: RenderOptions) -> Vec<RenderNode> {
        let blocks = match feed.blocks() {
            Some(Ok(blocks)) => blocks,
            _ => {
                let html = feed.message.replace("\\n", "\n").replace('\n', "<br />");
                let html = sanitize_links(&html, self.emoji_pass());
                return vec![RenderNode::Fallback {
                    html: self.clean(&html),
                }];
            }
        };

        let mut slides = 0;
        blocks
            .iter()
            .map(|(i, block)| match block {
                ContentBlock::Text { message } => {
                    self.text(&message.replace("\\n", "\n"), opts.markdown)
                }
                ContentBlock::Image { url, description } => {
                    let caption = description
                        .as_deref()
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_owned);
                    let alt = caption.clone().unwrap_or_else(|| format!("feed-image-{i}"));
                    slides += 1;
                    self.image(url, alt, caption, slides - 1)
                }
            })
            .collect()
    }

    fn render_standard(&self, feed: &FeedRecord, opts: RenderOptions) -> Vec<RenderNode> {
        let mut nodes = vec![self.text(&feed.message, opts.markdown)];
        let pics: Vec<&str> = feed
            .pic_arr
            .iter()
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        if pics.is_empty() {
            return nodes;
        }

        match self.target {
            RenderTarget::Static => {
                nodes.extend(
                    pics.iter()
                        .enumerate()
                        .map(|(i, url)| self.image(url, format!("image-{i}"), None, i)),
                );
            }
            RenderTarget::Interactive => {
                let layout = if feed.feed_type == FeedType::Picture && pics.len() > 1 {
                    GalleryLayout::Grid
                } else {
                    GalleryLayout::Carousel
                };
                nodes.push(RenderNode::Gallery {
                    images: pics.iter().map(|url| self.proxy.proxy(url)).collect(),
                    layout,
                    first_slide: 0,
                });
            }
        }
        nodes
    }

    /// Write nodes as HTML for this renderer's target.
    pub fn write_nodes(&self, body: &mut Vec<u8>, nodes: &[RenderNode]) -> Result<()> {
        for node in nodes {
            match node {
                RenderNode::Text { html, markdown } => {
                    let class = match (markdown, self.target) {
                        (true, _) => "markdown-content",
                        (false, RenderTarget::Interactive) => "text-block",
                        (false, RenderTarget::Static) => "iv-text",
                    };
                    write!(body, r#"<div class="{}">{}</div>"#, class, html)?;
                }
                RenderNode::Image(image) => self.write_image(body, image)?,
                RenderNode::Gallery {
                    images,
                    layout,
                    first_slide,
                } => match layout {
                    GalleryLayout::Grid => grid::write_grid(body, images, *first_slide, &self.viewer)?,
                    GalleryLayout::Carousel => carousel::write_carousel(body, images, *first_slide)?,
                },
                RenderNode::Fallback { html } => {
                    write!(body, r#"<div class="pre-wrap">{}</div>"#, html)?;
                }
                RenderNode::Unsupported { feed_type } => {
                    write!(
                        body,
                        r#"<div class="centered">Unsupported feed type: {}</div>"#,
                        html_escape::encode_text(feed_type)
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Lightbox overlays for the images in `nodes`. The Instant View page
    /// has none.
    pub fn write_lightbox(&self, body: &mut Vec<u8>, nodes: &[RenderNode]) -> Result<()> {
        if self.target != RenderTarget::Interactive {
            return Ok(());
        }
        lightbox::write_overlays(body, &lightbox_slides(nodes), &self.viewer)
    }

    fn write_image(&self, body: &mut Vec<u8>, image: &ImageNode) -> Result<()> {
        let src = html_escape::encode_double_quoted_attribute(&image.src);
        let alt = html_escape::encode_double_quoted_attribute(&image.alt);
        match self.target {
            RenderTarget::Static => {
                write!(
                    body,
                    r#"<figure class="iv-image-container"><img src="{}" alt="{}" class="iv-image">"#,
                    src, alt
                )?;
                if let Some(caption) = &image.caption {
                    write!(
                        body,
                        r#"<figcaption class="iv-image-description">{}</figcaption>"#,
                        html_escape::encode_text(caption)
                    )?;
                }
                write!(body, "</figure>")?;
            }
            RenderTarget::Interactive => {
                let loading = if image.lazy { "lazy" } else { "eager" };
                write!(body, r#"<div class="image-container">"#)?;
                match image.slide {
                    Some(slide) => write!(
                        body,
                        r##"<a id="{}" href="#{}">"##,
                        lightbox::image_anchor(slide),
                        lightbox::slide_anchor(slide)
                    )?,
                    None => write!(
                        body,
                        r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
                        src
                    )?,
                }
                write!(
                    body,
                    r#"<img src="{}" alt="{}" class="feed-image" loading="{}"></a>"#,
                    src, alt, loading
                )?;
                if let Some(caption) = &image.caption {
                    write!(
                        body,
                        r#"<div class="image-description">{}</div>"#,
                        html_escape::encode_text(caption)
                    )?;
                }
                write!(body, "</div>")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderers() -> (FeedRenderer, FeedRenderer) {
        let md = Arc::new(MarkdownRenderer::new());
        (
            FeedRenderer::interactive(md.clone(), ImageProxy::default()),
            FeedRenderer::instant_view(md, ImageProxy::default()),
        )
    }

    fn html_of(renderer: &FeedRenderer, nodes: &[RenderNode]) -> String {
        let mut body = Vec::new();
        renderer.write_nodes(&mut body, nodes).unwrap();
        String::from_utf8(body).unwrap()
    }

    #[test]
    fn broken_article_falls_back_to_message() {
        let (interactive, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::FeedArticle,
            message: "hello\\nworld".into(),
            message_raw_output: Some("not json".into()),
            ..Default::default()
        };
        for renderer in [&interactive, &iv] {
            let nodes = renderer.render(&feed, RenderOptions::default());
            assert_eq!(nodes.len(), 1);
            let RenderNode::Fallback { html } = &nodes[0] else {
                panic!("expected fallback, got {nodes:?}");
            };
            assert!(html.contains("hello"));
            assert!(html.contains("<br>world"), "{html}");
        }
    }

    #[test]
    fn unknown_type_is_a_placeholder() {
        let (interactive, _) = renderers();
        let feed: FeedRecord = serde_json::from_str(r#"{"feedType":"poll","message":"x"}"#).unwrap();
        let nodes = interactive.render(&feed, RenderOptions::default());
        assert_eq!(
            nodes,
            vec![RenderNode::Unsupported {
                feed_type: "poll".into()
            }]
        );
        assert!(html_of(&interactive, &nodes).contains("Unsupported feed type: poll"));
    }

    #[test]
    fn article_blocks_become_nodes() {
        let (interactive, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::FeedArticle,
            message_raw_output: Some(
                r#"[{"type":"text","message":"line\\nnext"},{"type":"image","url":"https://image.coolapk.com/a.jpg","description":""},{"type":"image","url":"https://example.com/b.jpg","description":"cap"}]"#
                    .into(),
            ),
            ..Default::default()
        };

        let nodes = interactive.render(&feed, RenderOptions::default());
        assert_eq!(nodes.len(), 3);
        let RenderNode::Text { html, markdown } = &nodes[0] else {
            panic!("expected text");
        };
        assert!(!markdown);
        assert_eq!(html, "line<br>next");
        assert_eq!(
            nodes[1],
            RenderNode::Image(ImageNode {
                src: "/proxy?url=https%3A%2F%2Fimage.coolapk.com%2Fa.jpg".into(),
                alt: "feed-image-1".into(),
                caption: None,
                lazy: true,
                slide: Some(0),
            })
        );
        let RenderNode::Image(img) = &nodes[2] else {
            panic!("expected image");
        };
        assert_eq!(img.alt, "cap");
        assert_eq!(img.caption.as_deref(), Some("cap"));
        assert_eq!(img.slide, Some(1));
        let html = html_of(&interactive, &nodes);
        assert!(html.contains(r##"<a id="image-1" href="#lightbox-1"><img src="https://example.com/b.jpg""##), "{html}");

        let static_nodes = iv.render(&feed, RenderOptions::default());
        let RenderNode::Image(img) = &static_nodes[1] else {
            panic!("expected image");
        };
        assert!(!img.lazy);
        assert_eq!(img.slide, None);
        let html = html_of(&iv, &static_nodes);
        assert!(html.contains(r#"<figcaption class="iv-image-description">cap</figcaption>"#));
        assert!(!html.contains("loading="));
    }

    #[test]
    fn image_alt_counts_skipped_blocks() {
        let (_, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::FeedArticle,
            message_raw_output: Some(
                r#"[{"type":"video","url":"v"},{"type":"text","message":"a"},{"type":"image","url":"https://image.coolapk.com/a.jpg"}]"#
                    .into(),
            ),
            ..Default::default()
        };
        let nodes = iv.render(&feed, RenderOptions::default());
        assert_eq!(nodes.len(), 2);
        let RenderNode::Image(img) = &nodes[1] else {
            panic!("expected image");
        };
        assert_eq!(img.alt, "feed-image-2");
    }

    #[test]
    fn standard_feed_pictures_per_target() {
        let (interactive, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::Feed,
            message: "hi".into(),
            pic_arr: vec!["https://image.coolapk.com/1.jpg".into(), "".into(), "https://image.coolapk.com/2.jpg".into()],
            ..Default::default()
        };

        let nodes = interactive.render(&feed, RenderOptions::default());
        assert_eq!(nodes.len(), 2);
        let RenderNode::Gallery { images, layout, .. } = &nodes[1] else {
            panic!("expected gallery");
        };
        assert_eq!(*layout, GalleryLayout::Carousel);
        assert_eq!(images.len(), 2);
        assert!(images[0].starts_with("/proxy?url="));

        let nodes = iv.render(&feed, RenderOptions::default());
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[2], RenderNode::Image(img) if img.alt == "image-1"));

        let picture = FeedRecord {
            feed_type: FeedType::Picture,
            ..feed
        };
        let nodes = interactive.render(&picture, RenderOptions::default());
        assert!(matches!(&nodes[1], RenderNode::Gallery { layout: GalleryLayout::Grid, .. }));
    }

    #[test]
    fn markdown_mode_renders_markdown() {
        let (interactive, _) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::Feed,
            message: "**hi** &amp; bye\nnext".into(),
            ..Default::default()
        };
        let nodes = interactive.render(&feed, RenderOptions { markdown: true });
        let RenderNode::Text { html, markdown } = &nodes[0] else {
            panic!("expected text");
        };
        assert!(markdown);
        assert!(html.contains("<strong>hi</strong>"), "{html}");
        assert!(html.contains("<br>"));
        assert!(markdown_by_default(&feed));
    }

    #[test]
    fn emoji_pass_only_for_interactive() {
        let (interactive, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::Comment,
            message: "nice [doge]".into(),
            ..Default::default()
        };
        let html = html_of(&interactive, &interactive.render(&feed, RenderOptions::default()));
        assert!(html.contains(r#"<span class="coolapk-emoji">[doge]</span>"#), "{html}");
        let html = html_of(&iv, &iv.render(&feed, RenderOptions::default()));
        assert!(!html.contains("coolapk-emoji"));
    }

    #[test]
    fn output_is_sanitized() {
        let (interactive, _) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::Feed,
            message: r#"<script>alert(1)</script><a class="feed-link-uname" href="/u/42">@小明</a>"#.into(),
            ..Default::default()
        };
        let nodes = interactive.render(&feed, RenderOptions::default());
        let RenderNode::Text { html, .. } = &nodes[0] else {
            panic!("expected text");
        };
        assert!(!html.contains("<script"));
        assert!(html.contains(r#"href="https://www.coolapk.com/u/42""#));
        assert!(html.contains(r#"target="_blank""#));
        assert!(html.contains("noopener"));
    }

    #[test]
    fn lightbox_covers_every_interactive_image() {
        let (interactive, iv) = renderers();
        let feed = FeedRecord {
            feed_type: FeedType::Picture,
            message: "hi".into(),
            pic_arr: (0..4).map(|i| format!("https://image.coolapk.com/{i}.jpg")).collect(),
            ..Default::default()
        };
        let nodes = interactive.render(&feed, RenderOptions::default());
        assert_eq!(lightbox_slides(&nodes).len(), 4);

        let mut body = Vec::new();
        interactive.write_lightbox(&mut body, &nodes).unwrap();
        let html = String::from_utf8(body).unwrap();
        assert_eq!(html.matches(r#"role="dialog""#).count(), 4);
        assert!(html.contains(r#"id="lightbox-3""#));

        let grid = html_of(&interactive, &nodes);
        assert!(grid.contains(r##"href="#lightbox-0""##));

        let nodes = iv.render(&feed, RenderOptions::default());
        assert!(lightbox_slides(&nodes).is_empty());
        let mut body = Vec::new();
        iv.write_lightbox(&mut body, &nodes).unwrap();
        assert!(body.is_empty());
    }
}
