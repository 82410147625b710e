//! Inline stylesheets. Pages carry their CSS in a `<style>` block so the
//! Instant View page stays self-contained.

use crate::viewer::{viewer_css, ViewerConfig};

pub const BASE_FONT: &str =
    r#"-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,"Helvetica Neue",Arial,sans-serif"#;

/// Rules shared by every page rendering feed content.
const CONTENT_CSS: &str = r#"
a{word-break:break-all;overflow-wrap:break-word;color:#0366d6;text-decoration:none}
a:hover{color:#0056b3;text-decoration:underline}
.pre-wrap{white-space:pre-wrap}
.centered{display:flex;justify-content:center;align-items:center;min-height:calc(100vh - 200px);font-size:1.2em}
.markdown-content{max-width:100%;overflow-wrap:break-word}
.markdown-content h1{font-size:1.4em}
.markdown-content h2{font-size:1.3em}
.markdown-content h3{font-size:1.2em}
.markdown-content h4,.markdown-content h5,.markdown-content h6{font-size:1.1em}
.markdown-content ul,.markdown-content ol{padding-left:2em;margin:16px 0}
.markdown-content li{margin:4px 0;line-height:1.6}
.markdown-content pre{white-space:pre;overflow-x:auto;background:#f6f8fa;padding:16px;border-radius:6px;color:#24292e;box-sizing:border-box;margin:16px 0}
.markdown-content code{padding:.2em .4em;font-size:85%;background:rgba(27,31,35,.05);border-radius:3px}
.markdown-content pre code{padding:0;font-size:inherit;background:transparent;border-radius:0;color:inherit}
.markdown-content blockquote{margin:16px 0;padding:0 1em;color:#6a737d;border-left:.25em solid #dfe2e5}
.markdown-content table{border-collapse:collapse;margin:16px 0;display:block;overflow-x:auto}
.markdown-content th,.markdown-content td{border:1px solid #dfe2e5;padding:6px 13px}
.markdown-content tr:nth-child(2n){background:#f6f8fa}
.align-left{text-align:left}
.align-center{text-align:center}
.align-right{text-align:right}
@media (prefers-color-scheme:dark){
a,.markdown-content a{color:#58a6ff}
a:hover{color:#79c0ff}
.markdown-content pre{background:#2d2d2d;color:#e6edf3}
.markdown-content code{background:rgba(255,255,255,.1);color:#e6edf3}
.markdown-content blockquote{color:#8b949e;border-left-color:#30363d}
.markdown-content th,.markdown-content td{border-color:#30363d}
.markdown-content tr:nth-child(2n){background:#161b22}
}
"#;

const FEED_CSS: &str = r#"
body{margin:0;background:#f5f5f5;color:#222}
.container{max-width:800px;margin:0 auto;padding:16px;box-sizing:border-box}
.header{background:#fff;border-radius:12px;padding:16px;margin-bottom:12px}
.title{font-size:1.4em;margin:0 0 12px}
.user-info{display:flex;align-items:center;gap:12px}
.avatar{width:40px;height:40px;border-radius:50%;object-fit:cover}
.username{font-size:1em}
.dateline{color:#888;font-size:.85em}
.controls{margin-left:auto;display:flex;align-items:center;gap:8px;font-size:.9em;color:#666}
.switch{position:relative;display:inline-block;width:40px;height:22px;cursor:pointer}
.slider{position:absolute;inset:0;background:#ccc;border-radius:22px;transition:.2s}
.slider::before{content:"";position:absolute;width:16px;height:16px;left:3px;top:3px;background:#fff;border-radius:50%;transition:.2s}
.toggle{position:absolute;opacity:0;pointer-events:none}
#md-toggle:checked ~ .header .slider{background:#11a34e}
#md-toggle:checked ~ .header .slider::before{transform:translateX(18px)}
#md-toggle:checked ~ .content .variant-plain{display:none}
#md-toggle:not(:checked) ~ .content .variant-markdown{display:none}
.content{background:#fff;border-radius:12px;padding:16px;line-height:1.7;font-size:1.05em}
.ai-summary{background:#f0f7ff;border-left:4px solid #3b82f6;border-radius:8px;padding:12px;margin-bottom:16px}
.ai-summary-text{margin:0}
.ai-summary-disclaimer{margin:6px 0 0;font-size:.75em;color:#888}
.coolapk-emoji{color:#f0a020}
.image-container{margin:12px 0;text-align:center}
.feed-image{max-width:100%;border-radius:6px}
.image-description{color:#666;font-size:.9em;margin-top:6px}
.image-grid-container{margin:12px 0}
.image-grid{display:grid;grid-template-columns:repeat(var(--cols,3),1fr)}
.image-grid-item{display:block;aspect-ratio:1;overflow:hidden;border-radius:6px;background:#eee}
.image-grid-item img{width:100%;height:100%;object-fit:cover}
.image-count-indicator{margin-top:8px;color:#666;font-size:.9em}
.image-count-indicator .image-grid{margin-top:8px}
.carousel-container{position:relative;margin:12px 0}
.carousel{display:flex;overflow-x:auto;scroll-snap-type:x mandatory;scroll-behavior:smooth;border-radius:8px}
.carousel-item{position:relative;flex:0 0 100%;scroll-snap-align:start;display:flex;justify-content:center;align-items:center;background:#000}
.carousel-item img{max-width:100%;object-fit:contain}
.carousel-button{position:absolute;top:50%;transform:translateY(-50%);width:32px;height:32px;line-height:32px;text-align:center;border-radius:50%;background:rgba(0,0,0,.5);color:#fff;font-size:1.4em;text-decoration:none}
.carousel-prev{left:8px}
.carousel-next{right:8px}
.carousel-dots{display:flex;justify-content:center;gap:6px;margin-top:8px;font-size:.8em}
.goods-container{margin-top:24px}
.goods-level-group{margin-bottom:16px}
.product-rank-badge{display:inline-block;padding:2px 10px;border-radius:12px;color:#fff;font-weight:bold;margin-bottom:8px;background:#999}
.rank-1 .product-rank-badge{background:#e53935}
.rank-2 .product-rank-badge{background:#fb8c00}
.rank-3 .product-rank-badge{background:#fdd835;color:#333}
.rank-4 .product-rank-badge{background:#90a4ae}
.rank-5 .product-rank-badge{background:#795548}
.goods-items{display:flex;flex-direction:column;gap:8px}
.product-goods-card{display:flex;gap:12px;padding:12px;border:1px solid #eee;border-radius:8px}
.product-thumbnail{width:72px;height:72px;object-fit:cover;border-radius:6px}
.product-thumbnail-placeholder{width:72px;height:72px;display:flex;align-items:center;justify-content:center;font-size:32px;background:#f0f0f0;border-radius:6px}
.goods-title{margin:0 0 4px;font-size:1em}
.goods-specs{color:#666;font-size:.85em}
.goods-image-preview{display:flex;gap:6px;margin-top:6px}
.goods-preview-image{width:48px;height:48px;object-fit:cover;border-radius:4px}
.floating-bar-container{position:fixed;left:0;right:0;bottom:20px;display:flex;justify-content:center;pointer-events:none}
.floating-bar{display:flex;align-items:center;gap:8px;background:rgba(30,30,30,.85);border-radius:24px;padding:8px 12px;pointer-events:auto}
.original-link-button{color:#fff;padding:4px 12px}
.close-button{color:#ccc;cursor:pointer;font-size:1.2em;padding:0 6px}
#bar-close:checked ~ .floating-bar-container{display:none}
@media (prefers-color-scheme:dark){
body{background:#121212;color:#e0e0e0}
.header,.content{background:#1e1e1e}
.dateline,.controls{color:#aaa}
.ai-summary{background:#1a2433}
.product-goods-card{border-color:#333}
.product-thumbnail-placeholder,.image-grid-item{background:#2a2a2a}
.image-description,.goods-specs{color:#999}
}
"#;

const IV_CSS: &str = r#"
body{margin:0;background:#f9f9f9}
.iv-container{max-width:680px;margin:0 auto;background:#fff;color:#222;line-height:1.6}
.iv-page-header{display:none}
.iv-cover-section,.iv-cover-figure{margin:0;padding:0;width:100%}
.iv-cover-image{width:100%;height:auto;display:block}
.iv-title{font-size:1.5em;margin:0 20px 15px;padding-top:30px;line-height:1.3;color:#000}
.iv-content-section{font-size:1.05em;line-height:1.7;padding:0 20px;margin-bottom:30px}
.iv-source-link{margin:0;font-size:.9em}
.iv-footer{padding:20px;border-top:1px solid #e5e5e5;text-align:center;color:#999;font-size:.9em}
.iv-image-container{margin:20px 0;text-align:center}
.iv-image{max-width:100%;border-radius:4px;box-shadow:0 4px 8px rgba(0,0,0,.1);display:block;margin:0 auto}
.iv-image-description{margin-top:8px;color:#666;font-size:.9em}
@media (prefers-color-scheme:dark){
body{background:#111}
.iv-container{background:#1a1a1a;color:#e0e0e0}
.iv-title{color:#fff}
.iv-footer{border-top-color:#444;color:#888}
.iv-image-description{color:#999}
}
"#;

const INDEX_CSS: &str = r#"
body{margin:0;background:#f5f5f5;color:#222}
.home{max-width:560px;margin:10vh auto 0;padding:24px;background:#fff;border-radius:12px;box-sizing:border-box}
.home h1{margin-top:0}
.home form{display:flex;gap:8px}
.home input{flex:1;padding:10px;border:1px solid #ccc;border-radius:6px;font-size:1em}
.home button{padding:10px 16px;border:0;border-radius:6px;background:#11a34e;color:#fff;font-size:1em}
.output{margin-top:16px;word-break:break-all}
.hint{color:#888;font-size:.9em}
@media (prefers-color-scheme:dark){
body{background:#121212;color:#e0e0e0}
.home{background:#1e1e1e}
.home input{background:#2a2a2a;color:#e0e0e0;border-color:#444}
}
"#;

fn with_font(css: &str) -> String {
    format!("body{{font-family:{}}}{}", BASE_FONT, css)
}

/// Stylesheet of the interactive feed page.
pub fn feed_css(highlight: &str, viewer: &ViewerConfig) -> String {
    with_font(&format!(
        "{}{}{}{}",
        highlight,
        CONTENT_CSS,
        FEED_CSS,
        viewer_css(viewer)
    ))
}

pub fn instant_view_css(highlight: &str) -> String {
    with_font(&format!("{}{}{}", highlight, CONTENT_CSS, IV_CSS))
}

pub fn index_css() -> String {
    with_font(INDEX_CSS)
}
