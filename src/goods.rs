//! Product album ("goods") of a feed, grouped into rank tiers.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::feed::GoodsItem;
use crate::image_proxy::ImageProxy;

/// Preview images shown on an interactive card.
pub const MAX_PREVIEW_IMAGES: usize = 3;

pub fn rank_label(level: u64) -> Option<&'static str> {
    match level {
        1 => Some("夯"),
        2 => Some("顶级"),
        3 => Some("人上人"),
        4 => Some("NPC"),
        5 => Some("拉"),
        _ => None,
    }
}

/// Label variant used on Instant View pages.
pub fn rank_label_emoji(level: u64) -> Option<&'static str> {
    match level {
        1 => Some("🏆夯"),
        2 => Some("🆙顶级"),
        3 => Some("👑人上人"),
        4 => Some("🚶🏻‍➡️NPC"),
        5 => Some("💩拉"),
        _ => None,
    }
}

pub struct GoodsGroup<'a> {
    pub level: u64,
    pub items: Vec<&'a GoodsItem>,
}

/// Group items by level, ascending. Item order inside a group is kept.
pub fn group_by_level(items: &[GoodsItem]) -> Vec<GoodsGroup<'_>> {
    let mut groups: BTreeMap<u64, Vec<&GoodsItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.level).or_default().push(item);
    }
    groups
        .into_iter()
        .map(|(level, items)| GoodsGroup { level, items })
        .collect()
}

/// Images the lightbox shows for an item: the logo first, then the album.
pub fn gallery(item: &GoodsItem, proxy: &ImageProxy) -> Vec<String> {
    std::iter::once(item.item_logo.as_str())
        .filter(|logo| !logo.is_empty())
        .chain(item.images())
        .map(|url| proxy.proxy(url))
        .collect()
}

fn esc(s: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_text(s)
}

fn attr(s: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(s)
}

/// Cards for the interactive page.
pub fn write_cards(body: &mut Vec<u8>, items: &[GoodsItem], proxy: &ImageProxy) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    write!(body, r#"<div class="goods-container">"#)?;
    for group in group_by_level(items) {
        let rank = group.level.clamp(1, 5);
        write!(body, r#"<div class="goods-level-group rank-{}">"#, rank)?;
        if let Some(label) = rank_label(group.level) {
            write!(
                body,
                r#"<div class="product-rank-badge"><span class="product-rank-text">{}</span></div>"#,
                label
            )?;
        }
        write!(body, r#"<div class="goods-items">"#)?;
        for item in &group.items {
            let images = gallery(item, proxy);
            write!(body, r#"<div class="product-goods-card">"#)?;
            if item.item_logo.is_empty() {
                write!(body, r#"<div class="product-thumbnail-placeholder">📦</div>"#)?;
            } else {
                let logo = proxy.proxy(&item.item_logo);
                write!(
                    body,
                    r#"<a class="product-thumbnail-container" href="{0}" target="_blank" rel="noopener noreferrer"><img class="product-thumbnail" src="{0}" alt="{1}" loading="lazy"></a>"#,
                    attr(&logo),
                    attr(&item.item_name)
                )?;
            }
            write!(
                body,
                r#"<div class="goods-info"><h3 class="goods-title">{}</h3>"#,
                esc(&item.item_name)
            )?;
            if let Some(desc) = item.item_description.as_deref().filter(|d| !d.is_empty()) {
                write!(body, r#"<div class="goods-specs">{}</div>"#, esc(desc))?;
            }
            let previews = item.images();
            if !previews.is_empty() {
                write!(body, r#"<div class="goods-image-preview">"#)?;
                // the gallery starts with the logo when there is one
                let offset = images.len() - previews.len();
                for (idx, _) in previews.iter().take(MAX_PREVIEW_IMAGES).enumerate() {
                    let src = &images[offset + idx];
                    write!(
                        body,
                        r#"<a href="{0}" target="_blank" rel="noopener noreferrer"><img class="goods-preview-image" src="{0}" alt="{1}-{2}" loading="lazy"></a>"#,
                        attr(src),
                        attr(&item.item_name),
                        idx
                    )?;
                }
                write!(body, "</div>")?;
            }
            write!(body, "</div></div>")?;
        }
        write!(body, "</div></div>")?;
    }
    write!(body, "</div>")?;
    Ok(())
}

/// Simplified list for Instant View pages.
pub fn write_list(body: &mut Vec<u8>, items: &[GoodsItem]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    write!(body, "<div>")?;
    for group in group_by_level(items) {
        write!(body, "<div>")?;
        if let Some(label) = rank_label_emoji(group.level) {
            write!(body, "<h3>【{}】</h3>", label)?;
        }
        write!(body, "<ul>")?;
        for item in &group.items {
            write!(body, "<li>{}</li>", esc(&item.item_name))?;
        }
        write!(body, "</ul></div>")?;
    }
    write!(body, "</div>")?;
    Ok(())
}
