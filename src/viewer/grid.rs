use std::io::Write;

use super::lightbox::{image_anchor, slide_anchor};
use super::ViewerConfig;
use crate::error::Result;

/// Images shown before the grid stops growing.
pub const MAX_GRID_IMAGES: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    /// Number of images placed in the grid.
    pub visible: usize,
    pub total: usize,
}

impl GridLayout {
    pub fn for_count(total: usize) -> Self {
        let (columns, visible) = match total {
            0..=4 => (2, total),
            5..=9 => (3, total),
            _ => (3, MAX_GRID_IMAGES),
        };
        Self {
            columns,
            rows: visible.div_ceil(columns),
            visible,
            total,
        }
    }

    pub fn has_overflow(&self) -> bool {
        self.total > self.visible
    }

    /// CSS width that keeps the cells square when the grid may be at most
    /// `max(viewport height - reserved, min height)` tall. Only applied on
    /// wide screens; narrow screens are unconstrained.
    pub fn max_width_css(&self, config: &ViewerConfig) -> Option<String> {
        if self.rows == 0 {
            return None;
        }
        let gap = config.grid_gap_px;
        Some(format!(
            "calc((max(100vh - {}px, {}px) - {}px) / {} * {} + {}px)",
            config.grid_reserved_height,
            config.grid_min_height,
            (self.rows - 1) as f64 * gap,
            self.rows,
            self.columns,
            (self.columns - 1) as f64 * gap
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Waiting for the images before it.
    Placeholder,
    Loading,
    Done,
}

/// Loads grid images strictly one after another.
#[derive(Debug, Clone)]
pub struct SequentialLoader {
    total: usize,
    current: usize,
}

impl SequentialLoader {
    pub fn new(total: usize) -> Self {
        Self { total, current: 0 }
    }

    pub fn next_to_load(&self) -> Option<usize> {
        (self.current < self.total).then_some(self.current)
    }

    /// The image at `index` finished, successfully or not. Returns the next
    /// index to load. Events for any other index are ignored.
    pub fn on_finished(&mut self, index: usize) -> Option<usize> {
        if index != self.current || self.current >= self.total {
            return None;
        }
        self.current += 1;
        self.next_to_load()
    }

    pub fn slot(&self, index: usize) -> Slot {
        if index < self.current {
            Slot::Done
        } else if index == self.current {
            Slot::Loading
        } else {
            Slot::Placeholder
        }
    }

    /// `loading` attribute for the image at `index`: the one being loaded
    /// is fetched right away, the rest wait for the browser.
    pub fn loading_attr(&self, index: usize) -> &'static str {
        match self.slot(index) {
            Slot::Loading => "eager",
            Slot::Placeholder | Slot::Done => "lazy",
        }
    }
}

pub fn css(config: &ViewerConfig) -> String {
    format!(
        ".image-grid{{gap:{}px}}\n@media (min-width:{}px){{.image-grid{{max-width:min(100%,var(--grid-max-w,100%))}}}}\n",
        config.grid_gap_px, config.wide_screen_min_width
    )
}

fn write_cell(
    body: &mut Vec<u8>,
    url: &str,
    index: usize,
    slide: usize,
    loading: &str,
) -> Result<()> {
    write!(
        body,
        r##"<a class="image-grid-item" id="{}" href="#{}"><img src="{}" alt="grid-image-{}" loading="{}"></a>"##,
        image_anchor(slide),
        slide_anchor(slide),
        html_escape::encode_double_quoted_attribute(url),
        index,
        loading
    )?;
    Ok(())
}

/// Write a grid of `images`. Each cell opens lightbox slide
/// `first_slide + index`; images past the ninth fold into a `<details>`.
pub fn write_grid(
    body: &mut Vec<u8>,
    images: &[String],
    first_slide: usize,
    config: &ViewerConfig,
) -> Result<()> {
    let layout = GridLayout::for_count(images.len());
    let loader = SequentialLoader::new(images.len());
    write!(
        body,
        r#"<div class="image-grid-container"><div class="image-grid" style="--cols:{};--rows:{}"#,
        layout.columns, layout.rows
    )?;
    if let Some(width) = layout.max_width_css(config) {
        write!(body, ";--grid-max-w:{}", width)?;
    }
    write!(body, r#"">"#)?;
    for (i, url) in images.iter().take(layout.visible).enumerate() {
        write_cell(body, url, i, first_slide + i, loader.loading_attr(i))?;
    }
    write!(body, "</div>")?;

    if layout.has_overflow() {
        write!(
            body,
            r#"<details class="image-count-indicator"><summary>共 {} 张图片，展开剩余 {} 张</summary><div class="image-grid" style="--cols:3">"#,
            layout.total,
            layout.total - layout.visible
        )?;
        for (i, url) in images.iter().enumerate().skip(layout.visible) {
            write_cell(body, url, i, first_slide + i, loader.loading_attr(i))?;
        }
        write!(body, "</div></details>")?;
    }
    write!(body, "</div>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_count() {
        assert_eq!(GridLayout::for_count(1).columns, 2);
        assert_eq!(GridLayout::for_count(4).rows, 2);
        assert_eq!(GridLayout::for_count(5).columns, 3);
        assert_eq!(GridLayout::for_count(7).rows, 3);
        let big = GridLayout::for_count(14);
        assert_eq!((big.columns, big.rows, big.visible), (3, 3, 9));
        assert!(big.has_overflow());
        assert!(!GridLayout::for_count(9).has_overflow());
    }

    #[test]
    fn max_width_keeps_cells_square() {
        let config = ViewerConfig::default();
        assert_eq!(
            GridLayout::for_count(9).max_width_css(&config).as_deref(),
            Some("calc((max(100vh - 370px, 300px) - 16px) / 3 * 3 + 16px)")
        );
        assert_eq!(
            GridLayout::for_count(2).max_width_css(&config).as_deref(),
            Some("calc((max(100vh - 370px, 300px) - 0px) / 1 * 2 + 8px)")
        );
        assert_eq!(GridLayout::for_count(0).max_width_css(&config), None);
    }

    #[test]
    fn loads_in_order() {
        let mut loader = SequentialLoader::new(3);
        assert_eq!(loader.next_to_load(), Some(0));
        assert_eq!(loader.slot(2), Slot::Placeholder);
        assert_eq!(loader.on_finished(1), None);
        assert_eq!(loader.on_finished(0), Some(1));
        assert_eq!(loader.slot(0), Slot::Done);
        assert_eq!(loader.slot(1), Slot::Loading);
        assert_eq!(loader.loading_attr(1), "eager");
        assert_eq!(loader.loading_attr(2), "lazy");
        assert_eq!(loader.on_finished(1), Some(2));
        assert_eq!(loader.on_finished(2), None);
        assert_eq!(loader.next_to_load(), None);
    }

    #[test]
    fn grid_cells_open_lightbox_slides() {
        let images: Vec<String> = (0..12).map(|i| format!("/i/{i}.jpg")).collect();
        let mut body = Vec::new();
        write_grid(&mut body, &images, 0, &ViewerConfig::default()).unwrap();
        let html = String::from_utf8(body).unwrap();

        assert!(html.contains("--cols:3;--rows:3;--grid-max-w:calc("));
        assert!(html.contains("展开剩余 3 张"));
        assert_eq!(html.matches("<img").count(), 12);
        assert!(html.contains(
            r##"<a class="image-grid-item" id="image-0" href="#lightbox-0"><img src="/i/0.jpg" alt="grid-image-0" loading="eager"></a>"##
        ));
        assert!(html.contains(r##"id="image-11" href="#lightbox-11""##));
        assert_eq!(html.matches(r#"loading="eager""#).count(), 1);
    }
}
