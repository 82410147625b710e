use std::io::Write;

use super::lightbox::{image_anchor, slide_anchor};
use super::ViewerConfig;
use crate::error::Result;

/// Horizontal strip of images, one container width per scroll step.
#[derive(Debug, Clone, Copy)]
pub struct Carousel {
    count: usize,
}

impl Carousel {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn shows_buttons(&self) -> bool {
        self.count > 1
    }

    /// Slide an arrow in `direction` (`-1` or `1`) scrolls to from `index`,
    /// `None` at either end.
    pub fn step(&self, index: usize, direction: i32) -> Option<usize> {
        let target = index as i64 + i64::from(direction.signum());
        (0..self.count as i64)
            .contains(&target)
            .then_some(target as usize)
    }
}

/// The strip is as tall as its images, but never taller than a
/// `box_ratio` box at container width or the configured cap.
pub fn max_height_css(config: &ViewerConfig) -> String {
    format!(
        "min(calc(100cqw * {:.4}),{}px)",
        config.box_ratio, config.carousel_max_height
    )
}

pub fn css(config: &ViewerConfig) -> String {
    let max = max_height_css(config);
    format!(
        ".carousel-container{{container-type:inline-size}}\n.carousel,.carousel-item img{{max-height:{}}}\n",
        max
    )
}

pub fn write_carousel(
    body: &mut Vec<u8>,
    images: &[String],
    first_slide: usize,
) -> Result<()> {
    let carousel = Carousel::new(images.len());
    write!(body, r#"<div class="carousel-container"><div class="carousel">"#)?;
    for (i, url) in images.iter().enumerate() {
        let slide = first_slide + i;
        write!(
            body,
            r##"<div class="carousel-item" id="slide-{}"><a id="{}" href="#{}"><img src="{}" alt="carousel-image-{}" loading="lazy"></a>"##,
            i,
            image_anchor(slide),
            slide_anchor(slide),
            html_escape::encode_double_quoted_attribute(url),
            i
        )?;
        for (direction, class, label) in [(-1, "carousel-prev", "&lsaquo;"), (1, "carousel-next", "&rsaquo;")] {
            if let Some(target) = carousel.step(i, direction) {
                write!(
                    body,
                    r##"<a class="carousel-button {}" href="#slide-{}">{}</a>"##,
                    class, target, label
                )?;
            }
        }
        write!(body, "</div>")?;
    }
    write!(body, "</div>")?;
    if carousel.shows_buttons() {
        write!(body, r#"<div class="carousel-dots">"#)?;
        for i in 0..images.len() {
            write!(body, r##"<a href="#slide-{0}">{1}</a>"##, i, i + 1)?;
        }
        write!(body, "</div>")?;
    }
    write!(body, "</div>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_stop_at_the_ends() {
        let c = Carousel::new(3);
        assert!(c.shows_buttons());
        assert_eq!(c.step(0, -1), None);
        assert_eq!(c.step(0, 1), Some(1));
        assert_eq!(c.step(2, 1), None);
        assert_eq!(c.step(2, -1), Some(1));
        assert!(!Carousel::new(1).shows_buttons());
        assert_eq!(Carousel::new(0).step(0, 1), None);
    }

    #[test]
    fn height_cap_follows_config() {
        let config = ViewerConfig::default();
        assert_eq!(max_height_css(&config), "min(calc(100cqw * 1.3333),600px)");
    }

    #[test]
    fn slides_link_to_neighbours_and_lightbox() {
        let images = vec!["/a.jpg".to_owned(), "/b.jpg".to_owned()];
        let mut body = Vec::new();
        write_carousel(&mut body, &images, 4).unwrap();
        let html = String::from_utf8(body).unwrap();

        assert!(html.contains(r##"<div class="carousel-item" id="slide-0"><a id="image-4" href="#lightbox-4"><img src="/a.jpg""##));
        assert!(html.contains(r##"<a class="carousel-button carousel-next" href="#slide-1">"##));
        assert_eq!(html.matches("carousel-prev").count(), 1);
        assert!(html.contains(r#"<div class="carousel-dots">"#));

        let mut body = Vec::new();
        write_carousel(&mut body, &images[..1], 0).unwrap();
        let html = String::from_utf8(body).unwrap();
        assert!(!html.contains("carousel-dots"));
        assert!(!html.contains("carousel-button"));
    }
}
