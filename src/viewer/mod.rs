//! Image viewer: grid, carousel and lightbox.
//!
//! The state machines are host agnostic: a host feeds in events with
//! timestamps and geometry, and acts on what comes back. Timers are
//! represented as tokens so a timer that fires late can be recognised
//! and dropped. The served page has no script, so each component also
//! writes the markup and CSS of its initial state, and navigation happens
//! through links between `:target` overlays.

pub mod carousel;
pub mod grid;
pub mod lightbox;

pub use grid::{GridLayout, SequentialLoader};
pub use lightbox::Lightbox;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Tunables shared by the viewer components.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// The carousel box is at most `width * box_ratio` tall.
    pub box_ratio: f64,
    pub wide_screen_min_width: f64,
    pub grid_gap_px: f64,
    /// Vertical space kept free around the grid on wide screens.
    pub grid_reserved_height: f64,
    pub grid_min_height: f64,
    pub carousel_max_height: f64,
    pub settle_delay_ms: u64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub wheel_cooldown_ms: u64,
    /// Wheel navigation is suppressed this long after a zoom change.
    pub zoom_quiet_ms: u64,
    pub swipe_threshold_px: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            box_ratio: 4.0 / 3.0,
            wide_screen_min_width: 768.0,
            grid_gap_px: 8.0,
            grid_reserved_height: 370.0,
            grid_min_height: 300.0,
            carousel_max_height: 600.0,
            settle_delay_ms: 300,
            min_scale: 1.0,
            max_scale: 15.0,
            wheel_cooldown_ms: 150,
            zoom_quiet_ms: 1000,
            swipe_threshold_px: 100.0,
        }
    }
}

/// Stylesheet for the grid, the carousel and the lightbox overlays.
pub fn viewer_css(config: &ViewerConfig) -> String {
    format!(
        "{}{}{}",
        grid::css(config),
        carousel::css(config),
        lightbox::CSS
    )
}

/// Load state of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Requested,
    Loaded,
    Failed,
}

/// Append a retry nonce so the browser cannot answer from its cache.
pub fn cache_busted(url: &str, nonce: u32) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}_retry={nonce}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_follows_config() {
        let css = viewer_css(&ViewerConfig::default());
        assert!(css.contains("@media (min-width:768px)"), "{css}");
        assert!(css.contains("min(calc(100cqw * 1.3333),600px)"), "{css}");
        assert!(css.contains(".lightbox:target{display:flex}"));

        let custom = ViewerConfig {
            wide_screen_min_width: 1024.0,
            carousel_max_height: 480.0,
            ..ViewerConfig::default()
        };
        let css = viewer_css(&custom);
        assert!(css.contains("@media (min-width:1024px)"));
        assert!(css.contains(",480px)"));
    }

    #[test]
    fn cache_busting_keeps_query() {
        assert_eq!(cache_busted("/a.jpg", 1), "/a.jpg?_retry=1");
        assert_eq!(cache_busted("/proxy?url=x", 2), "/proxy?url=x&_retry=2");
    }
}
