//! Full screen image viewer with looping navigation, zoom and pan.
//!
//! The slide track is laid out as `[last clone, real slides.., first clone]`
//! so wrapping around animates in the expected direction. A navigation
//! animates onto a neighbour (possibly a clone) and hands back a
//! [`SettleTimer`]; when it fires, [`Lightbox::settle`] commits the new
//! index and jumps from a clone to the real slide with transitions off for
//! that one frame.
//!
//! Without a script the page serves one `:target` overlay per slide, each
//! written from a lightbox opened on that slide.

use std::io::Write;

use super::{cache_busted, LoadState, Point, Size, ViewerConfig};
use crate::error::Result;

pub const CSS: &str = r#".lightbox{display:none;position:fixed;inset:0;z-index:1000;background:rgba(0,0,0,.92);align-items:center;justify-content:center;touch-action:pinch-zoom}
.lightbox:target{display:flex}
body:has(.lightbox:target){overflow:hidden}
.lightbox-backdrop{position:absolute;inset:0}
.lightbox-image{position:relative;max-width:100%;max-height:100%;object-fit:contain}
.lightbox-nav{position:absolute;top:50%;transform:translateY(-50%);color:#fff;font-size:2.5em;padding:0 16px;text-decoration:none}
.lightbox-prev{left:0}
.lightbox-next{right:0}
.lightbox-toolbar{position:absolute;top:0;left:0;right:0;display:flex;gap:16px;align-items:center;padding:12px 16px;color:#fff}
.lightbox-counter{margin-right:auto}
.lightbox-toolbar a{color:#fff}
"#;

/// Fragment id of the overlay showing slide `index`.
pub fn slide_anchor(index: usize) -> String {
    format!("lightbox-{index}")
}

/// Fragment id of the page image that opens slide `index`.
pub fn image_anchor(index: usize) -> String {
    format!("image-{index}")
}

/// Where the page was scrolled when the lightbox opened.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Closed,
    Idle,
    /// Swiping between slides.
    Dragging { start: Point, offset_px: f64 },
    Pinching {
        start_distance: f64,
        start_scale: f64,
        /// Initial pinch midpoint in image coordinates.
        anchor: Point,
    },
    /// Moving a zoomed image with one pointer.
    Panning { start: Point, origin: Point },
    /// A slide animation is running until the timer with `token` fires.
    Transitioning { token: u64, target: usize },
}

/// Ask the host to call [`Lightbox::settle`] with `token` after `delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTimer {
    pub token: u64,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    None,
    Settle(SettleTimer),
    /// The lightbox closed; scroll the page back here.
    RestoreScroll(ScrollPosition),
}

impl From<Option<SettleTimer>> for Effect {
    fn from(timer: Option<SettleTimer>) -> Self {
        timer.map_or(Effect::None, Effect::Settle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_y: f64,
    pub ctrl: bool,
}

#[derive(Debug, Clone)]
pub struct Lightbox {
    config: ViewerConfig,
    /// Pointer drags are only honoured on touch platforms.
    touch: bool,
    images: Vec<String>,
    index: usize,
    mode: Mode,
    scale: f64,
    pan: Point,
    /// Track translation in percent of one slide.
    offset_pct: f64,
    transition: bool,
    viewport: Size,
    rendered: Size,
    pointers: Vec<(u32, Point)>,
    next_token: u64,
    loads: Vec<LoadState>,
    retries: Vec<u32>,
    scroll_lock: Option<ScrollPosition>,
    last_wheel_nav: Option<u64>,
    last_zoom: Option<u64>,
}

impl Lightbox {
    pub fn new(config: ViewerConfig, touch: bool) -> Self {
        Self {
            config,
            touch,
            images: Vec::new(),
            index: 0,
            mode: Mode::Closed,
            scale: 1.0,
            pan: Point::default(),
            offset_pct: 0.0,
            transition: false,
            viewport: Size::default(),
            rendered: Size::default(),
            pointers: Vec::new(),
            next_token: 0,
            loads: Vec::new(),
            retries: Vec::new(),
            scroll_lock: None,
            last_wheel_nav: None,
            last_zoom: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode != Mode::Closed
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn offset_pct(&self) -> f64 {
        self.offset_pct
    }

    pub fn transition_enabled(&self) -> bool {
        self.transition
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Physical track: indices of the real slides, clones included.
    pub fn track(&self) -> Vec<usize> {
        let n = self.images.len();
        if n == 0 {
            return Vec::new();
        }
        let mut track = Vec::with_capacity(n + 2);
        track.push(n - 1);
        track.extend(0..n);
        track.push(0);
        track
    }

    fn real_offset(index: usize) -> f64 {
        -((index + 1) as f64) * 100.0
    }

    pub fn open(&mut self, images: Vec<String>, index: usize, scroll: ScrollPosition, viewport: Size) {
        if images.is_empty() {
            return;
        }
        let n = images.len();
        self.index = index.min(n - 1);
        self.images = images;
        self.loads = vec![LoadState::Idle; n];
        self.retries = vec![0; n];
        self.viewport = viewport;
        self.rendered = Size::default();
        self.pointers.clear();
        self.reset_zoom();
        self.offset_pct = Self::real_offset(self.index);
        self.transition = false;
        self.mode = Mode::Idle;
        self.scroll_lock = Some(scroll);
        self.last_wheel_nav = None;
        self.last_zoom = None;
    }

    /// Close from any state. The saved scroll position is handed out once.
    pub fn close(&mut self) -> Option<ScrollPosition> {
        if self.mode == Mode::Closed {
            return None;
        }
        self.mode = Mode::Closed;
        self.pointers.clear();
        self.reset_zoom();
        self.scroll_lock.take()
    }

    fn reset_zoom(&mut self) {
        self.scale = self.config.min_scale;
        self.pan = Point::default();
    }

    fn commit(&mut self, target: usize) {
        let wrapped_offset = self.offset_pct;
        self.index = target;
        self.offset_pct = Self::real_offset(target);
        // jumping off a clone must not animate
        self.transition = wrapped_offset == self.offset_pct;
        self.mode = Mode::Idle;
    }

    fn navigate(&mut self, forward: bool) -> Option<SettleTimer> {
        let n = self.images.len();
        if self.mode == Mode::Closed || n < 2 {
            return None;
        }
        if let Mode::Transitioning { target, .. } = self.mode {
            self.commit(target);
        }

        self.reset_zoom();
        let target = self.target(forward)?;
        let physical = if forward { self.index + 2 } else { self.index };
        self.offset_pct = -(physical as f64) * 100.0;
        self.transition = true;
        self.next_token += 1;
        let token = self.next_token;
        self.mode = Mode::Transitioning { token, target };
        Some(SettleTimer {
            token,
            delay_ms: self.config.settle_delay_ms,
        })
    }

    /// Slide that `next` (`forward`) or `previous` would settle on.
    pub fn target(&self, forward: bool) -> Option<usize> {
        let n = self.images.len();
        if self.mode == Mode::Closed || n < 2 {
            return None;
        }
        Some(if forward {
            (self.index + 1) % n
        } else {
            (self.index + n - 1) % n
        })
    }

    pub fn next(&mut self) -> Option<SettleTimer> {
        self.navigate(true)
    }

    pub fn previous(&mut self) -> Option<SettleTimer> {
        self.navigate(false)
    }

    /// A settle timer fired. Returns false for timers that were superseded.
    pub fn settle(&mut self, token: u64) -> bool {
        match self.mode {
            Mode::Transitioning { token: current, target } if current == token => {
                self.commit(target);
                true
            }
            _ => false,
        }
    }

    /// The host painted a frame; transitions may run again.
    pub fn frame_rendered(&mut self) {
        if self.mode != Mode::Closed {
            self.transition = true;
        }
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.clamp_pan();
    }

    /// Size of the current image as laid out at scale 1.
    pub fn set_rendered_size(&mut self, rendered: Size) {
        self.rendered = rendered;
        self.clamp_pan();
    }

    pub fn max_pan(&self) -> Point {
        Point::new(
            ((self.rendered.width * self.scale - self.viewport.width) / 2.0).max(0.0),
            ((self.rendered.height * self.scale - self.viewport.height) / 2.0).max(0.0),
        )
    }

    fn clamp_pan(&mut self) {
        let max = self.max_pan();
        self.pan = Point::new(self.pan.x.clamp(-max.x, max.x), self.pan.y.clamp(-max.y, max.y));
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.pan = Point::new(x, y);
        self.clamp_pan();
    }

    pub fn set_scale(&mut self, scale: f64, now_ms: u64) {
        if self.mode == Mode::Closed {
            return;
        }
        let scale = scale.clamp(self.config.min_scale, self.config.max_scale);
        if scale != self.scale {
            self.last_zoom = Some(now_ms);
        }
        self.scale = scale;
        if self.scale <= self.config.min_scale {
            self.pan = Point::default();
        }
        self.clamp_pan();
    }

    pub fn zoom_in(&mut self, now_ms: u64) {
        self.set_scale(self.scale.floor() + 1.0, now_ms);
    }

    pub fn zoom_out(&mut self, now_ms: u64) {
        self.set_scale(self.scale.ceil() - 1.0, now_ms);
    }

    pub fn key(&mut self, key: Key) -> Effect {
        if self.mode == Mode::Closed {
            return Effect::None;
        }
        match key {
            Key::ArrowLeft => self.previous().into(),
            Key::ArrowRight => self.next().into(),
            Key::Escape => self.close().map_or(Effect::None, Effect::RestoreScroll),
            Key::Other => Effect::None,
        }
    }

    pub fn wheel(&mut self, input: WheelInput, now_ms: u64) -> Effect {
        if self.mode == Mode::Closed || input.delta_y == 0.0 {
            return Effect::None;
        }

        if input.ctrl || self.scale > self.config.min_scale {
            if input.delta_y < 0.0 {
                self.zoom_in(now_ms);
            } else {
                self.zoom_out(now_ms);
            }
            return Effect::None;
        }

        let since = |then: Option<u64>| then.map(|t| now_ms.saturating_sub(t));
        if since(self.last_zoom).is_some_and(|d| d < self.config.zoom_quiet_ms) {
            return Effect::None;
        }
        if since(self.last_wheel_nav).is_some_and(|d| d < self.config.wheel_cooldown_ms) {
            return Effect::None;
        }
        self.last_wheel_nav = Some(now_ms);
        if input.delta_y > 0.0 {
            self.next().into()
        } else {
            self.previous().into()
        }
    }

    fn screen_center(&self) -> Point {
        Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0)
    }

    pub fn pointer_down(&mut self, id: u32, at: Point) {
        if self.mode == Mode::Closed || !self.touch {
            return;
        }
        self.pointers.retain(|(p, _)| *p != id);
        self.pointers.push((id, at));

        match self.pointers.as_slice() {
            [(_, a), (_, b), ..] => {
                let (a, b) = (*a, *b);
                let mid = a.midpoint(b);
                let center = self.screen_center();
                self.mode = Mode::Pinching {
                    start_distance: a.distance(b).max(1.0),
                    start_scale: self.scale,
                    anchor: Point::new(
                        (mid.x - center.x - self.pan.x) / self.scale,
                        (mid.y - center.y - self.pan.y) / self.scale,
                    ),
                };
            }
            [_] if self.mode == Mode::Idle => {
                self.mode = if self.scale > self.config.min_scale {
                    Mode::Panning { start: at, origin: self.pan }
                } else {
                    Mode::Dragging { start: at, offset_px: 0.0 }
                };
            }
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, id: u32, at: Point, now_ms: u64) {
        let Some(slot) = self.pointers.iter_mut().find(|(p, _)| *p == id) else {
            return;
        };
        slot.1 = at;

        match self.mode {
            Mode::Dragging { start, .. } => {
                self.mode = Mode::Dragging {
                    start,
                    offset_px: at.x - start.x,
                };
            }
            Mode::Panning { start, origin } => {
                self.set_pan(origin.x + at.x - start.x, origin.y + at.y - start.y);
            }
            Mode::Pinching {
                start_distance,
                start_scale,
                anchor,
            } => {
                if let [(_, a), (_, b), ..] = self.pointers.as_slice() {
                    let (a, b) = (*a, *b);
                    self.set_scale(start_scale * a.distance(b) / start_distance, now_ms);
                    // keep the pinched point under the fingers
                    let mid = a.midpoint(b);
                    let center = self.screen_center();
                    self.set_pan(
                        mid.x - center.x - anchor.x * self.scale,
                        mid.y - center.y - anchor.y * self.scale,
                    );
                }
            }
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, id: u32) -> Effect {
        self.pointers.retain(|(p, _)| *p != id);
        match self.mode {
            Mode::Dragging { offset_px, .. } => {
                self.mode = Mode::Idle;
                if offset_px.abs() <= self.config.swipe_threshold_px {
                    return Effect::None;
                }
                let timer = if offset_px < 0.0 { self.next() } else { self.previous() };
                timer.into()
            }
            Mode::Panning { .. } | Mode::Pinching { .. } => {
                self.mode = Mode::Idle;
                Effect::None
            }
            _ => Effect::None,
        }
    }

    fn neighbours(&self, index: usize) -> bool {
        let n = self.images.len();
        if n == 0 || index >= n {
            return false;
        }
        index == self.index || index == (self.index + 1) % n || index == (self.index + n - 1) % n
    }

    /// URL for slide `index`, or `None` when it should show a placeholder.
    pub fn slide_src(&self, index: usize) -> Option<String> {
        if self.mode == Mode::Closed || !self.neighbours(index) {
            return None;
        }
        let url = &self.images[index];
        Some(match self.retries[index] {
            0 => url.clone(),
            n => cache_busted(url, n),
        })
    }

    pub fn load_state(&self, index: usize) -> LoadState {
        self.loads.get(index).copied().unwrap_or_default()
    }

    pub fn on_image_loaded(&mut self, index: usize) {
        if let Some(state) = self.loads.get_mut(index) {
            *state = LoadState::Loaded;
        }
    }

    pub fn on_image_failed(&mut self, index: usize) {
        if let Some(state) = self.loads.get_mut(index) {
            *state = LoadState::Failed;
        }
    }

    /// Retry a failed slide with a cache busting URL.
    pub fn retry(&mut self, index: usize) -> Option<String> {
        if self.load_state(index) != LoadState::Failed {
            return None;
        }
        self.retries[index] += 1;
        self.loads[index] = LoadState::Requested;
        self.slide_src(index)
    }
}

/// Write one overlay per slide. Each is the lightbox opened on that slide:
/// its arrows link to the overlays `previous` and `next` settle on, and
/// closing links back to the page image so the page returns to where it
/// was. Overlay images are lazy, so only the opened slide is fetched.
pub fn write_overlays(body: &mut Vec<u8>, images: &[String], config: &ViewerConfig) -> Result<()> {
    let n = images.len();
    let mut lightbox = Lightbox::new(config.clone(), false);
    for index in 0..n {
        lightbox.open(images.to_vec(), index, ScrollPosition::default(), Size::default());
        let Some(src) = lightbox.slide_src(index) else {
            continue;
        };
        let close = image_anchor(index);
        write!(
            body,
            r##"<div class="lightbox" id="{}" role="dialog" aria-label="{} / {}"><a class="lightbox-backdrop" href="#{}"></a><img class="lightbox-image" src="{}" alt="lightbox-image-{}" loading="lazy">"##,
            slide_anchor(index),
            index + 1,
            n,
            close,
            html_escape::encode_double_quoted_attribute(&src),
            index
        )?;
        if let (Some(prev), Some(next)) = (lightbox.target(false), lightbox.target(true)) {
            write!(
                body,
                r##"<a class="lightbox-nav lightbox-prev" href="#{}">&lsaquo;</a><a class="lightbox-nav lightbox-next" href="#{}">&rsaquo;</a>"##,
                slide_anchor(prev),
                slide_anchor(next)
            )?;
        }
        write!(
            body,
            r##"<div class="lightbox-toolbar"><span class="lightbox-counter">{} / {}</span><a class="lightbox-retry" href="{}" target="_blank" rel="noopener noreferrer">重新加载</a><a class="lightbox-close" href="#{}">&times;</a></div></div>"##,
            index + 1,
            n,
            html_escape::encode_double_quoted_attribute(&cache_busted(&src, 1)),
            close
        )?;
        lightbox.close();
    }
    Ok(())
}
