//! A single draggable, resizable image surface inside a window.
//!
//! Coordinates are window-content pixels. The panel owns its image path,
//! the decoded bitmap (through the shared cache), the zoom/pan state and the
//! sibling list used for paging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::decode_queue::{DecodeRequest, DecodeResult};
use crate::geometry::{display_size, fit_within, is_in_resize_corner, PanelRect, Snapper};
use crate::image_cache::{ImageCache, ScaledImage};
use crate::image_loader::{is_supported_image, DecodedImage, PageDirection, SiblingFiles};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 50.0;

/// Largest side of a scaled bitmap. Bigger zoomed views are drawn stretched.
pub const MAX_BITMAP_SIDE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u64);

/// Transferable panel state: where it is and what it shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub bounds: PanelRect,
    pub path: Option<PathBuf>,
}

/// What a pointer press turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Idle,
    /// `grab` is the press point relative to the panel origin.
    Move { grab: (i32, i32) },
    Resize,
    Pan { last: (i32, i32) },
}

/// Everything a drag needs to know about the rest of the window.
#[derive(Debug, Clone)]
pub struct DragContext {
    pub area: (i32, i32),
    pub siblings: Vec<PanelRect>,
    pub snapper: Snapper,
    pub minimum_size: i32,
}

#[derive(Debug)]
pub struct Panel {
    id: PanelId,
    bounds: PanelRect,
    path: Option<PathBuf>,
    image: Option<Arc<DecodedImage>>,
    /// Logical on-screen image size (fit × zoom)
    display_size: Option<(u32, u32)>,
    /// Bitmap backing the display, capped at `MAX_BITMAP_SIDE`
    display: Option<Arc<ScaledImage>>,
    zoom: f64,
    translate: (i32, i32),
    siblings: SiblingFiles,
    /// Bumped on every path change; async results from older generations are dropped
    generation: u64,
    loading: bool,
    gesture: Gesture,
}

impl Panel {
    pub fn new(id: PanelId, bounds: PanelRect) -> Self {
        Self {
            id,
            bounds,
            path: None,
            image: None,
            display_size: None,
            display: None,
            zoom: 1.0,
            translate: (0, 0),
            siblings: SiblingFiles::default(),
            generation: 0,
            loading: false,
            gesture: Gesture::Idle,
        }
    }

    pub fn from_snapshot(id: PanelId, snapshot: &PanelSnapshot) -> Self {
        let mut panel = Self::new(id, snapshot.bounds);
        panel.set_image_path(snapshot.path.clone());
        panel
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn bounds(&self) -> PanelRect {
        self.bounds
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn image(&self) -> Option<&Arc<DecodedImage>> {
        self.image.as_ref()
    }

    pub fn display(&self) -> Option<&Arc<ScaledImage>> {
        self.display.as_ref()
    }

    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.display_size
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn translate(&self) -> (i32, i32) {
        self.translate
    }

    pub fn siblings(&self) -> &SiblingFiles {
        &self.siblings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// File name of the current image, empty without one.
    pub fn file_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot { bounds: self.bounds, path: self.path.clone() }
    }

    /// Replace the path and drop the current bitmap. Nothing is decoded here.
    pub fn set_image_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
        self.image = None;
        self.display = None;
        self.display_size = None;
        self.generation += 1;
        self.loading = false;
    }

    /// Decode the current path on the calling thread and refit.
    pub fn update_image(&mut self, cache: &ImageCache) {
        let Some(path) = self.path.clone() else {
            return;
        };

        self.image = match cache.image(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(panel = ?self.id, error = %e, "image unavailable");
                None
            }
        };
        self.siblings = SiblingFiles::scan(&path);
        self.loading = false;
        self.update_image_size(cache);
    }

    /// Background counterpart of [`Panel::update_image`]: the request to hand
    /// to a decode queue, or `None` without a path.
    pub fn decode_request(&mut self) -> Option<DecodeRequest> {
        let path = self.path.clone()?;
        self.loading = true;
        Some(DecodeRequest { panel: self.id, generation: self.generation, path })
    }

    /// Apply a finished background decode. Results for an older generation
    /// are discarded and `false` is returned.
    pub fn apply_loaded(&mut self, result: DecodeResult, cache: &ImageCache) -> bool {
        if result.panel != self.id || result.generation != self.generation {
            debug!(panel = ?self.id, stale = result.generation, current = self.generation, "dropping stale decode");
            return false;
        }

        self.image = match result.outcome {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(panel = ?self.id, error = %e, "image unavailable");
                None
            }
        };
        self.siblings = result.siblings;
        self.loading = false;
        self.update_image_size(cache);
        true
    }

    /// Refit the current image to the panel at the current zoom.
    pub fn update_image_size(&mut self, cache: &ImageCache) {
        let Some(image) = self.image.clone() else {
            self.display = None;
            self.display_size = None;
            return;
        };

        self.display_size = display_size(image.dimensions(), self.bounds.size_u32(), self.zoom);
        self.display = self.display_size.map(|(w, h)| {
            let (bw, bh) = cap_bitmap((w, h));
            cache.scaled(&image, bw, bh)
        });
    }

    pub fn set_bounds(&mut self, bounds: PanelRect, cache: &ImageCache) {
        self.bounds = bounds;
        self.update_image_size(cache);
    }

    /// Pan the image. Only meaningful when zoomed in.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        if self.zoom > 1.0 {
            self.translate.0 += dx;
            self.translate.1 += dy;
        }
    }

    /// Multiply the zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_by(&mut self, factor: f64, cache: &ImageCache) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if self.zoom <= 1.0 {
            self.translate = (0, 0);
        }
        self.update_image_size(cache);
    }

    pub fn reset_zoom(&mut self, cache: &ImageCache) {
        self.zoom = 1.0;
        self.translate = (0, 0);
        self.update_image_size(cache);
    }

    /// Move to the previous/next sibling file. Returns whether the path
    /// changed; the caller decides how to load it.
    pub fn page(&mut self, direction: PageDirection) -> bool {
        let Some(current) = self.path.as_deref() else {
            return false;
        };
        let Some(next) = self.siblings.adjacent(current, direction).map(Path::to_path_buf) else {
            return false;
        };
        self.set_image_path(Some(next));
        true
    }

    /// Take the first dropped file if it looks like an image.
    pub fn accept_drop(&mut self, paths: &[PathBuf]) -> bool {
        match paths.first() {
            Some(path) if is_supported_image(path) => {
                self.set_image_path(Some(path.clone()));
                true
            }
            Some(path) => {
                debug!(path = %path.display(), "ignoring dropped file");
                false
            }
            None => false,
        }
    }

    /// Shrink the panel to its image at zoom 1.
    pub fn fit_to_image(&mut self, cache: &ImageCache) {
        if let Some(image) = &self.image {
            if let Some((w, h)) = fit_within(image.dimensions(), self.bounds.size_u32()) {
                self.bounds = self.bounds.with_size(w as i32, h as i32);
            }
        }
        self.reset_zoom(cache);
    }

    /// Where the image is drawn, in window coordinates: centered in the
    /// panel and offset by the pan translation.
    pub fn image_rect(&self) -> Option<PanelRect> {
        let (w, h) = self.display_size?;
        let (w, h) = (w as i32, h as i32);
        Some(PanelRect::new(
            self.bounds.x + (self.bounds.width - w) / 2 + self.translate.0,
            self.bounds.y + (self.bounds.height - h) / 2 + self.translate.1,
            w,
            h,
        ))
    }

    /// Start a pointer gesture at window point `(x, y)`.
    ///
    /// Presses in the bottom-right corner resize, anything else moves, or pans
    /// when zoomed in. Locked panels refuse resize and move but still pan.
    pub fn begin_gesture(&mut self, x: i32, y: i32, locked: bool, snap_distance: i32) -> Gesture {
        let local = (x - self.bounds.x, y - self.bounds.y);
        let in_corner = is_in_resize_corner(self.bounds.width, self.bounds.height, local.0, local.1, snap_distance);

        self.gesture = if in_corner {
            if locked {
                Gesture::Idle
            } else {
                Gesture::Resize
            }
        } else if self.zoom > 1.0 {
            Gesture::Pan { last: (x, y) }
        } else if locked {
            Gesture::Idle
        } else {
            Gesture::Move { grab: local }
        };
        self.gesture
    }

    /// Continue the active gesture with the pointer at `(x, y)`. Returns
    /// whether anything changed.
    pub fn drag_to(&mut self, x: i32, y: i32, ctx: &DragContext) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Move { grab } => {
                let (nx, ny) = ctx.snapper.move_to(
                    self.bounds,
                    x - grab.0,
                    y - grab.1,
                    ctx.area,
                    ctx.siblings.iter().copied(),
                );
                let moved = (nx, ny) != (self.bounds.x, self.bounds.y);
                self.bounds = self.bounds.with_origin(nx, ny);
                moved
            }
            Gesture::Resize => {
                let (w, h) = ctx.snapper.resize_to(
                    self.bounds,
                    x - self.bounds.x,
                    y - self.bounds.y,
                    ctx.area,
                    ctx.minimum_size,
                );
                let resized = (w, h) != (self.bounds.width, self.bounds.height);
                self.bounds = self.bounds.with_size(w, h);
                resized
            }
            Gesture::Pan { last } => {
                self.pan(x - last.0, y - last.1);
                self.gesture = Gesture::Pan { last: (x, y) };
                (x, y) != last
            }
        }
    }

    pub fn end_gesture(&mut self, cache: &ImageCache) {
        let previous = std::mem::replace(&mut self.gesture, Gesture::Idle);
        if previous != Gesture::Idle {
            self.update_image_size(cache);
        }
    }
}

/// Scale `(w, h)` down proportionally so neither side exceeds `MAX_BITMAP_SIDE`.
fn cap_bitmap((w, h): (u32, u32)) -> (u32, u32) {
    let longest = w.max(h);
    if longest <= MAX_BITMAP_SIDE {
        return (w, h);
    }
    let shrink = |side: u32| ((side as u64 * MAX_BITMAP_SIDE as u64 / longest as u64) as u32).max(1);
    (shrink(w), shrink(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::image_cache::tests::CountingCodec;
    use image::imageops::FilterType;
    use std::sync::atomic::AtomicUsize;

    fn cache() -> ImageCache {
        ImageCache::new(Box::new(CountingCodec { calls: Arc::new(AtomicUsize::new(0)) }), 1 << 26, FilterType::Nearest)
    }

    fn loaded(path: &str, bounds: PanelRect, cache: &ImageCache) -> Panel {
        let mut panel = Panel::new(PanelId(1), bounds);
        panel.set_image_path(Some(path.into()));
        panel.update_image(cache);
        panel
    }

    fn drag_ctx(area: (i32, i32)) -> DragContext {
        DragContext { area, siblings: Vec::new(), snapper: Snapper::new(20, true), minimum_size: 50 }
    }

    #[test]
    fn test_large_image_fits_by_width() {
        let cache = cache();
        let panel = loaded("/x/400x300.png", PanelRect::sized(200, 200), &cache);
        assert_eq!(panel.display_size(), Some((200, 150)));
        assert_eq!(panel.display().unwrap().size(), (200, 150));
        assert_eq!(panel.image_rect(), Some(PanelRect::new(0, 25, 200, 150)));
    }

    #[test]
    fn test_small_image_keeps_native_size() {
        let cache = cache();
        let panel = loaded("/x/40x30.png", PanelRect::sized(200, 200), &cache);
        assert_eq!(panel.display_size(), Some((40, 30)));
    }

    #[test]
    fn test_decode_failure_leaves_blank_panel() {
        let cache = cache();
        let panel = loaded("/x/corrupt.png", PanelRect::sized(200, 200), &cache);
        assert!(panel.image().is_none());
        assert!(panel.display().is_none());
        assert_eq!(panel.path(), Some(Path::new("/x/corrupt.png")));
    }

    #[test]
    fn test_update_without_path_is_noop() {
        let cache = cache();
        let mut panel = Panel::new(PanelId(1), PanelRect::sized(10, 10));
        panel.update_image(&cache);
        assert!(panel.image().is_none());
        assert_eq!(panel.file_name(), "");
    }

    #[test]
    fn test_zoom_clamps_and_clears_pan() {
        let cache = cache();
        let mut panel = loaded("/x/100x100.png", PanelRect::sized(200, 200), &cache);

        panel.pan(5, 5);
        assert_eq!(panel.translate(), (0, 0));

        panel.zoom_by(2.0, &cache);
        panel.pan(5, -3);
        assert_eq!(panel.translate(), (5, -3));
        assert_eq!(panel.display_size(), Some((200, 200)));

        panel.zoom_by(0.5, &cache);
        assert_eq!(panel.zoom(), 1.0);
        assert_eq!(panel.translate(), (0, 0));

        panel.zoom_by(1000.0, &cache);
        assert_eq!(panel.zoom(), MAX_ZOOM);
        panel.zoom_by(0.0001, &cache);
        assert_eq!(panel.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_huge_zoom_caps_bitmap() {
        let cache = cache();
        let mut panel = loaded("/x/1000x500.png", PanelRect::sized(1000, 500), &cache);
        panel.zoom_by(10.0, &cache);
        assert_eq!(panel.display_size(), Some((10000, 5000)));
        assert_eq!(panel.display().unwrap().size(), (MAX_BITMAP_SIDE, MAX_BITMAP_SIDE / 2));
    }

    #[test]
    fn test_page_without_siblings_is_noop() {
        let mut panel = Panel::new(PanelId(1), PanelRect::sized(10, 10));
        assert!(!panel.page(PageDirection::Next));
        panel.set_image_path(Some("/nowhere/a.png".into()));
        assert!(!panel.page(PageDirection::Next));
    }

    #[test]
    fn test_stale_async_result_is_dropped() {
        let cache = cache();
        let mut panel = Panel::new(PanelId(4), PanelRect::sized(100, 100));
        panel.set_image_path(Some("/x/10x10.png".into()));
        let first = panel.decode_request().unwrap();
        panel.set_image_path(Some("/x/20x20.png".into()));
        let second = panel.decode_request().unwrap();

        let result = |req: DecodeRequest, outcome| DecodeResult {
            panel: req.panel,
            generation: req.generation,
            path: req.path,
            outcome,
            siblings: SiblingFiles::default(),
        };

        let newer = cache.image(Path::new("/x/20x20.png"));
        assert!(panel.apply_loaded(result(second, newer), &cache));
        let older = cache.image(Path::new("/x/10x10.png"));
        assert!(!panel.apply_loaded(result(first, older), &cache));
        assert_eq!(panel.image().unwrap().dimensions(), (20, 20));
        assert!(!panel.is_loading());
    }

    #[test]
    fn test_async_failure_clears_image() {
        let cache = cache();
        let mut panel = Panel::new(PanelId(1), PanelRect::sized(100, 100));
        panel.set_image_path(Some("/x/bad.png".into()));
        let req = panel.decode_request().unwrap();
        let applied = panel.apply_loaded(
            DecodeResult {
                panel: req.panel,
                generation: req.generation,
                path: req.path.clone(),
                outcome: Err(ViewerError::UnsupportedFormat(req.path)),
                siblings: SiblingFiles::default(),
            },
            &cache,
        );
        assert!(applied);
        assert!(panel.image().is_none());
    }

    #[test]
    fn test_move_gesture_snaps_to_edge() {
        let cache = cache();
        let mut panel = Panel::new(PanelId(1), PanelRect::new(100, 100, 100, 100));
        assert_eq!(panel.begin_gesture(110, 110, false, 20), Gesture::Move { grab: (10, 10) });
        assert!(panel.drag_to(20, 300, &drag_ctx((800, 600))));
        assert_eq!(panel.bounds(), PanelRect::new(0, 290, 100, 100));
        panel.end_gesture(&cache);
        assert_eq!(panel.gesture(), Gesture::Idle);
    }

    #[test]
    fn test_resize_from_corner_respects_minimum() {
        let mut panel = Panel::new(PanelId(1), PanelRect::new(10, 10, 100, 100));
        assert_eq!(panel.begin_gesture(105, 105, false, 20), Gesture::Resize);
        panel.drag_to(30, 300, &drag_ctx((800, 600)));
        assert_eq!(panel.bounds(), PanelRect::new(10, 10, 50, 290));
    }

    #[test]
    fn test_locked_refuses_move_and_resize_but_pans() {
        let cache = cache();
        let mut panel = loaded("/x/100x100.png", PanelRect::sized(200, 200), &cache);
        assert_eq!(panel.begin_gesture(195, 195, true, 20), Gesture::Idle);
        assert_eq!(panel.begin_gesture(50, 50, true, 20), Gesture::Idle);

        panel.zoom_by(3.0, &cache);
        assert_eq!(panel.begin_gesture(50, 50, true, 20), Gesture::Pan { last: (50, 50) });
        panel.drag_to(60, 45, &drag_ctx((200, 200)));
        assert_eq!(panel.translate(), (10, -5));
        assert_eq!(panel.bounds(), PanelRect::sized(200, 200));
    }

    #[test]
    fn test_accept_drop_filters_extension() {
        let mut panel = Panel::new(PanelId(1), PanelRect::sized(10, 10));
        assert!(!panel.accept_drop(&["/a/readme.txt".into(), "/a/b.png".into()]));
        assert!(!panel.accept_drop(&[]));
        let before = panel.generation();
        assert!(panel.accept_drop(&["/a/b.PNG".into()]));
        assert_eq!(panel.path(), Some(Path::new("/a/b.PNG")));
        assert_eq!(panel.generation(), before + 1);
    }

    #[test]
    fn test_fit_to_image_shrinks_panel() {
        let cache = cache();
        let mut panel = loaded("/x/400x300.png", PanelRect::new(5, 5, 200, 200), &cache);
        panel.zoom_by(2.0, &cache);
        panel.fit_to_image(&cache);
        assert_eq!(panel.bounds(), PanelRect::new(5, 5, 200, 150));
        assert_eq!(panel.zoom(), 1.0);
        assert_eq!(panel.display_size(), Some((200, 150)));
    }
}
