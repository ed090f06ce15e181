//! Panel geometry: snapping, resize hot-zones, aspect-preserving fit and the
//! half-window/half-self layout shortcuts.
//!
//! Everything here is pure integer math on window-content coordinates, so the
//! drag handlers in [`crate::panel`] and the keyboard layout actions in
//! [`crate::window`] can be tested without a running UI.

/// Default pixel threshold within which a drag aligns to an edge.
pub const DEFAULT_SNAP_DISTANCE: i32 = 20;

/// Default floor for panel width/height after a resize.
pub const DEFAULT_MINIMUM_SIZE: i32 = 50;

/// Axis-aligned rectangle in window-content pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PanelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PanelRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin.
    pub const fn sized(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn with_origin(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    pub fn with_size(self, width: i32, height: i32) -> Self {
        Self { width, height, ..self }
    }

    /// Width and height clamped to zero, as unsigned pixel counts.
    pub fn size_u32(&self) -> (u32, u32) {
        (self.width.max(0) as u32, self.height.max(0) as u32)
    }

    /// Overlap of the vertical extents, endpoints inclusive.
    fn overlaps_vertically(&self, other: &PanelRect) -> bool {
        let (y, bottom) = (self.y, self.bottom());
        (other.y <= y && y <= other.bottom())
            || (other.y <= bottom && bottom <= other.bottom())
            || (y < other.y && other.bottom() < bottom)
    }

    /// Overlap of the horizontal extents, endpoints inclusive.
    fn overlaps_horizontally(&self, other: &PanelRect) -> bool {
        let (x, right) = (self.x, self.right());
        (other.x <= x && x <= other.right())
            || (other.x <= right && right <= other.right())
            || (x <= other.x && other.right() < right)
    }
}

/// Snap a single coordinate to the near (0) or far (`axis_max`) edge.
pub fn snap_to_edge(position: i32, axis_max: i32, snap_distance: i32) -> i32 {
    if position.abs() < snap_distance {
        0
    } else if (position - axis_max).abs() < snap_distance {
        axis_max
    } else {
        position
    }
}

/// Align `candidate` against the facing edges of the first sibling it is
/// close enough to. Returns the new origin, or `None` when nothing snapped.
pub fn snap_to_sibling<I>(candidate: PanelRect, siblings: I, snap_distance: i32) -> Option<(i32, i32)>
where
    I: IntoIterator<Item = PanelRect>,
{
    let PanelRect { x, y, width, height } = candidate;

    for other in siblings {
        let mut new_x = x;
        let mut new_y = y;

        if candidate.overlaps_vertically(&other) {
            if (x + width - other.x).abs() < snap_distance {
                new_x = other.x - width;
            }
            if (x - other.right()).abs() < snap_distance {
                new_x = other.right();
            }
        }
        if candidate.overlaps_horizontally(&other) {
            if (y + height - other.y).abs() < snap_distance {
                new_y = other.y - height;
            }
            if (y - other.bottom()).abs() < snap_distance {
                new_y = other.bottom();
            }
        }

        if new_x != x || new_y != y {
            return Some((new_x, new_y));
        }
    }
    None
}

/// Snapping parameters for one drag gesture.
///
/// `enabled` is cleared while the precision modifier is held, which turns
/// both edge and sibling snapping into identity functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapper {
    pub distance: i32,
    pub enabled: bool,
}

impl Snapper {
    pub fn new(distance: i32, enabled: bool) -> Self {
        Self { distance, enabled }
    }

    pub fn edge(&self, position: i32, axis_max: i32) -> i32 {
        if self.enabled {
            snap_to_edge(position, axis_max, self.distance)
        } else {
            position
        }
    }

    pub fn sibling<I>(&self, candidate: PanelRect, siblings: I) -> Option<(i32, i32)>
    where
        I: IntoIterator<Item = PanelRect>,
    {
        if self.enabled {
            snap_to_sibling(candidate, siblings, self.distance)
        } else {
            None
        }
    }

    /// New origin for a panel being moved to `(x, y)` inside `area`.
    pub fn move_to<I>(&self, panel: PanelRect, x: i32, y: i32, area: (i32, i32), siblings: I) -> (i32, i32)
    where
        I: IntoIterator<Item = PanelRect>,
    {
        let x = self.edge(x, area.0 - panel.width);
        let y = self.edge(y, area.1 - panel.height);
        self.sibling(panel.with_origin(x, y), siblings).unwrap_or((x, y))
    }

    /// New size for a panel whose bottom-right corner is dragged to the
    /// panel-local point `(local_x, local_y)`.
    pub fn resize_to(&self, panel: PanelRect, local_x: i32, local_y: i32, area: (i32, i32), minimum: i32) -> (i32, i32) {
        let width = self.edge(local_x, area.0 - panel.x);
        let height = self.edge(local_y, area.1 - panel.y);
        (width.max(minimum), height.max(minimum))
    }
}

/// Whether a panel-local point lies in the bottom-right resize hot-zone.
pub fn is_in_resize_corner(width: i32, height: i32, local_x: i32, local_y: i32, snap_distance: i32) -> bool {
    (width - snap_distance..width).contains(&local_x) && (height - snap_distance..height).contains(&local_y)
}

pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let tmp = b;
        b = a % b;
        a = tmp;
    }
    a
}

/// Reduce `width:height` to lowest terms, e.g. 1920×1080 → 16:9.
pub fn aspect_ratio(width: u32, height: u32) -> (u32, u32) {
    match gcd(width, height) {
        0 => (0, 0),
        g => (width / g, height / g),
    }
}

/// Length of the complementary side when the side `size1` is set to
/// `standard`, preserving the reduced `size1:size2` ratio.
///
/// `scaled_size(1920, 1080, 1600) == 900`.
pub fn scaled_size(size1: u32, size2: u32, standard: u32) -> u32 {
    let (a, b) = aspect_ratio(size1, size2);
    if a == 0 {
        return 0;
    }
    (standard as u64 * b as u64 / a as u64) as u32
}

/// Fit an image into an area without upscaling.
///
/// Images that already fit keep their native size. Larger ones get a
/// width-constrained and a height-constrained candidate and the first one that
/// fits entirely wins. `None` when nothing fits.
pub fn fit_within(image: (u32, u32), area: (u32, u32)) -> Option<(u32, u32)> {
    let (image_w, image_h) = image;
    let (area_w, area_h) = area;
    if image_w == 0 || image_h == 0 {
        return None;
    }
    if image_w <= area_w && image_h <= area_h {
        return Some(image);
    }

    let fits = |(w, h): (u32, u32)| w <= area_w && h <= area_h;
    let by_width = (area_w, scaled_size(image_w, image_h, area_w));
    let by_height = (scaled_size(image_h, image_w, area_h), area_h);

    if fits(by_width) {
        Some(by_width)
    } else if fits(by_height) {
        Some(by_height)
    } else {
        None
    }
}

/// Final on-screen bitmap size: fitted size multiplied by the zoom ratio.
pub fn display_size(image: (u32, u32), area: (u32, u32), zoom: f64) -> Option<(u32, u32)> {
    let (w, h) = fit_within(image, area)?;
    let w = (w as f64 * zoom) as u32;
    let h = (h as f64 * zoom) as u32;
    (w > 0 && h > 0).then_some((w, h))
}

/// Side of the window or panel a layout shortcut anchors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Up,
    Down,
}

/// `1/divisor` of the whole content area along one axis, anchored to `edge`.
/// The other axis keeps the panel's current extent.
pub fn fraction_of_area(edge: Edge, panel: PanelRect, area: (i32, i32), divisor: i32) -> PanelRect {
    let (area_w, area_h) = area;
    let divisor = divisor.max(1);
    match edge {
        Edge::Left => PanelRect::new(0, panel.y, area_w / divisor, panel.height),
        Edge::Right => PanelRect::new(area_w - area_w / divisor, panel.y, area_w / divisor, panel.height),
        Edge::Up => PanelRect::new(panel.x, 0, panel.width, area_h / divisor),
        Edge::Down => PanelRect::new(panel.x, area_h - area_h / divisor, panel.width, area_h / divisor),
    }
}

/// `1/divisor` of the panel itself, anchored at its current position.
pub fn fraction_of_self(edge: Edge, panel: PanelRect, divisor: i32) -> PanelRect {
    let divisor = divisor.max(1);
    let PanelRect { x, y, width, height } = panel;
    match edge {
        Edge::Left => PanelRect::new(x, y, width / divisor, height),
        Edge::Right => PanelRect::new(x + width / divisor, y, width / divisor, height),
        Edge::Up => PanelRect::new(x, y, width, height / divisor),
        Edge::Down => PanelRect::new(x, y + height / divisor, width, height / divisor),
    }
}
