//! One top-level viewer window: its panels, layout operations, key dispatch
//! and the outbound side of its channel.
//!
//! This is toolkit-independent state. The egui shell in `ui` feeds it pointer
//! and key events in content coordinates and paints whatever it holds.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::channel::{ChannelHandle, ChannelMessage, WindowId};
use crate::config::{Action, Config, KeyChord};
use crate::controller::PeerDirectory;
use crate::decode_queue::DecodeQueue;
use crate::error::{Result, ViewerError};
use crate::geometry::{fraction_of_area, fraction_of_self, PanelRect, Snapper};
use crate::image_cache::ImageCache;
use crate::image_loader::PageDirection;
use crate::panel::{DragContext, Gesture, Panel, PanelId};

pub use crate::panel::PanelSnapshot;

/// Application name shown in window titles.
pub const APP_NAME: &str = "FramelessViewer";

/// Per-window state that survives cloning and reinitialization.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub decorated: bool,
    /// Frame position and client-area size on screen
    pub bounds: PanelRect,
    /// Image to open in an extra panel on startup
    pub init_path: Option<PathBuf>,
    pub panels: Vec<PanelSnapshot>,
    pub locked: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            decorated: true,
            bounds: PanelRect::new(0, 0, 600, 400),
            init_path: None,
            panels: Vec::new(),
            locked: true,
        }
    }
}

impl WindowConfig {
    pub fn with_init_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_path = Some(path.into());
        self
    }

    /// Same window shape, no content.
    pub fn without_panels(&self) -> Self {
        Self { panels: Vec::new(), init_path: None, ..self.clone() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bounds.width <= 0 || self.bounds.height <= 0 {
            return Err(ViewerError::InvalidConfig(format!(
                "window size {}x{} is not positive",
                self.bounds.width, self.bounds.height
            )));
        }
        if let Some(bad) = self.panels.iter().find(|p| p.bounds.width <= 0 || p.bounds.height <= 0) {
            return Err(ViewerError::InvalidConfig(format!("panel bounds {:?} are empty", bad.bounds)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructing,
    Live,
    Disposing,
}

/// Services shared by every window of the process.
#[derive(Clone)]
pub struct WindowEnv {
    pub config: Arc<Config>,
    pub cache: Arc<ImageCache>,
    pub peers: PeerDirectory,
}

/// Fires at most once per interval.
#[derive(Debug, Clone)]
pub struct InboundPoller {
    interval: Duration,
    last: Option<Instant>,
}

impl InboundPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

pub struct ViewerWindow {
    id: WindowId,
    config: WindowConfig,
    channel: ChannelHandle,
    env: WindowEnv,
    /// Insertion order; focus cycling follows it
    panels: Vec<Panel>,
    /// Paint order, back to front
    z_order: Vec<PanelId>,
    focused: PanelId,
    next_panel_id: u64,
    content_size: (i32, i32),
    lifecycle: Lifecycle,
    divisor: i32,
    /// Focused panel bounds from before the last lock
    pre_lock_bounds: Option<PanelRect>,
    /// Panel receiving the current pointer gesture
    active: Option<PanelId>,
    decoder: Option<DecodeQueue>,
    inbound: InboundPoller,
}

impl ViewerWindow {
    pub fn new(id: WindowId, config: WindowConfig, channel: ChannelHandle, env: WindowEnv) -> Result<Self> {
        config.validate()?;

        let inbound = InboundPoller::new(Duration::from_millis(env.config.settings.inbound_poll_ms));
        let content_size = (config.bounds.width, config.bounds.height);
        let mut window = Self {
            id,
            config,
            channel,
            env,
            panels: Vec::new(),
            z_order: Vec::new(),
            focused: PanelId(0),
            next_panel_id: 0,
            content_size,
            lifecycle: Lifecycle::Constructing,
            divisor: 2,
            pre_lock_bounds: None,
            active: None,
            decoder: None,
            inbound,
        };

        for snapshot in window.config.panels.clone() {
            let id = window.allocate_panel_id();
            window.insert_panel(Panel::from_snapshot(id, &snapshot));
        }
        if let Some(path) = window.config.init_path.clone() {
            let id = window.allocate_panel_id();
            let mut panel = Panel::new(id, PanelRect::sized(content_size.0, content_size.1));
            panel.set_image_path(Some(path));
            window.insert_panel(panel);
        }
        window.ensure_panel();
        if let Some(first) = window.panels.first().map(Panel::id) {
            window.focused = first;
        }

        window.publish_shape();
        debug!(window = %id, panels = window.panels.len(), "window constructed");
        Ok(window)
    }

    /// Decode on a background worker from now on.
    pub fn attach_decoder(&mut self, decoder: DecodeQueue) {
        self.decoder = Some(decoder);
    }

    /// Second construction phase, once the real content size is known.
    pub fn finish_layout(&mut self, content: (i32, i32)) {
        if self.lifecycle != Lifecycle::Constructing {
            return;
        }
        self.content_size = content;
        if self.config.locked {
            self.stretch_focused();
            self.raise(self.focused);
        }

        let ids: Vec<PanelId> = self.panels.iter().map(Panel::id).collect();
        for id in ids {
            self.load_panel(id);
        }
        self.lifecycle = Lifecycle::Live;
        info!(window = %self.id, locked = self.config.locked, "window live");
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_locked(&self) -> bool {
        self.config.locked
    }

    pub fn is_decorated(&self) -> bool {
        self.config.decorated
    }

    pub fn divisor(&self) -> i32 {
        self.divisor
    }

    pub fn content_size(&self) -> (i32, i32) {
        self.content_size
    }

    pub fn screen_bounds(&self) -> PanelRect {
        self.config.bounds
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    pub fn settings(&self) -> &crate::config::Settings {
        &self.env.config.settings
    }

    /// The chord bound to `action`, shown next to its menu entry.
    pub fn shortcut_for(&self, action: Action) -> Option<KeyChord> {
        self.env.config.keymap.chord_for(action)
    }

    pub fn cache(&self) -> &ImageCache {
        &self.env.cache
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Panels in paint order, back to front.
    pub fn panels_back_to_front(&self) -> impl Iterator<Item = &Panel> + '_ {
        self.z_order.iter().filter_map(|id| self.panel(*id))
    }

    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id() == id)
    }

    fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|p| p.id() == id)
    }

    pub fn focused(&self) -> PanelId {
        self.focused
    }

    pub fn focused_panel(&self) -> Option<&Panel> {
        self.panel(self.focused)
    }

    /// Focus borders are hidden while locked.
    pub fn shows_borders(&self) -> bool {
        !self.config.locked
    }

    /// Other live windows this one can send images to.
    pub fn peers(&self) -> Vec<WindowId> {
        self.env.peers.snapshot().into_iter().filter(|id| *id != self.id).collect()
    }

    pub fn title(&self) -> String {
        let name = self.focused_panel().map(Panel::file_name).unwrap_or_default();
        format!("{name} [1/{}] - {APP_NAME} {}", self.divisor, self.id)
    }

    fn allocate_panel_id(&mut self) -> PanelId {
        self.next_panel_id += 1;
        PanelId(self.next_panel_id)
    }

    fn insert_panel(&mut self, panel: Panel) {
        self.z_order.push(panel.id());
        self.panels.push(panel);
    }

    fn ensure_panel(&mut self) {
        if self.panels.is_empty() {
            let id = self.allocate_panel_id();
            let (w, h) = self.content_size;
            self.insert_panel(Panel::new(id, PanelRect::sized(w, h)));
        }
    }

    fn raise(&mut self, id: PanelId) {
        self.z_order.retain(|p| *p != id);
        self.z_order.push(id);
    }

    fn stretch_focused(&mut self) {
        let (w, h) = self.content_size;
        let focused = self.focused;
        let cache = Arc::clone(&self.env.cache);
        if let Some(panel) = self.panel_mut(focused) {
            panel.set_bounds(PanelRect::sized(w, h), &cache);
        }
    }

    fn load_panel(&mut self, id: PanelId) {
        let Some(panel) = self.panels.iter_mut().find(|p| p.id() == id) else {
            return;
        };
        match &self.decoder {
            Some(queue) if !queue.is_cancelled() => {
                if let Some(request) = panel.decode_request() {
                    queue.submit(request);
                }
            }
            _ => panel.update_image(&self.env.cache),
        }
    }

    /// Apply finished background decodes. Returns whether anything changed.
    pub fn drain_decoded(&mut self) -> bool {
        let Some(queue) = &self.decoder else {
            return false;
        };
        let mut changed = false;
        for result in queue.drain() {
            if let Some(panel) = self.panels.iter_mut().find(|p| p.id() == result.panel) {
                changed |= panel.apply_loaded(result, &self.env.cache);
            }
        }
        changed
    }

    /// Window was resized; `content` is the new drawable area.
    pub fn on_resized(&mut self, content: (i32, i32)) {
        if content == self.content_size {
            return;
        }
        self.content_size = content;
        if self.config.locked {
            self.stretch_focused();
        }
        let cache = Arc::clone(&self.env.cache);
        for panel in &mut self.panels {
            panel.update_image_size(&cache);
        }
    }

    /// Track the outer screen rectangle so clones and reinits reopen in place.
    pub fn on_moved(&mut self, bounds: PanelRect) {
        if bounds.width > 0 && bounds.height > 0 && bounds != self.config.bounds {
            self.config.bounds = bounds;
            self.publish_shape();
        }
    }

    /// Let the controller see the current bounds, decoration and lock state.
    fn publish_shape(&self) {
        self.channel.publish_shape(self.config.without_panels());
    }

    pub fn handle_chord(&mut self, chord: KeyChord) -> bool {
        match self.env.config.keymap.lookup(&chord) {
            Some(action) => self.perform(action),
            None => false,
        }
    }

    /// Run one action. Returns whether window state changed.
    pub fn perform(&mut self, action: Action) -> bool {
        if self.lifecycle != Lifecycle::Live {
            return false;
        }
        if self.config.locked && action.edits_layout() {
            debug!(window = %self.id, ?action, "ignored while locked");
            return false;
        }

        let cache = Arc::clone(&self.env.cache);
        let (area_w, area_h) = self.content_size;
        let focused = self.focused;

        match action {
            Action::PreviousImage | Action::NextImage => {
                let direction = if action == Action::NextImage { PageDirection::Next } else { PageDirection::Previous };
                let paged = self.panel_mut(focused).is_some_and(|p| p.page(direction));
                if paged {
                    self.load_panel(focused);
                }
                paged
            }
            Action::MaximizePanel => self.set_focused_bounds(PanelRect::sized(area_w, area_h)),
            Action::TogglePanelDivisor => {
                self.divisor = if self.divisor == 2 { 3 } else { 2 };
                true
            }
            Action::HalfOfWindow(edge) => {
                let divisor = self.divisor;
                let content = self.content_size;
                match self.focused_panel().map(Panel::bounds) {
                    Some(b) => self.set_focused_bounds(fraction_of_area(edge, b, content, divisor)),
                    None => false,
                }
            }
            Action::HalfOfSelf(edge) => {
                let divisor = self.divisor;
                match self.focused_panel().map(Panel::bounds) {
                    Some(b) => self.set_focused_bounds(fraction_of_self(edge, b, divisor)),
                    None => false,
                }
            }
            Action::FocusNextPanel => self.cycle_focus(1),
            Action::FocusPreviousPanel => self.cycle_focus(-1),
            Action::NewWindow => {
                self.request_new_window();
                true
            }
            Action::NewPanel => {
                self.create_new_panel(None);
                true
            }
            Action::CloneWindow => {
                self.clone_window();
                true
            }
            Action::ToggleLock => {
                self.toggle_lock();
                true
            }
            Action::ToggleTitleBar => {
                self.toggle_decorations();
                true
            }
            Action::FitToImage => match self.panel_mut(focused) {
                Some(panel) => {
                    panel.fit_to_image(&cache);
                    true
                }
                None => false,
            },
            Action::ResetZoom => match self.panel_mut(focused) {
                Some(panel) => {
                    panel.reset_zoom(&cache);
                    true
                }
                None => false,
            },
            Action::RemovePanel => {
                self.remove_focused_panel();
                true
            }
            Action::CloseWindow => {
                self.close();
                true
            }
        }
    }

    fn set_focused_bounds(&mut self, bounds: PanelRect) -> bool {
        let cache = Arc::clone(&self.env.cache);
        let focused = self.focused;
        match self.panel_mut(focused) {
            Some(panel) if panel.bounds() != bounds => {
                panel.set_bounds(bounds, &cache);
                true
            }
            _ => false,
        }
    }

    fn cycle_focus(&mut self, step: isize) -> bool {
        let len = self.panels.len() as isize;
        if len < 2 {
            return false;
        }
        let current = self.panels.iter().position(|p| p.id() == self.focused).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len) as usize;
        let id = self.panels[next].id();
        self.focus_to_panel(id)
    }

    /// Focus and raise `id`. Returns `false` for unknown panels.
    pub fn focus_to_panel(&mut self, id: PanelId) -> bool {
        if self.panel(id).is_none() {
            return false;
        }
        self.focused = id;
        self.raise(id);
        true
    }

    /// Add a panel covering the content area and start loading `path`.
    /// A locked window slides it under the focused panel, which stays on top.
    pub fn create_new_panel(&mut self, path: Option<PathBuf>) -> PanelId {
        let id = self.allocate_panel_id();
        let (w, h) = self.content_size;
        let mut panel = Panel::new(id, PanelRect::sized(w, h));
        let has_path = path.is_some();
        panel.set_image_path(path);
        self.insert_panel(panel);
        if self.config.locked {
            self.raise(self.focused);
        }
        if has_path {
            self.load_panel(id);
        }
        debug!(window = %self.id, panel = ?id, "panel created");
        id
    }

    /// Remove the focused panel, keeping at least one. Unlocks the window.
    pub fn remove_focused_panel(&mut self) {
        let focused = self.focused;
        self.panels.retain(|p| p.id() != focused);
        self.z_order.retain(|p| *p != focused);
        self.ensure_panel();

        self.config.locked = false;
        self.pre_lock_bounds = None;
        self.publish_shape();
        if let Some(first) = self.panels.first().map(Panel::id) {
            self.focus_to_panel(first);
        }
    }

    /// Locking stretches the focused panel over the window and hides borders;
    /// unlocking restores the bounds it had before.
    pub fn toggle_lock(&mut self) {
        let focused = self.focused;
        if self.config.locked {
            self.config.locked = false;
            if let Some(bounds) = self.pre_lock_bounds.take() {
                self.set_focused_bounds(bounds);
            }
        } else {
            self.pre_lock_bounds = self.panel(focused).map(Panel::bounds);
            self.config.locked = true;
            self.stretch_focused();
            self.raise(focused);
        }
        self.publish_shape();
        info!(window = %self.id, locked = self.config.locked, "lock toggled");
    }

    pub fn export_config(&self) -> WindowConfig {
        WindowConfig {
            decorated: self.config.decorated,
            bounds: self.config.bounds,
            init_path: None,
            panels: self.panels.iter().map(Panel::snapshot).collect(),
            locked: self.config.locked,
        }
    }

    pub fn request_new_window(&self) {
        self.channel.post(ChannelMessage::NewWindow);
    }

    pub fn clone_window(&self) {
        self.channel.post(ChannelMessage::NewWindowWithImage(self.export_config()));
    }

    /// Ask to be rebuilt with the title bar flipped. This window goes away.
    pub fn toggle_decorations(&mut self) {
        let mut config = self.export_config();
        config.decorated = !config.decorated;
        self.channel.post(ChannelMessage::Reinit(config));
        self.dispose();
    }

    /// Send the focused panel's image to another window.
    pub fn send_image_to(&self, target: WindowId) -> bool {
        match self.focused_panel().and_then(Panel::path) {
            Some(path) => {
                self.channel.post(ChannelMessage::SendImage { to: target, path: path.to_path_buf() });
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) {
        if self.lifecycle == Lifecycle::Disposing {
            return;
        }
        self.channel.post(ChannelMessage::Exit);
        self.dispose();
    }

    fn dispose(&mut self) {
        self.lifecycle = Lifecycle::Disposing;
        if let Some(mut queue) = self.decoder.take() {
            queue.cancel();
        }
        info!(window = %self.id, "window disposing");
    }

    /// Check for an image sent from another window, at most once per poll
    /// interval. Locked windows replace the focused image; unlocked ones add
    /// a panel.
    pub fn poll_inbound(&mut self, now: Instant) -> bool {
        if self.lifecycle != Lifecycle::Live || !self.inbound.due(now) {
            return false;
        }
        match self.channel.take_delivery() {
            Some(path) => {
                self.receive_image(path);
                true
            }
            None => false,
        }
    }

    pub fn inbound_interval(&self) -> Duration {
        self.inbound.interval()
    }

    fn receive_image(&mut self, path: PathBuf) {
        info!(window = %self.id, path = %path.display(), "image received");
        if self.config.locked {
            let focused = self.focused;
            if let Some(panel) = self.panel_mut(focused) {
                panel.set_image_path(Some(path));
                self.load_panel(focused);
            }
        } else {
            let id = self.create_new_panel(Some(path));
            self.focus_to_panel(id);
        }
    }

    /// Topmost panel under `(x, y)`.
    pub fn panel_at(&self, x: i32, y: i32) -> Option<PanelId> {
        self.z_order
            .iter()
            .rev()
            .copied()
            .find(|id| self.panel(*id).is_some_and(|p| p.bounds().contains(x, y)))
    }

    /// Focus the panel under `(x, y)` without starting a gesture. Locked
    /// windows keep their focus.
    pub fn focus_at(&mut self, x: i32, y: i32) -> bool {
        if self.config.locked {
            return false;
        }
        match self.panel_at(x, y) {
            Some(id) => self.focus_to_panel(id),
            None => false,
        }
    }

    /// Primary button pressed at `(x, y)`.
    pub fn pointer_pressed(&mut self, x: i32, y: i32) -> Gesture {
        if self.lifecycle != Lifecycle::Live {
            return Gesture::Idle;
        }
        let target = if self.config.locked { Some(self.focused) } else { self.panel_at(x, y) };
        let Some(id) = target else {
            return Gesture::Idle;
        };
        if !self.config.locked {
            self.focus_to_panel(id);
        }

        let locked = self.config.locked;
        let snap = self.env.config.settings.snap_distance;
        let gesture = self.panel_mut(id).map_or(Gesture::Idle, |p| p.begin_gesture(x, y, locked, snap));
        self.active = (gesture != Gesture::Idle).then_some(id);
        gesture
    }

    /// Pointer moved with the primary button held. `precision` disables snapping.
    pub fn pointer_dragged(&mut self, x: i32, y: i32, precision: bool) -> bool {
        let Some(id) = self.active else {
            return false;
        };
        let settings = &self.env.config.settings;
        let ctx = DragContext {
            area: self.content_size,
            siblings: self.panels.iter().filter(|p| p.id() != id).map(Panel::bounds).collect(),
            snapper: Snapper::new(settings.snap_distance, !precision),
            minimum_size: settings.minimum_panel_size,
        };
        self.panel_mut(id).is_some_and(|p| p.drag_to(x, y, &ctx))
    }

    pub fn pointer_released(&mut self) {
        let cache = Arc::clone(&self.env.cache);
        if let Some(id) = self.active.take() {
            if let Some(panel) = self.panel_mut(id) {
                panel.end_gesture(&cache);
            }
        }
    }

    /// Wheel zoom on the panel under the pointer. Positive steps zoom in.
    pub fn wheel(&mut self, x: i32, y: i32, steps: i32) -> bool {
        if steps == 0 || self.lifecycle != Lifecycle::Live {
            return false;
        }
        let Some(id) = self.panel_at(x, y) else {
            return false;
        };
        let settings = &self.env.config.settings;
        let factor = if steps > 0 { settings.zoom_in_factor } else { settings.zoom_out_factor };
        let factor = factor.powi(steps.abs());
        let cache = Arc::clone(&self.env.cache);
        self.panel_mut(id).map(|p| p.zoom_by(factor, &cache)).is_some()
    }

    /// Middle click resets zoom and pan of the panel under the pointer.
    pub fn middle_clicked(&mut self, x: i32, y: i32) -> bool {
        let cache = Arc::clone(&self.env.cache);
        match self.panel_at(x, y) {
            Some(id) => self.panel_mut(id).map(|p| p.reset_zoom(&cache)).is_some(),
            None => false,
        }
    }

    /// Files dropped at `(x, y)`; the panel there takes the first one.
    pub fn files_dropped(&mut self, x: i32, y: i32, paths: &[PathBuf]) -> bool {
        if self.lifecycle != Lifecycle::Live {
            return false;
        }
        let Some(id) = self.panel_at(x, y).or(Some(self.focused)) else {
            return false;
        };
        let accepted = self.panel_mut(id).is_some_and(|p| p.accept_drop(paths));
        if accepted {
            self.load_panel(id);
        } else {
            warn!(window = %self.id, "dropped file is not a supported image");
        }
        accepted
    }
}

impl Drop for ViewerWindow {
    fn drop(&mut self) {
        if let Some(mut queue) = self.decoder.take() {
            queue.cancel();
        }
    }
}
