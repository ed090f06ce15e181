//! egui rendering and input for one viewer window.
//!
//! Runs inside the window's deferred viewport callback. Translates egui
//! input into [`ViewerWindow`] calls and paints its panels, uploading each
//! panel's scaled bitmap as a texture when it changes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use crate::config::{Action, KeyChord};
use crate::geometry::PanelRect;
use crate::image_cache::ScaledImage;
use crate::panel::{Panel, PanelId};
use crate::window::{Lifecycle, ViewerWindow};

struct PanelTexture {
    source: Arc<ScaledImage>,
    handle: egui::TextureHandle,
}

/// A window plus its GPU-side state.
pub struct WindowView {
    window: ViewerWindow,
    textures: HashMap<PanelId, PanelTexture>,
    title: String,
}

fn rgb(c: [u8; 3]) -> egui::Color32 {
    egui::Color32::from_rgb(c[0], c[1], c[2])
}

fn to_egui(r: PanelRect) -> egui::Rect {
    egui::Rect::from_min_size(
        egui::pos2(r.x as f32, r.y as f32),
        egui::vec2(r.width as f32, r.height as f32),
    )
}

fn to_point(pos: egui::Pos2) -> (i32, i32) {
    (pos.x.round() as i32, pos.y.round() as i32)
}

impl WindowView {
    pub fn new(window: ViewerWindow) -> Self {
        Self { window, textures: HashMap::new(), title: String::new() }
    }

    pub fn is_disposing(&self) -> bool {
        self.window.lifecycle() == Lifecycle::Disposing
    }

    /// One frame of this window.
    pub fn show(&mut self, ctx: &egui::Context) {
        if self.is_disposing() {
            return;
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.window.close();
            ctx.request_repaint_of(egui::ViewportId::ROOT);
            return;
        }

        let screen = ctx.screen_rect().size();
        let content = (screen.x as i32, screen.y as i32);
        if self.window.lifecycle() == Lifecycle::Constructing {
            self.window.finish_layout(content);
        } else {
            self.window.on_resized(content);
        }
        // Position of the frame, size of the client area: what a new
        // viewport is built from.
        let placement = ctx.input(|i| (i.viewport().outer_rect, i.viewport().inner_rect));
        if let (Some(outer), Some(inner)) = placement {
            self.window.on_moved(PanelRect::new(
                outer.min.x as i32,
                outer.min.y as i32,
                inner.width() as i32,
                inner.height() as i32,
            ));
        }

        self.window.drain_decoded();
        self.window.poll_inbound(Instant::now());
        self.handle_keys(ctx);
        self.handle_drops(ctx);

        let background = rgb(self.window.settings().background_rgb);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(background))
            .show(ctx, |ui| {
                self.sync_textures(ui.ctx());
                self.paint(ui);
                self.handle_pointer(ui);
            });

        if self.is_disposing() {
            ctx.request_repaint_of(egui::ViewportId::ROOT);
            return;
        }

        let title = self.window.title();
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }

        let busy = self.window.panels().iter().any(Panel::is_loading);
        if !busy {
            ctx.request_repaint_after(self.window.inbound_interval());
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let chords: Vec<KeyChord> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key { key, pressed: true, modifiers, .. } => Some(KeyChord::from_egui(*key, modifiers)),
                    _ => None,
                })
                .collect()
        });
        for chord in chords {
            self.window.handle_chord(chord);
        }
    }

    fn handle_drops(&mut self, ctx: &egui::Context) {
        let (paths, pos) = ctx.input(|i| {
            let paths: Vec<PathBuf> = i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect();
            (paths, i.pointer.hover_pos())
        });
        if paths.is_empty() {
            return;
        }
        let (x, y) = pos.map(to_point).unwrap_or((0, 0));
        self.window.files_dropped(x, y, &paths);
    }

    /// Upload new bitmaps and forget textures of panels that lost theirs.
    fn sync_textures(&mut self, ctx: &egui::Context) {
        let options = self.window.settings().texture_filter.to_egui_options();
        let mut live = Vec::with_capacity(self.window.panels().len());

        for panel in self.window.panels() {
            let Some(display) = panel.display() else {
                continue;
            };
            live.push(panel.id());
            let fresh = self
                .textures
                .get(&panel.id())
                .map_or(true, |t| !Arc::ptr_eq(&t.source, display));
            if fresh {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [display.width as usize, display.height as usize],
                    display.pixels.as_raw(),
                );
                let handle = ctx.load_texture(format!("panel-{}", panel.id().0), image, options);
                self.textures.insert(panel.id(), PanelTexture { source: Arc::clone(display), handle });
            }
        }

        self.textures.retain(|id, _| live.contains(id));
    }

    fn paint(&self, ui: &egui::Ui) {
        let settings = self.window.settings();
        let panel_fill = rgb(settings.panel_rgb);
        let border = egui::Stroke::new(1.0, rgb(settings.border_rgb));
        let focused_border = egui::Stroke::new(1.0, rgb(settings.focused_border_rgb));

        for panel in self.window.panels_back_to_front() {
            let rect = to_egui(panel.bounds());
            let painter = ui.painter().with_clip_rect(rect);
            painter.rect_filled(rect, 0.0, panel_fill);

            match (self.textures.get(&panel.id()), panel.image_rect()) {
                (Some(texture), Some(image_rect)) => {
                    painter.image(
                        texture.handle.id(),
                        to_egui(image_rect),
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
                _ => {
                    let hint = if panel.is_loading() {
                        "Loading..."
                    } else if panel.path().is_some() {
                        "Cannot display this file"
                    } else {
                        "Drop an image here"
                    };
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        hint,
                        egui::FontId::proportional(14.0),
                        egui::Color32::from_gray(220),
                    );
                }
            }

            if self.window.shows_borders() {
                let stroke = if panel.id() == self.window.focused() { focused_border } else { border };
                painter.rect_stroke(rect.shrink(0.5), 0.0, stroke);
            }
        }
    }

    fn handle_pointer(&mut self, ui: &mut egui::Ui) {
        let response = ui.interact(ui.max_rect(), ui.id().with("panels"), egui::Sense::click_and_drag());
        let (press_origin, pointer, shift, scroll) = ui.ctx().input(|i| {
            (i.pointer.press_origin(), i.pointer.interact_pos(), i.modifiers.shift, i.raw_scroll_delta.y)
        });

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(origin) = press_origin {
                let (x, y) = to_point(origin);
                self.window.pointer_pressed(x, y);
            }
        }
        if response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = pointer {
                let (x, y) = to_point(pos);
                self.window.pointer_dragged(x, y, shift);
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.window.pointer_released();
        }

        if response.clicked() || response.secondary_clicked() {
            if let Some(pos) = pointer {
                let (x, y) = to_point(pos);
                self.window.focus_at(x, y);
            }
        }
        if response.middle_clicked() {
            if let Some(pos) = pointer {
                let (x, y) = to_point(pos);
                self.window.middle_clicked(x, y);
            }
        }

        if response.hovered() && scroll != 0.0 {
            if let Some(pos) = response.hover_pos() {
                let (x, y) = to_point(pos);
                self.window.wheel(x, y, if scroll > 0.0 { 1 } else { -1 });
            }
        }

        let window = &mut self.window;
        response.context_menu(|ui| context_menu(window, ui));
    }
}

fn menu_item(ui: &mut egui::Ui, window: &mut ViewerWindow, label: &str, action: Action) {
    let mut button = egui::Button::new(label);
    if let Some(chord) = window.shortcut_for(action) {
        button = button.shortcut_text(chord.to_string());
    }
    if ui.add(button).clicked() {
        window.perform(action);
        ui.close_menu();
    }
}

fn context_menu(window: &mut ViewerWindow, ui: &mut egui::Ui) {
    menu_item(ui, window, "New", Action::NewWindow);
    menu_item(ui, window, "New Panel", Action::NewPanel);
    ui.separator();
    menu_item(ui, window, "Clone", Action::CloneWindow);
    ui.separator();
    let lock_label = if window.is_locked() { "Unlock From Window" } else { "Lock To Window" };
    menu_item(ui, window, lock_label, Action::ToggleLock);
    menu_item(ui, window, "Toggle Title", Action::ToggleTitleBar);
    menu_item(ui, window, "Fit To Image", Action::FitToImage);
    menu_item(ui, window, "Reset Zoom", Action::ResetZoom);

    ui.menu_button("Send Image To", |ui| {
        let peers = window.peers();
        if peers.is_empty() {
            ui.label("No other windows");
        }
        for peer in peers {
            if ui.button(peer.to_string()).clicked() {
                window.send_image_to(peer);
                ui.close_menu();
            }
        }
    });

    ui.separator();
    menu_item(ui, window, "Remove Panel", Action::RemovePanel);
    menu_item(ui, window, "Exit", Action::CloseWindow);
}
