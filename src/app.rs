//! eframe host.
//!
//! The root viewport is kept hidden; every viewer window is a deferred
//! viewport owned by [`ViewerApp`]. The controller thread creates and
//! destroys windows through [`ViewportSpawner`], which only touches the
//! shared window table and asks the root to repaint so the table change is
//! picked up on the UI thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::channel::WindowId;
use crate::config::Config;
use crate::controller::{self, Controller, ControllerHandle, PeerDirectory, SpawnRequest, WindowSpawner};
use crate::daemon::{Daemon, DaemonCommand};
use crate::decode_queue::DecodeQueue;
use crate::error::Result;
use crate::image_cache::ImageCache;
use crate::image_loader::ImageCrateCodec;
use crate::ui::WindowView;
use crate::window::{ViewerWindow, WindowEnv, APP_NAME};

/// One window living in its own viewport.
#[derive(Clone)]
struct HostedWindow {
    id: WindowId,
    viewport: egui::ViewportId,
    builder: egui::ViewportBuilder,
    view: Arc<Mutex<WindowView>>,
}

type WindowTable = Arc<Mutex<Vec<HostedWindow>>>;

/// Builds viewer windows on behalf of the controller thread.
pub struct ViewportSpawner {
    ctx: egui::Context,
    env: WindowEnv,
    windows: WindowTable,
}

impl ViewportSpawner {
    fn viewport_builder(window: &ViewerWindow) -> egui::ViewportBuilder {
        let bounds = window.screen_bounds();
        egui::ViewportBuilder::default()
            .with_title(window.title())
            .with_decorations(window.is_decorated())
            .with_position([bounds.x as f32, bounds.y as f32])
            .with_inner_size([bounds.width as f32, bounds.height as f32])
            .with_min_inner_size([100.0, 80.0])
            .with_icon(Arc::new(build_app_icon()))
            .with_drag_and_drop(true)
    }
}

impl WindowSpawner for ViewportSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<()> {
        let viewport = egui::ViewportId::from_hash_of(("viewer-window", request.id.0));
        let mut window = ViewerWindow::new(request.id, request.config, request.channel, self.env.clone())?;

        if self.env.config.settings.decode_in_background {
            let ctx = self.ctx.clone();
            let queue = DecodeQueue::spawn(
                Arc::clone(&self.env.cache),
                Arc::new(move || ctx.request_repaint_of(viewport)),
            )?;
            window.attach_decoder(queue);
        }

        let builder = Self::viewport_builder(&window);
        self.windows.lock().push(HostedWindow {
            id: request.id,
            viewport,
            builder,
            view: Arc::new(Mutex::new(WindowView::new(window))),
        });
        debug!(window = %request.id, "viewport registered");
        self.ctx.request_repaint_of(egui::ViewportId::ROOT);
        Ok(())
    }

    fn terminate(&mut self, id: WindowId) {
        self.windows.lock().retain(|w| w.id != id);
        debug!(window = %id, "viewport removed");
        self.ctx.request_repaint_of(egui::ViewportId::ROOT);
    }

    fn shutdown(&mut self) {
        self.windows.lock().clear();
    }
}

/// Root application. Owns the controller thread and the optional daemon.
pub struct ViewerApp {
    windows: WindowTable,
    controller: Option<ControllerHandle>,
    daemon: Option<Daemon>,
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, init_path: Option<PathBuf>, daemon: bool) -> Result<Self> {
        let ctx = cc.egui_ctx.clone();
        let settings = config.settings.clone();

        let cache = Arc::new(ImageCache::new(
            Box::new(ImageCrateCodec),
            settings.cache_capacity_bytes(),
            settings.scale_filter.to_image_filter(),
        ));
        let peers = PeerDirectory::default();
        let env = WindowEnv { config: Arc::new(config), cache, peers: peers.clone() };

        let windows: WindowTable = Arc::new(Mutex::new(Vec::new()));
        let spawner = ViewportSpawner { ctx: ctx.clone(), env, windows: Arc::clone(&windows) };

        let (command_tx, command_rx) = crossbeam_channel::unbounded::<DaemonCommand>();
        let daemon = if daemon {
            match Daemon::start(command_tx) {
                Ok(daemon) => Some(daemon),
                Err(e) => {
                    warn!(error = %e, "daemon could not start, continuing without it");
                    None
                }
            }
        } else {
            drop(command_tx);
            None
        };

        let exit_ctx = ctx.clone();
        let controller = controller::run_loop(
            Controller::new(init_path, peers),
            spawner,
            Duration::from_millis(settings.controller_interval_ms),
            command_rx,
            move || {
                info!("last window closed");
                exit_ctx.send_viewport_cmd_to(egui::ViewportId::ROOT, egui::ViewportCommand::Close);
                exit_ctx.request_repaint_of(egui::ViewportId::ROOT);
            },
        )?;

        Ok(Self { windows, controller: Some(controller), daemon })
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let windows: Vec<HostedWindow> = self.windows.lock().clone();

        for hosted in windows {
            // A window that is busy drawing is alive by definition.
            let disposing = hosted.view.try_lock().map_or(false, |view| view.is_disposing());
            if disposing {
                continue;
            }
            let view = Arc::clone(&hosted.view);
            ctx.show_viewport_deferred(hosted.viewport, hosted.builder, move |ctx, _class| {
                view.lock().show(ctx);
            });
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(mut daemon) = self.daemon.take() {
            daemon.stop();
        }
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }
        self.windows.lock().clear();
    }
}

/// Launch the viewer and block until the last window closes.
pub fn run(config: Config, init_path: Option<PathBuf>, daemon: bool) -> std::result::Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_visible(false)
            .with_inner_size([1.0, 1.0])
            .with_taskbar(false),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| match ViewerApp::new(cc, config, init_path, daemon) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                error!(error = %e, "viewer startup failed");
                Err(Box::new(e))
            }
        }),
    )
}

/// Procedural icon: two overlapping panel outlines.
fn build_app_icon() -> egui::IconData {
    const SIZE: usize = 64;
    let mut rgba = vec![0u8; SIZE * SIZE * 4];

    let frames = [(6.0, 6.0, 40.0, 34.0), (22.0, 24.0, 58.0, 58.0)];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;
            let on_outline = frames.iter().any(|&(left, top, right, bottom)| {
                let inside_x = fx >= left && fx <= right;
                let inside_y = fy >= top && fy <= bottom;
                (inside_x && ((fy - top).abs() < 1.5 || (fy - bottom).abs() < 1.5))
                    || (inside_y && ((fx - left).abs() < 1.5 || (fx - right).abs() < 1.5))
            });
            if on_outline {
                let idx = (y * SIZE + x) * 4;
                rgba[idx..idx + 4].copy_from_slice(&[0, 255, 255, 240]);
            }
        }
    }

    egui::IconData { rgba, width: SIZE as u32, height: SIZE as u32 }
}
