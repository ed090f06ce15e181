//! Shared helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use frameless_viewer::channel::WindowId;
use frameless_viewer::config::Config;
use frameless_viewer::controller::{PeerDirectory, SpawnRequest, WindowSpawner};
use frameless_viewer::image_cache::ImageCache;
use frameless_viewer::image_loader::ImageCrateCodec;
use frameless_viewer::window::{ViewerWindow, WindowConfig, WindowEnv};
use frameless_viewer::Result;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

pub const CONTENT: (i32, i32) = (600, 400);

/// Write a solid `width`x`height` PNG into `dir`.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]))
        .save(&path)
        .unwrap();
    path
}

/// Environment decoding real files on the calling thread.
pub fn test_env() -> WindowEnv {
    let mut config = Config::defaults();
    config.settings.decode_in_background = false;
    WindowEnv {
        config: Arc::new(config),
        cache: Arc::new(ImageCache::new(Box::new(ImageCrateCodec), 1 << 26, FilterType::Triangle)),
        peers: PeerDirectory::default(),
    }
}

/// A window past both construction phases.
pub fn live_window(config: WindowConfig, env: WindowEnv) -> ViewerWindow {
    let mut window =
        ViewerWindow::new(WindowId(1), config, frameless_viewer::channel::ChannelHandle::new(), env).unwrap();
    window.finish_layout(CONTENT);
    window
}

/// Spawner that builds real windows without a display.
pub struct HeadlessSpawner {
    pub env: WindowEnv,
    pub windows: Vec<ViewerWindow>,
    pub terminated: Vec<WindowId>,
}

impl HeadlessSpawner {
    pub fn new(env: WindowEnv) -> Self {
        Self { env, windows: Vec::new(), terminated: Vec::new() }
    }

    pub fn window(&mut self, id: WindowId) -> &mut ViewerWindow {
        self.windows.iter_mut().find(|w| w.id() == id).unwrap()
    }
}

impl WindowSpawner for HeadlessSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<()> {
        let mut window = ViewerWindow::new(request.id, request.config, request.channel, self.env.clone())?;
        window.finish_layout(CONTENT);
        self.windows.push(window);
        Ok(())
    }

    fn terminate(&mut self, id: WindowId) {
        self.windows.retain(|w| w.id() != id);
        self.terminated.push(id);
    }
}
