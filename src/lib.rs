//! Frameless multi-window image viewer.
//!
//! Windows hold freely placed, snapping image panels. A controller thread
//! owns the window registry and reacts to messages each window posts on its
//! channel; an optional local-socket daemon lets other invocations open
//! files in new windows.

pub mod app;
pub mod channel;
pub mod cli;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod decode_queue;
pub mod error;
pub mod geometry;
pub mod image_cache;
pub mod image_loader;
pub mod logging;
pub mod panel;
pub mod ui;
pub mod window;

pub use error::{Result, ViewerError};
