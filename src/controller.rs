//! Window registry and the tick loop that routes channel messages.
//!
//! Every tick the controller scans a snapshot of the registry, reads each
//! window's outbound message and reacts: spawning, terminating or forwarding
//! an image. Windows spawned during a scan are collected and merged once the
//! scan is over, so the registry is never mutated while being walked.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelHandle, ChannelMessage, WindowId};
use crate::daemon::DaemonCommand;
use crate::error::{Result, ViewerError};
use crate::window::WindowConfig;

/// Everything a spawner needs to bring up one window.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub id: WindowId,
    pub config: WindowConfig,
    pub channel: ChannelHandle,
}

/// Creates and destroys the real windows. The egui host implements it; tests
/// use a recording fake.
pub trait WindowSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<()>;
    fn terminate(&mut self, id: WindowId);
    /// Called once when the controller stops. Default: nothing.
    fn shutdown(&mut self) {}
}

/// Ids of the registered windows, published after every tick for the
/// "send image to" menu.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory(Arc<RwLock<Vec<WindowId>>>);

impl PeerDirectory {
    pub fn snapshot(&self) -> Vec<WindowId> {
        self.0.read().clone()
    }

    pub fn publish(&self, ids: Vec<WindowId>) {
        *self.0.write() = ids;
    }
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub id: WindowId,
    pub channel: ChannelHandle,
    /// The config the window was spawned with
    pub config: WindowConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Shutdown,
}

#[derive(Debug, Default)]
pub struct Controller {
    entries: Vec<RegistryEntry>,
    next_id: u64,
    first_tick_done: bool,
    init_path: Option<PathBuf>,
    peers: PeerDirectory,
}

impl Controller {
    pub fn new(init_path: Option<PathBuf>, peers: PeerDirectory) -> Self {
        Self { init_path, peers, ..Self::default() }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }

    fn spawn(&mut self, spawner: &mut dyn WindowSpawner, config: WindowConfig) -> Option<WindowId> {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        let channel = ChannelHandle::new();
        let request = SpawnRequest { id, config: config.clone(), channel: channel.clone() };

        match spawner.spawn(request) {
            Ok(()) => {
                self.entries.push(RegistryEntry { id, channel, config });
                Some(id)
            }
            Err(e) => {
                error!(window = %id, error = %e, "failed to create window");
                None
            }
        }
    }

    /// One pass over the registry.
    pub fn tick(&mut self, spawner: &mut dyn WindowSpawner) -> Tick {
        if !self.first_tick_done {
            self.first_tick_done = true;
            let config = match self.init_path.take() {
                Some(path) => WindowConfig::default().with_init_path(path),
                None => WindowConfig::default(),
            };
            if let Some(id) = self.spawn(spawner, config) {
                info!(window = %id, "first window");
            }
        }

        if self.entries.is_empty() {
            info!("no windows left");
            return Tick::Shutdown;
        }

        let mut pending: Vec<(WindowId, &'static str, WindowConfig)> = Vec::new();
        let mut removed: Vec<WindowId> = Vec::new();

        for entry in &self.entries {
            let snapshot = entry.channel.load();
            match &snapshot.message {
                ChannelMessage::Normal => {}
                ChannelMessage::Exit => {
                    removed.push(entry.id);
                    info!(window = %entry.id, "exited");
                }
                ChannelMessage::NewWindow => {
                    pending.push((entry.id, "new", WindowConfig::default()));
                    entry.channel.acknowledge(snapshot.seq);
                }
                ChannelMessage::Reinit(config) => {
                    pending.push((entry.id, "reinit", config.clone()));
                    removed.push(entry.id);
                }
                ChannelMessage::NewWindowWithImage(config) => {
                    pending.push((entry.id, "clone", config.clone()));
                    entry.channel.acknowledge(snapshot.seq);
                }
                ChannelMessage::SendImage { to, path } => {
                    match self.entries.iter().find(|e| e.id == *to) {
                        Some(target) => {
                            target.channel.deliver(path.clone());
                            info!(from = %entry.id, to = %to, path = %path.display(), "image sent");
                        }
                        None => warn!(from = %entry.id, error = %ViewerError::UnknownWindow(*to), "send image dropped"),
                    }
                    entry.channel.acknowledge(snapshot.seq);
                }
            }
        }

        for id in &removed {
            spawner.terminate(*id);
        }
        self.entries.retain(|e| !removed.contains(&e.id));

        for (source, kind, config) in pending {
            if let Some(id) = self.spawn(spawner, config) {
                info!(from = %source, to = %id, kind, "window spawned");
            }
        }

        self.peers.publish(self.window_ids());
        Tick::Continue
    }

    /// `open <path>` from the daemon: a new window shaped like the most
    /// recently created one as it is now (bounds, decoration, lock), without
    /// its panels, showing `path`.
    pub fn open_from_daemon(&mut self, spawner: &mut dyn WindowSpawner, path: PathBuf) -> Result<WindowId> {
        let template = match self.entries.last() {
            Some(entry) => entry.channel.shape().unwrap_or_else(|| entry.config.without_panels()),
            None => WindowConfig::default(),
        };
        let id = self
            .spawn(spawner, template.with_init_path(path))
            .ok_or_else(|| ViewerError::WindowConstruction("daemon open".into()))?;
        info!(window = %id, "window opened by daemon");
        self.peers.publish(self.window_ids());
        Ok(id)
    }

    /// Terminate every registered window.
    pub fn shutdown(&mut self, spawner: &mut dyn WindowSpawner) {
        for entry in self.entries.drain(..) {
            spawner.terminate(entry.id);
        }
        self.peers.publish(Vec::new());
        spawner.shutdown();
    }
}

/// Owns the controller thread. Dropping it stops the loop and waits for it.
pub struct ControllerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Step {
    Continue,
    CommandsClosed,
    Exit,
    Stop,
}

/// Run `controller` on its own thread, ticking every `interval` and serving
/// daemon commands in between. `on_exit` runs on the controller thread once
/// the registry empties.
pub fn run_loop<S>(
    mut controller: Controller,
    mut spawner: S,
    interval: Duration,
    commands: Receiver<DaemonCommand>,
    on_exit: impl FnOnce() + Send + 'static,
) -> Result<ControllerHandle>
where
    S: WindowSpawner + Send + 'static,
{
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

    let thread = std::thread::Builder::new()
        .name("window-controller".into())
        .spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            let mut commands = commands;

            if controller.tick(&mut spawner) == Tick::Shutdown {
                controller.shutdown(&mut spawner);
                on_exit();
                return;
            }

            loop {
                let step = select! {
                    recv(ticker) -> _ => {
                        if controller.tick(&mut spawner) == Tick::Shutdown {
                            controller.shutdown(&mut spawner);
                            Step::Exit
                        } else {
                            Step::Continue
                        }
                    }
                    recv(commands) -> command => match command {
                        Ok(DaemonCommand::Open(path)) => {
                            if let Err(e) = controller.open_from_daemon(&mut spawner, path) {
                                error!(error = %e, "daemon open failed");
                            }
                            Step::Continue
                        }
                        Err(_) => Step::CommandsClosed,
                    },
                    recv(stop_rx) -> _ => {
                        info!("controller stopping");
                        controller.shutdown(&mut spawner);
                        Step::Stop
                    }
                };

                match step {
                    Step::Continue => {}
                    Step::CommandsClosed => {
                        debug!("daemon command channel closed");
                        commands = crossbeam_channel::never();
                    }
                    Step::Exit => {
                        on_exit();
                        break;
                    }
                    Step::Stop => break,
                }
            }
        })
        .map_err(|e| ViewerError::WindowConstruction(format!("controller thread: {e}")))?;

    Ok(ControllerHandle { stop_tx: Some(stop_tx), thread: Some(thread) })
}
