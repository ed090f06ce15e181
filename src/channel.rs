//! Single-slot mailbox between one window and the controller.
//!
//! The state is an immutable [`Channel`] snapshot behind a lock; every write
//! clones it, edits the copy and swaps it in. A window only posts outbound
//! messages and consumes inbound deliveries. The controller only reads
//! outbound messages, writes deliveries and acknowledges what it handled.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::window::WindowConfig;

/// Identity of a running window, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound intent of a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChannelMessage {
    #[default]
    Normal,
    Exit,
    NewWindow,
    /// Replace the sender with a fresh window built from this config.
    Reinit(WindowConfig),
    /// Spawn a copy; the sender keeps running.
    NewWindowWithImage(WindowConfig),
    SendImage { to: WindowId, path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub message: ChannelMessage,
    /// Bumped on every post so an acknowledgement can tell which message it saw.
    pub seq: u64,
    pub received: bool,
    pub received_path: Option<PathBuf>,
}

#[derive(Clone, Default)]
pub struct ChannelHandle {
    inner: Arc<RwLock<Arc<Channel>>>,
    /// Current shape of the window (bounds, decoration, lock), without panels.
    shape: Arc<RwLock<Option<WindowConfig>>>,
}

impl ChannelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<Channel> {
        self.inner.read().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Channel) -> R) -> R {
        let mut guard = self.inner.write();
        let mut next = Channel::clone(&guard);
        let out = f(&mut next);
        *guard = Arc::new(next);
        out
    }

    /// Publish an outbound message, replacing any unhandled one.
    pub fn post(&self, message: ChannelMessage) -> u64 {
        self.update(|ch| {
            ch.seq += 1;
            ch.message = message;
            ch.seq
        })
    }

    /// Reset the outbound slot to `Normal`, but only if it still holds the
    /// message posted as `seq`. A newer post survives.
    pub fn acknowledge(&self, seq: u64) -> bool {
        if self.inner.read().seq != seq {
            return false;
        }
        self.update(|ch| {
            if ch.seq == seq {
                ch.message = ChannelMessage::Normal;
                true
            } else {
                false
            }
        })
    }

    pub fn deliver(&self, path: PathBuf) {
        self.update(|ch| {
            ch.received = true;
            ch.received_path = Some(path);
        });
    }

    /// Take the pending inbound path, clearing the delivery.
    pub fn take_delivery(&self) -> Option<PathBuf> {
        if !self.inner.read().received {
            return None;
        }
        self.update(|ch| {
            ch.received = false;
            ch.received_path.take()
        })
    }

    /// Record the window's current shape. Written by the window whenever its
    /// bounds, decoration or lock state change.
    pub fn publish_shape(&self, config: WindowConfig) {
        *self.shape.write() = Some(config);
    }

    pub fn shape(&self) -> Option<WindowConfig> {
        self.shape.read().clone()
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelHandle").field(&self.load()).finish()
    }
}
