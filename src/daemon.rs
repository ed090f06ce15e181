//! Local-socket daemon accepting `open <path>` commands from other
//! invocations of the binary (`frameless-viewer dc open <path>`).
//!
//! The listener runs on its own thread in non-blocking accept mode and polls
//! a shutdown flag between accepts. Parsed commands are forwarded to the
//! controller over a crossbeam channel.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use interprocess::local_socket::{
    prelude::*, GenericFilePath, GenericNamespaced, ListenerNonblockingMode, ListenerOptions, Name, NameType, Stream,
    ToFsName, ToNsName,
};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default socket name shared by the daemon and its clients.
pub const SOCKET_NAME: &str = "frameless-viewer.sock";

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Open(PathBuf),
}

impl DaemonCommand {
    /// Parse one protocol line. Unknown verbs and empty arguments yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        match verb {
            "open" if !rest.trim().is_empty() => Some(Self::Open(PathBuf::from(rest.trim()))),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Self::Open(path) => format!("open {}\n", path.display()),
        }
    }
}

/// Namespaced where the platform has it, otherwise a socket file in the temp dir.
fn socket_name(name: &str) -> std::io::Result<(Name<'static>, Option<PathBuf>)> {
    if GenericNamespaced::is_supported() {
        Ok((name.to_owned().to_ns_name::<GenericNamespaced>()?, None))
    } else {
        let path = std::env::temp_dir().join(name);
        Ok((path.clone().to_fs_name::<GenericFilePath>()?, Some(path)))
    }
}

/// Running listener. Dropping it stops the thread and frees the name.
pub struct Daemon {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    socket_path: Option<PathBuf>,
}

impl Daemon {
    pub fn start(commands: Sender<DaemonCommand>) -> Result<Self> {
        Self::start_named(SOCKET_NAME, commands)
    }

    pub fn start_named(name: &str, commands: Sender<DaemonCommand>) -> Result<Self> {
        let (socket, socket_path) = socket_name(name)?;

        let listener = match ListenerOptions::new().name(socket.clone()).create_sync() {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && socket_path.is_some() => {
                // A socket file left behind by a crashed daemon. Reclaim it
                // unless something still answers on it.
                if Stream::connect(socket.clone()).is_ok() {
                    return Err(e.into());
                }
                if let Some(path) = &socket_path {
                    let _ = std::fs::remove_file(path);
                }
                ListenerOptions::new().name(socket).create_sync()?
            }
            Err(e) => return Err(e.into()),
        };
        listener.set_nonblocking(ListenerNonblockingMode::Accept)?;
        info!(name, "daemon listening");

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("daemon-listener".into())
            .spawn(move || {
                while !shutdown_clone.load(Ordering::Acquire) {
                    match listener.accept() {
                        Ok(stream) => serve(stream, &commands),
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                        Err(e) => {
                            warn!(error = %e, "daemon accept failed");
                            thread::sleep(ERROR_BACKOFF);
                        }
                    }
                }
                debug!("daemon listener stopped");
            })?;

        Ok(Self { shutdown, thread: Some(thread), socket_path })
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Some(path) = self.socket_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(stream: Stream, commands: &Sender<DaemonCommand>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "daemon read failed");
                break;
            }
        };
        match DaemonCommand::parse(&line) {
            Some(command) => {
                info!(?command, "daemon command");
                if commands.send(command).is_err() {
                    return;
                }
            }
            None => warn!(line = %line, "unknown daemon command"),
        }
    }
}

/// Client side: deliver one command to a running daemon.
pub fn send_command(command: &DaemonCommand) -> Result<()> {
    send_command_to(SOCKET_NAME, command)
}

pub fn send_command_to(name: &str, command: &DaemonCommand) -> Result<()> {
    let (socket, _) = socket_name(name)?;
    let mut stream = Stream::connect(socket)?;
    stream.write_all(command.to_line().as_bytes())?;
    stream.flush()?;
    debug!(?command, "sent daemon command");
    Ok(())
}

/// Absolute form of a user-supplied path, so the daemon resolves it the same
/// way regardless of its own working directory.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open() {
        assert_eq!(
            DaemonCommand::parse("open /pics/a b.png\n"),
            Some(DaemonCommand::Open("/pics/a b.png".into()))
        );
        assert_eq!(DaemonCommand::parse("open"), None);
        assert_eq!(DaemonCommand::parse("open   "), None);
        assert_eq!(DaemonCommand::parse("close /pics/a.png"), None);
        assert_eq!(DaemonCommand::parse(""), None);
    }

    #[test]
    fn test_line_format() {
        let command = DaemonCommand::Open("/pics/a.png".into());
        assert_eq!(command.to_line(), "open /pics/a.png\n");
        assert_eq!(DaemonCommand::parse(&command.to_line()), Some(command));
    }

    #[test]
    fn test_absolute_path_falls_back_for_missing_files() {
        assert_eq!(absolute_path(Path::new("no/such/file.png")), PathBuf::from("no/such/file.png"));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.png");
        std::fs::write(&file, b"x").unwrap();
        assert!(absolute_path(&file).is_absolute());
    }

    #[test]
    fn test_client_reaches_daemon() {
        let name = format!("frameless-viewer-test-{}.sock", std::process::id());
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut daemon = Daemon::start_named(&name, tx).unwrap();

        send_command_to(&name, &DaemonCommand::Open("/pics/a.png".into())).unwrap();
        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, DaemonCommand::Open("/pics/a.png".into()));

        daemon.stop();
        assert!(send_command_to(&name, &DaemonCommand::Open("/pics/b.png".into())).is_err());
    }
}
