//! Command-line argument parsing
//!
//! Supports:
//! - Opening an image on startup
//! - Running with the `open` daemon enabled
//! - Talking to a running daemon (`dc open <path>`)

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Frameless multi-window image viewer
#[derive(Parser, Debug)]
#[command(name = "frameless-viewer", version, about = "Frameless multi-window image viewer")]
pub struct CliArgs {
    /// Start with daemon
    #[arg(short = 'd', long)]
    pub daemon: bool,

    /// Path of the image to be loaded from the beginning
    #[arg(short = 'p', long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Daemon client subcommands (daemon mode must be enabled)
    Dc {
        #[command(subcommand)]
        action: DcAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DcAction {
    /// Open a file in a new window of the running daemon
    Open {
        /// Path of the file
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

/// What `main` should do with the parsed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Viewer { init_path: Option<PathBuf>, daemon: bool },
    ClientOpen(PathBuf),
}

impl CliArgs {
    pub fn run_mode(self) -> RunMode {
        match self.command {
            Some(Command::Dc { action: DcAction::Open { path } }) => RunMode::ClientOpen(path),
            None => RunMode::Viewer {
                init_path: self.path,
                daemon: self.daemon,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunMode {
        CliArgs::try_parse_from(args).unwrap().run_mode()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&["frameless-viewer"]), RunMode::Viewer { init_path: None, daemon: false });
    }

    #[test]
    fn test_path_and_daemon() {
        assert_eq!(
            parse(&["frameless-viewer", "-d", "--path", "/pics/a.png"]),
            RunMode::Viewer { init_path: Some("/pics/a.png".into()), daemon: true }
        );
    }

    #[test]
    fn test_dc_open() {
        assert_eq!(parse(&["frameless-viewer", "dc", "open", "b.png"]), RunMode::ClientOpen("b.png".into()));
        assert!(CliArgs::try_parse_from(["frameless-viewer", "dc", "open"]).is_err());
    }
}
