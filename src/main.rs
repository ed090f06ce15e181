#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use clap::Parser;
use tracing::{error, info};

use frameless_viewer::cli::{CliArgs, RunMode};
use frameless_viewer::config::Config;
use frameless_viewer::daemon::{self, DaemonCommand};
use frameless_viewer::{app, logging};

#[cfg(feature = "mimalloc-allocator")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let log_path = logging::init(logging::default_log_dir().as_deref());

    match args.run_mode() {
        RunMode::ClientOpen(path) => {
            let command = DaemonCommand::Open(daemon::absolute_path(&path));
            if let Err(e) = daemon::send_command(&command) {
                error!(error = %e, "no daemon answered; start one with --daemon");
                return Err(e.into());
            }
            Ok(())
        }
        RunMode::Viewer { init_path, daemon } => {
            info!(version = env!("CARGO_PKG_VERSION"), log = ?log_path, "starting");
            let config = Config::load();
            app::run(config, init_path, daemon)?;
            info!("bye");
            Ok(())
        }
    }
}
