//! Sandcastle CLI entry point - headless session runner
//!
//! Watches the entry file for changes and re-renders through the session;
//! new log output is printed as it streams, preview changes are logged.

use anyhow::Result;
use clap::Parser;
use sandcastle::{Config, PaneLayout, PreviewState, Session, SessionObserver, ViewMode};
use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Parser, Debug)]
#[command(name = "sandcastle", version, about = "Live-coding sandbox with a supervised preview process")]
struct Cli {
    /// Workspace directory (created and seeded if missing)
    #[arg(long, default_value = "project")]
    workspace: PathBuf,

    /// Configuration file (defaults to sandcastle.yml / ~/.sandcastle/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entry file name inside the workspace
    #[arg(long)]
    entry: Option<String>,

    /// Interpreter used to launch the program
    #[arg(long)]
    interpreter: Option<String>,

    /// Port the supervised service binds
    #[arg(long)]
    port: Option<u16>,

    /// Initial view mode: split, code, preview or console
    #[arg(long, default_value = "split")]
    view: String,

    /// Archive the workspace before tearing it down on exit
    #[arg(long)]
    export_on_exit: bool,
}

/// Observer printing new log output and preview transitions to the console
#[derive(Default)]
struct ConsoleObserver {
    printed: usize,
}

impl SessionObserver for ConsoleObserver {
    fn on_log_update(&mut self, text: &str) {
        // Snapshots are prefix-monotonic, so only the new suffix is printed
        if text.len() < self.printed {
            self.printed = 0;
        }
        let suffix = &text[self.printed..];
        if !suffix.is_empty() {
            print!("{}", suffix);
            let _ = std::io::stdout().flush();
            self.printed = text.len();
        }
    }

    fn on_preview_state_change(&mut self, state: &PreviewState) {
        log::info!("preview: {}", state);
    }

    fn on_view_mode_change(&mut self, layout: &PaneLayout) {
        log::debug!(
            "layout: code {}% / side {}% ({:?})",
            layout.code_pct,
            layout.side_pct,
            layout.side
        );
    }
}

fn entry_mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let view: ViewMode = cli.view.parse().map_err(anyhow::Error::msg)?;

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::auto_load()?,
    };
    config.workspace_root = cli.workspace.clone();
    if let Some(entry) = cli.entry {
        config.entry_file = entry;
    }
    if let Some(interpreter) = cli.interpreter {
        config.interpreter = interpreter;
    }
    if let Some(port) = cli.port {
        config.app_port = port;
    }

    log::info!("🏖 sandcastle v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "workspace {} (entry {})",
        config.workspace_root.display(),
        config.entry_file
    );

    let mut session = Session::new(config.clone(), Box::new(ConsoleObserver::default()))?;
    session.set_view_mode(view);
    session.bootstrap().await?;

    let entry_path = session.entry_path();
    let mut last_seen = entry_mtime(&entry_path);
    let mut tick = tokio::time::interval(config.poll_interval());

    loop {
        tokio::select! {
            _ = tick.tick() => {
                session.pump_events().await?;

                let current = entry_mtime(&entry_path);
                if current.is_some() && current != last_seen {
                    last_seen = current;
                    log::info!("entry file changed, re-rendering");
                    session.reload_entry().await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
        }
    }

    if cli.export_on_exit {
        let archive = session.export()?;
        log::info!("workspace exported to {}", archive.display());
    }
    session.shutdown().await?;
    Ok(())
}
