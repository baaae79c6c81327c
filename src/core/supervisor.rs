//! Process supervisor - exclusive owner of the single supervised process
//!
//! At most one child exists at any time. `start()` always runs a full
//! `stop()` first, and `stop()` does not return until the previous child is
//! reaped and its streamer joined, so a new process can never overlap the
//! old one. Termination is two-phase: graceful signal, bounded wait,
//! forceful kill, bounded wait; only the last step failing is fatal.

use super::streamer::{stream_output, ProcessEvent};
use crate::config::Config;
use crate::error::SupervisorError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How the user's program is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Hosted service bound to the advertised port; stays alive
    Service,
    /// Direct execution; runs to completion
    Script,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Script => write!(f, "script"),
        }
    }
}

/// A concrete launch request: what to run, from where, in which mode
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub mode: LaunchMode,
    /// Entry file name, relative to the working directory
    pub entry_file: String,
    /// Working directory for the child (the workspace root)
    pub workdir: PathBuf,
}

impl LaunchSpec {
    pub fn service(workdir: &Path, entry_file: &str) -> Self {
        Self {
            mode: LaunchMode::Service,
            entry_file: entry_file.to_string(),
            workdir: workdir.to_path_buf(),
        }
    }

    pub fn script(workdir: &Path, entry_file: &str) -> Self {
        Self {
            mode: LaunchMode::Script,
            entry_file: entry_file.to_string(),
            workdir: workdir.to_path_buf(),
        }
    }

    /// Full command line for this launch
    pub fn argv(&self, config: &Config) -> Vec<String> {
        match self.mode {
            LaunchMode::Service => {
                let module = self.entry_file.trim_end_matches(".py");
                vec![
                    config.interpreter.clone(),
                    "-m".to_string(),
                    "uvicorn".to_string(),
                    "--host".to_string(),
                    "0.0.0.0".to_string(),
                    "--port".to_string(),
                    config.app_port.to_string(),
                    format!("{}:main", module),
                ]
            }
            LaunchMode::Script => vec![config.interpreter.clone(), self.entry_file.clone()],
        }
    }

    /// Environment layered on top of the inherited parent environment.
    /// Inheriting keeps platform-required variables (SYSTEMROOT and
    /// friends) intact on Windows.
    pub fn env(&self, config: &Config) -> Vec<(String, String)> {
        let mut env = vec![
            ("SANDCASTLE_ADDRESS".to_string(), config.server_address.clone()),
            ("SANDCASTLE_BASE_URL".to_string(), config.base_url.clone()),
            // Unbuffered output so the streamer sees it promptly
            ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ];
        if self.mode == LaunchMode::Service {
            env.push(("SANDCASTLE_APP_ADDRESS".to_string(), config.app_address()));
        }
        env
    }
}

struct RunningChild {
    child: Child,
    mode: LaunchMode,
    pid: Option<u32>,
    cancel: Option<oneshot::Sender<()>>,
    streamer: JoinHandle<()>,
}

/// Owns the single supervised process slot
pub struct Supervisor {
    config: Config,
    slot: Option<RunningChild>,
    event_tx: mpsc::UnboundedSender<ProcessEvent>,
    generation: u64,
}

impl Supervisor {
    /// Create a supervisor and the receiving end of its event stream
    pub fn new(config: Config) -> (Self, mpsc::UnboundedReceiver<ProcessEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                slot: None,
                event_tx: tx,
                generation: 0,
            },
            rx,
        )
    }

    /// Spawn a new supervised process. Any previous process is fully
    /// stopped first; the single-slot invariant lives here, not in callers.
    pub async fn start(&mut self, spec: &LaunchSpec) -> Result<(), SupervisorError> {
        self.stop().await?;

        let argv = spec.argv(&self.config);
        log::info!("launching {} process: {}", spec.mode, argv.join(" "));

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .envs(spec.env(&self.config))
            .current_dir(&spec.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SupervisorError::LaunchFailed {
            program: argv[0].clone(),
            source,
        })?;

        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");
        let pid = child.id();

        self.generation += 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let streamer = tokio::spawn(stream_output(
            self.generation,
            stdout,
            stderr,
            self.event_tx.clone(),
            cancel_rx,
            self.config.poll_interval(),
        ));

        self.slot = Some(RunningChild {
            child,
            mode: spec.mode,
            pid,
            cancel: Some(cancel_tx),
            streamer,
        });

        let _ = self.event_tx.send(ProcessEvent::Started {
            generation: self.generation,
        });
        log::info!("{} process started (pid {:?})", spec.mode, pid);
        Ok(())
    }

    /// Terminate the supervised process, if any. Idempotent; returns only
    /// after the child is reaped and the streamer task has exited.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        let Some(mut running) = self.slot.take() else {
            return Ok(());
        };
        // Invalidate queued events from this process; the slot is emptying
        self.generation += 1;

        // The streamer must be gone before the child is reaped so it can
        // never read from a dead handle.
        if let Some(cancel) = running.cancel.take() {
            let _ = cancel.send(());
        }
        let _ = running.streamer.await;

        if let Ok(Some(status)) = running.child.try_wait() {
            log::info!(
                "{} process already exited (status {:?})",
                running.mode,
                status.code()
            );
            return Ok(());
        }

        Self::signal_terminate(&mut running.child, running.pid);

        let grace = self.config.grace_period();
        match timeout(grace, running.child.wait()).await {
            Ok(Ok(status)) => {
                log::info!(
                    "{} process stopped (pid {:?}, status {:?})",
                    running.mode,
                    running.pid,
                    status.code()
                );
                Ok(())
            }
            Ok(Err(e)) => {
                log::warn!("wait on pid {:?} failed: {}", running.pid, e);
                Ok(())
            }
            Err(_) => {
                log::warn!(
                    "pid {:?} ignored termination within {:?}, killing",
                    running.pid,
                    grace
                );
                match timeout(grace, running.child.kill()).await {
                    Ok(Ok(())) => Ok(()),
                    _ => Err(SupervisorError::StopTimeout {
                        pid: running.pid.unwrap_or(0),
                    }),
                }
            }
        }
    }

    /// Reap a process whose output reached EOF. Returns its exit code.
    pub async fn reap(&mut self) -> Result<Option<i32>, SupervisorError> {
        let Some(mut running) = self.slot.take() else {
            return Ok(None);
        };
        self.generation += 1;
        if let Some(cancel) = running.cancel.take() {
            let _ = cancel.send(());
        }
        let _ = running.streamer.await;

        let grace = self.config.grace_period();
        match timeout(grace, running.child.wait()).await {
            Ok(Ok(status)) => {
                log::info!(
                    "{} process exited (pid {:?}, status {:?})",
                    running.mode,
                    running.pid,
                    status.code()
                );
                Ok(status.code())
            }
            Ok(Err(e)) => {
                log::warn!("wait on pid {:?} failed: {}", running.pid, e);
                Ok(None)
            }
            Err(_) => {
                // Output closed but the process lingers; treat like a stop
                log::warn!("pid {:?} closed output but kept running, killing", running.pid);
                match timeout(grace, running.child.kill()).await {
                    Ok(Ok(())) => Ok(None),
                    _ => Err(SupervisorError::StopTimeout {
                        pid: running.pid.unwrap_or(0),
                    }),
                }
            }
        }
    }

    /// Whether a supervised process currently occupies the slot
    pub fn is_running(&self) -> bool {
        self.slot.is_some()
    }

    /// Launch mode of the current process, if any
    pub fn current_mode(&self) -> Option<LaunchMode> {
        self.slot.as_ref().map(|r| r.mode)
    }

    /// Process id of the current process, if any
    pub fn pid(&self) -> Option<u32> {
        self.slot.as_ref().and_then(|r| r.pid)
    }

    /// Current slot generation. Bumped on every start, stop and reap;
    /// events carry the generation they were produced under, so anything
    /// queued by a process that no longer occupies the slot is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(unix)]
    fn signal_terminate(_child: &mut Child, pid: Option<u32>) {
        let Some(pid) = pid else { return };
        let ok = std::process::Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !ok {
            log::warn!("kill -TERM {} failed", pid);
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(child: &mut Child, pid: Option<u32>) {
        if let Err(e) = child.start_kill() {
            log::warn!("start_kill on pid {:?} failed: {}", pid, e);
        }
    }
}
