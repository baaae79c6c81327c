//! Log streamer - publishes a supervised process's combined output
//!
//! One background task per process. Output from stdout and stderr is
//! appended to a single buffer in arrival order and every publish carries
//! the full accumulated text, so each snapshot an observer sees is a prefix
//! extension of the previous one. Cancellation is cooperative: a oneshot
//! fired (or dropped) by the supervisor is observed in the same `select!`
//! as the reads, and after it fires the task never touches the handles
//! again.

use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::{mpsc, oneshot};

/// Events published for a supervised process
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started { generation: u64 },
    /// Full accumulated output so far (full-replace semantics)
    Output { generation: u64, text: String },
    /// Both output streams reached end-of-file; the process has exited
    Eof { generation: u64 },
}

/// Stream a process's combined output until EOF or cancellation
pub(crate) async fn stream_output(
    generation: u64,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
    events: mpsc::UnboundedSender<ProcessEvent>,
    mut cancel: oneshot::Receiver<()>,
    retry_pause: Duration,
) {
    let mut buffer = String::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            _ = &mut cancel => {
                log::debug!("streamer {} cancelled", generation);
                return;
            }
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => {
                    buffer.push_str(&String::from_utf8_lossy(&out_buf[..n]));
                    let _ = events.send(ProcessEvent::Output {
                        generation,
                        text: buffer.clone(),
                    });
                }
                Err(e) => {
                    // Transient read errors are dropped; streaming continues
                    log::warn!("stdout read error (dropped): {}", e);
                    tokio::time::sleep(retry_pause).await;
                }
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => {
                    buffer.push_str(&String::from_utf8_lossy(&err_buf[..n]));
                    let _ = events.send(ProcessEvent::Output {
                        generation,
                        text: buffer.clone(),
                    });
                }
                Err(e) => {
                    log::warn!("stderr read error (dropped): {}", e);
                    tokio::time::sleep(retry_pause).await;
                }
            },
        }
    }

    let _ = events.send(ProcessEvent::Eof { generation });
}
