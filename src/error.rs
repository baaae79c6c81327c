//! Supervisor error taxonomy
//!
//! Launch failures are non-fatal and rendered as preview state; a process
//! surviving both the graceful signal and the forceful kill is the one
//! unrecoverable condition, since it breaks the single-process invariant.

use thiserror::Error;

/// Errors surfaced by the process supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The spawn call itself failed (interpreter or executable missing)
    #[error("failed to launch `{program}`: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child ignored both the termination signal and the kill
    #[error("process {pid} did not exit after termination and kill")]
    StopTimeout { pid: u32 },
}

impl SupervisorError {
    /// Whether this error must tear down the whole session
    pub fn is_fatal(&self) -> bool {
        matches!(self, SupervisorError::StopTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stop_timeout_is_fatal() {
        let launch = SupervisorError::LaunchFailed {
            program: "python3".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!launch.is_fatal());
        assert!(SupervisorError::StopTimeout { pid: 42 }.is_fatal());
    }
}
