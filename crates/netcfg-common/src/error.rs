//! Error types for switch driver operations.
//!
//! Every failure a driver can report surfaces as a [`SwitchError`]. The
//! reconciliation layer never recovers from one locally: the first error
//! aborts the configuration pass.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for switch driver operations.
pub type SwitchResult<T> = Result<T, SwitchError>;

/// Errors that can occur while talking to a switch.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Failed to execute a shell command (spawn error).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// The switch accepted a command but its state does not reflect it.
    #[error("Switch {host}: {message}")]
    Verification {
        /// Switch management address.
        host: String,
        /// What was expected to change.
        message: String,
    },

    /// Output of a show command could not be interpreted.
    #[error("Unexpected output from '{command}': {message}")]
    UnexpectedOutput {
        /// The show command.
        command: String,
        /// What was missing from the output.
        message: String,
    },

    /// No driver is registered for the vendor class.
    #[error("No switch driver registered for class '{vendor}'")]
    UnknownVendor {
        /// Vendor class from the switch record.
        vendor: String,
    },

    /// Active mode needs a user ID to log in.
    #[error("Switch {host}: active mode requires a userid")]
    MissingCredentials {
        /// Switch management address.
        host: String,
    },

    /// Passive-mode command file could not be written.
    #[error("Failed to write switch command file {}: {source}", path.display())]
    CommandFile {
        /// Command file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl SwitchError {
    /// Creates a verification error.
    pub fn verification(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Verification {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates an unexpected output error.
    pub fn unexpected_output(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown vendor error.
    pub fn unknown_vendor(vendor: impl Into<String>) -> Self {
        Self::UnknownVendor {
            vendor: vendor.into(),
        }
    }

    /// Returns true if the error came from the transport rather than from
    /// the switch rejecting or ignoring a command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SwitchError::ShellExec { .. }
                | SwitchError::ShellCommandFailed { .. }
                | SwitchError::CommandFile { .. }
        )
    }
}
