//! Command delivery for switch drivers.
//!
//! Active switches are reached over `ssh`; passive switches get their
//! commands appended to a file for later review or replay.

use netcfg_common::shell::{self, shellquote, SSHPASS_CMD, SSHPASS_ENV, SSH_CMD};
use netcfg_common::{AccessInfo, DriverMode, SwitchError, SwitchResult};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// SSH login for one switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub userid: String,
    pub password: Option<String>,
}

impl SshTarget {
    /// Build the local command line that runs `remote_cmd` on the switch
    ///
    /// With a password the login goes through `sshpass -e`, which reads it
    /// from the environment.
    pub fn build_cmd(&self, remote_cmd: &str) -> String {
        let login = shellquote(&format!("{}@{}", self.userid, self.host));
        let ssh = format!(
            "{} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null {} {}",
            SSH_CMD,
            login,
            shellquote(remote_cmd)
        );
        match self.password {
            Some(_) => format!("{} -e {}", SSHPASS_CMD, ssh),
            None => ssh,
        }
    }
}

/// Where a driver's commands go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Ssh(SshTarget),
    CommandFile(PathBuf),
}

impl Transport {
    /// Choose the transport for a switch from its access info
    pub fn from_access_info(info: &AccessInfo) -> SwitchResult<Self> {
        match info.mode {
            DriverMode::Passive => Ok(Transport::CommandFile(info.outfile_or_default())),
            DriverMode::Active => {
                let userid = info
                    .userid
                    .clone()
                    .ok_or_else(|| SwitchError::MissingCredentials {
                        host: info.host.clone(),
                    })?;
                Ok(Transport::Ssh(SshTarget {
                    host: info.host.clone(),
                    userid,
                    password: info.password.clone(),
                }))
            }
        }
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, Transport::CommandFile(_))
    }

    /// Deliver one command, returning whatever the switch printed
    ///
    /// Passive delivery always returns an empty string.
    pub async fn send(&self, cmd: &str) -> SwitchResult<String> {
        match self {
            Transport::Ssh(target) => {
                let local = target.build_cmd(cmd);
                match &target.password {
                    Some(password) => {
                        shell::exec_or_throw(&local, &[(SSHPASS_ENV, password.as_str())]).await
                    }
                    None => shell::exec_or_throw(&local, &[]).await,
                }
            }
            Transport::CommandFile(path) => {
                append_line(path, cmd).await?;
                debug!(path = %path.display(), command = %cmd, "Recorded switch command");
                Ok(String::new())
            }
        }
    }
}

async fn append_line(path: &Path, line: &str) -> SwitchResult<()> {
    let to_err = |source| SwitchError::CommandFile {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(to_err)?;
    file.write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(to_err)?;
    file.flush().await.map_err(to_err)
}
