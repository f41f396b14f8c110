//! Remote command execution and file transfer through the system OpenSSH
//! client (`ssh` / `scp`), always in batch mode: key or agent auth only,
//! never an interactive prompt.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Uploads at or below this size are always copied without a digest check.
pub const DIGEST_MIN_SIZE: u64 = 1000;

// ── Error type ─────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{action} on {host} failed ({status}): {stderr}")]
    Failed {
        host: String,
        action: String,
        status: String,
        stderr: String,
    },
    #[error("{action} on {host} timed out after {timeout:?}")]
    Timeout {
        host: String,
        action: String,
        timeout: Duration,
    },
}

// ── RemoteClient ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteClient {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Upper bound for a whole command or transfer. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl RemoteClient {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            identity_file: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: None,
        }
    }

    /// Parse `[user@]host[:port]`. IPv6 hosts with a port are written
    /// `[addr]:port`. The user defaults to the current user; an unparsable
    /// port keeps the default.
    pub fn parse(target: &str) -> Self {
        let (user, rest) = match target.split_once('@') {
            Some((user, rest)) => (user.to_owned(), rest),
            None => (crate::user::current_user(), target),
        };
        let (host, port) = split_host_port(rest);
        let port = port
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SSH_PORT);
        Self::new(user, host).with_port(port)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `command`, discarding its output. Fails on a non-zero exit.
    pub async fn run(&self, command: &str) -> Result<(), RemoteError> {
        self.output(command).await.map(drop)
    }

    /// Run `command` with stdout/stderr bound to this process.
    pub async fn run_inherit(&self, command: &str) -> Result<(), RemoteError> {
        self.exec("ssh", self.ssh_args(command), format!("`{command}`"), true)
            .await
            .map(drop)
    }

    /// Run `command` and return its stdout.
    pub async fn output(&self, command: &str) -> Result<Vec<u8>, RemoteError> {
        self.exec("ssh", self.ssh_args(command), format!("`{command}`"), false)
            .await
    }

    /// Copy `local` to `remote`, creating the remote directory first. A
    /// trailing `/` on `remote` names a directory to copy into.
    ///
    /// Files above [`DIGEST_MIN_SIZE`] are skipped when the remote copy
    /// already has the same digest.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let (remote_file, remote_dir) = upload_target(local, remote);
        let size = tokio::fs::metadata(local)
            .await
            .map_err(|source| RemoteError::Local {
                path: local.to_owned(),
                source,
            })?
            .len();

        if size > DIGEST_MIN_SIZE && self.is_up_to_date(local, &remote_file).await {
            tracing::debug!(
                host = %self.host,
                remote = %remote_file,
                "remote copy up to date, skipping upload"
            );
            return Ok(());
        }

        self.run(&mkdir_command(&remote_dir)).await?;
        let action = format!("upload {} -> {remote_file}", local.display());
        let args = self.scp_args(local.as_os_str().to_owned(), self.remote_path(&remote_file));
        self.exec("scp", args, action, false).await.map(drop)
    }

    pub async fn download(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        let action = format!("download {remote} -> {}", local.display());
        let args = self.scp_args(self.remote_path(remote), local.as_os_str().to_owned());
        self.exec("scp", args, action, false).await.map(drop)
    }

    /// Whether `remote_file` exists with the same digest as `local`. Any
    /// failure (missing file, no `b3sum` on the host) counts as stale.
    async fn is_up_to_date(&self, local: &Path, remote_file: &str) -> bool {
        let Ok(output) = self.output(&digest_command(remote_file)).await else {
            return false;
        };
        let output = String::from_utf8_lossy(&output);
        let Some(remote_sum) = output.split_whitespace().next() else {
            return false;
        };
        let local = local.to_owned();
        match tokio::task::spawn_blocking(move || crate::fs::file_digest(local)).await {
            Ok(Ok(local_sum)) => local_sum == remote_sum,
            _ => false,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `user@host:path`, bracketing IPv6 literals for scp.
    fn remote_path(&self, path: &str) -> OsString {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}@{host}:{path}", self.user).into()
    }

    fn common_args(&self, port_flag: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)).into(),
            port_flag.into(),
            self.port.to_string().into(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".into());
            args.push(identity.as_os_str().to_owned());
        }
        args
    }

    fn ssh_args(&self, command: &str) -> Vec<OsString> {
        let mut args = self.common_args("-p");
        args.push(self.destination().into());
        args.push(command.into());
        args
    }

    fn scp_args(&self, from: OsString, to: OsString) -> Vec<OsString> {
        let mut args = self.common_args("-P");
        args.push(from);
        args.push(to);
        args
    }

    async fn exec(
        &self,
        program: &'static str,
        args: Vec<OsString>,
        action: String,
        inherit: bool,
    ) -> Result<Vec<u8>, RemoteError> {
        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if inherit {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        tracing::debug!(host = %self.host, port = self.port, %action, "remote exec");
        let output = cmd.output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output).await.map_err(|_| {
                RemoteError::Timeout {
                    host: self.host.clone(),
                    action: action.clone(),
                    timeout,
                }
            })?,
            None => output.await,
        }
        .map_err(|source| RemoteError::Spawn { program, source })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(RemoteError::Failed {
                host: self.host.clone(),
                action,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────

/// Split `host[:port]`, accepting `[v6addr]:port` and bare IPv6 literals.
fn split_host_port(target: &str) -> (&str, Option<&str>) {
    if let Some(bracketed) = target.strip_prefix('[') {
        if let Some((host, rest)) = bracketed.split_once(']') {
            return (host, rest.strip_prefix(':'));
        }
    }
    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (target, None),
    }
}

/// Resolve the remote file and directory for an upload of `local`.
fn upload_target(local: &Path, remote: &str) -> (String, String) {
    if remote.ends_with('/') {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return (format!("{remote}{name}"), remote.to_owned());
    }
    let dir = match remote.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => ".",
    };
    (remote.to_owned(), dir.to_owned())
}

/// Single-quote `arg` for the remote shell.
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn mkdir_command(dir: &str) -> String {
    format!("mkdir -p {}", shell_quote(dir))
}

/// Same algorithm as [`crate::fs::file_digest`].
fn digest_command(path: &str) -> String {
    let path = shell_quote(path);
    format!("test -f {path} && b3sum --no-names {path}")
}
