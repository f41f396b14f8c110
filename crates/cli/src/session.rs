use std::io;
use std::path::{Path, PathBuf};

use graceful_core::{BoxError, ShutdownCallback, ShutdownFn};
use graceful_util::{ALPHABET_36, RemoteClient, fs, rand_string};
use tokio::io::AsyncWriteExt;

const LOCK_FILE: &str = "graceful.lock";

/// Append-only session log plus a pid lock file inside the work dir.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub log: PathBuf,
    pub lock: PathBuf,
}

impl Session {
    pub fn create(work_dir: &Path) -> io::Result<Self> {
        fs::mkdir_all(work_dir)?;
        let id = rand_string(ALPHABET_36, 12);
        let session = Self {
            log: work_dir.join(format!("session-{id}.log")),
            lock: work_dir.join(LOCK_FILE),
            id,
        };
        if fs::exists(&session.lock) {
            tracing::warn!(lock = %session.lock.display(), "stale lock file, overwriting");
        }
        std::fs::write(&session.lock, std::process::id().to_string())?;
        std::fs::write(&session.log, format!("started pid={}\n", std::process::id()))?;
        Ok(session)
    }

    pub async fn append(&self, line: &str) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.sync_all().await
    }
}

/// Record who stopped us, then log the final digest of the session file.
pub fn flush_session(session: Session) -> impl ShutdownCallback {
    ShutdownFn::new(move |manager: String| {
        let session = session.clone();
        async move {
            session.append(&format!("stopped by {manager}")).await?;
            let log = session.log.clone();
            let digest = tokio::task::spawn_blocking(move || fs::file_digest(log)).await??;
            tracing::info!(session = %session.id, %digest, "session log flushed");
            Ok::<(), BoxError>(())
        }
    })
}

pub fn remove_lock(session: Session) -> impl ShutdownCallback {
    ShutdownFn::new(move |_: String| {
        let lock = session.lock.clone();
        async move {
            tokio::fs::remove_file(&lock).await.map_err(|e| {
                BoxError::from(format!("failed to remove {}: {e}", lock.display()))
            })?;
            tracing::debug!(lock = %lock.display(), "lock file removed");
            Ok::<(), BoxError>(())
        }
    })
}

/// Run `command` on a remote host, telling it which manager triggered shutdown
/// through `GRACEFUL_MANAGER`.
pub fn notify_remote(client: RemoteClient, command: String) -> impl ShutdownCallback {
    ShutdownFn::new(move |manager: String| {
        let client = client.clone();
        let command = format!("GRACEFUL_MANAGER={manager} {command}");
        async move {
            client.run(&command).await?;
            tracing::info!(host = %client.host, "remote notified");
            Ok::<(), BoxError>(())
        }
    })
}
