mod session;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use graceful_core::{BoxError, GracefulShutdown, PosixSignalManager, ShutdownCfg};
use graceful_util::{RemoteClient, normalize_args};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use session::Session;

/// Run until signalled, then clean up gracefully.
///
/// Long flags accept `_` in place of `-` (`--work_dir` == `--work-dir`).
#[derive(Debug, Parser)]
#[command(name = "graceful", version)]
struct Cli {
    /// Directory for the session log and lock file [default: $TMPDIR/graceful].
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// JSON config file. Without it, GRACEFUL_* environment variables are read.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Abort cleanup callbacks still running after this many seconds (0 = wait).
    #[arg(long)]
    callback_timeout_secs: Option<u64>,

    /// Signal that triggers shutdown, repeatable [default: SIGINT, SIGTERM].
    #[arg(long = "signal")]
    signals: Vec<String>,

    /// `[user@]host[:port]` to notify over ssh during shutdown.
    #[arg(long)]
    remote: Option<String>,

    /// Command run on the remote host.
    #[arg(long, requires = "remote", default_value = "logger -t graceful shutting down")]
    remote_cmd: String,

    /// Seconds between heartbeat lines in the session log.
    #[arg(long, default_value_t = 5)]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    let mut cfg = match &cli.config {
        Some(path) => ShutdownCfg::load(path)?,
        None => ShutdownCfg::from_env(),
    };
    if let Some(secs) = cli.callback_timeout_secs {
        cfg.callback_timeout_secs = secs;
    }
    if !cli.signals.is_empty() {
        cfg.signals = cli.signals.clone();
    }
    for (key, value, description) in cfg.to_entries() {
        tracing::debug!(key, %value, description, "config");
    }

    let work_dir = cli
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("graceful"));
    let session = Session::create(&work_dir)?;

    let mut gs = GracefulShutdown::with_cfg(&cfg);
    gs.set_error_handler(|err: BoxError| {
        tracing::error!(error = %err, "shutdown step failed");
    });
    gs.add_callback(session::flush_session(session.clone()));
    gs.add_callback(session::remove_lock(session.clone()));
    if let Some(target) = &cli.remote {
        let client = RemoteClient::parse(target).with_timeout(Duration::from_secs(60));
        gs.add_callback(session::notify_remote(client, cli.remote_cmd.clone()));
    }
    gs.add_manager(PosixSignalManager::from_cfg(&cfg)?);
    let handle = gs.start()?;

    tracing::info!(
        pid = std::process::id(),
        session = %session.id,
        work_dir = %work_dir.display(),
        "running, waiting for a shutdown signal"
    );

    let token = handle.token();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(cli.heartbeat_secs.max(1)));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = heartbeat.tick() => {
                if let Err(e) = session.append("heartbeat").await {
                    tracing::warn!(error = %e, "failed to write heartbeat");
                }
            }
        }
    }

    // The signal manager exits the process once every callback has finished.
    std::future::pending::<()>().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("GRACEFUL_LOG_JSON").is_ok_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_flags_parse_like_dashed_ones() {
        let cli = Cli::try_parse_from(normalize_args([
            "graceful",
            "--work_dir=/tmp/g",
            "--callback_timeout_secs",
            "7",
            "--signal",
            "SIGHUP",
            "--signal=SIGTERM",
        ]))
        .unwrap();

        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/g")));
        assert_eq!(cli.callback_timeout_secs, Some(7));
        assert_eq!(cli.signals, vec!["SIGHUP", "SIGTERM"]);
        assert_eq!(cli.heartbeat_secs, 5);
    }

    #[test]
    fn remote_cmd_requires_remote() {
        let err = Cli::try_parse_from(["graceful", "--remote-cmd", "true"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
