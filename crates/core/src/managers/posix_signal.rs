use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ShutdownCfg;
use crate::error::Error;
use crate::shutdown::{ShutdownHandle, ShutdownManager};
use crate::types::{BoxError, Signal};

/// Name reported to callbacks for signal-triggered shutdowns.
pub const NAME: &str = "PosixSignalManager";

type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Triggers shutdown on the first of its configured OS signals, then exits
/// the process once the sequence is done.
#[derive(Clone)]
pub struct PosixSignalManager {
    signals: Vec<Signal>,
    exit: ExitFn,
    exit_code: i32,
    token: CancellationToken,
}

impl PosixSignalManager {
    /// Listen for `signals`; an empty set means SIGINT + SIGTERM.
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut signals: Vec<Signal> = signals.into_iter().collect();
        if signals.is_empty() {
            signals = Signal::DEFAULT.to_vec();
        }
        Self {
            signals,
            exit: Arc::new(exit_process),
            exit_code: 0,
            token: CancellationToken::new(),
        }
    }

    pub fn from_cfg(cfg: &ShutdownCfg) -> Result<Self, Error> {
        Ok(Self::new(cfg.signals()?).with_exit_code(cfg.exit_code))
    }

    /// Replace the function called by the post hook (`std::process::exit` by default).
    pub fn with_exit(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Arc::new(exit);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Stop a listener that has not fired yet.
    ///
    /// tokio never uninstalls a signal handler, so the configured signals
    /// keep being caught after `stop()` and no longer terminate the process.
    /// Shut down some other way afterwards.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Default for PosixSignalManager {
    fn default() -> Self {
        Self::new([])
    }
}

#[async_trait::async_trait]
impl ShutdownManager for PosixSignalManager {
    fn name(&self) -> &str {
        NAME
    }

    /// Installs the handlers synchronously, then waits for a signal on a
    /// spawned task.
    fn start(&self, handle: ShutdownHandle) -> Result<(), BoxError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let mut listener = Listener::install(&self.signals)?;
        let this = self.clone();

        runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = this.token.cancelled() => {
                    tracing::debug!("signal listener stopped");
                    return;
                }
                signal = listener.recv() => {
                    tracing::info!(%signal, "received signal, initiating shutdown");
                }
            }
            handle.start_shutdown(&this).await;
        });

        tracing::debug!(signals = ?self.signals, "listening for shutdown signals");
        Ok(())
    }

    async fn shutdown_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn shutdown_finish(&self) -> Result<(), BoxError> {
        tracing::info!(code = self.exit_code, "shutdown complete, exiting");
        (self.exit)(self.exit_code);
        Ok(())
    }
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// Armed signal streams; resolves on the first signal received.
struct Listener {
    #[cfg(unix)]
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
}

impl Listener {
    #[cfg(unix)]
    fn install(signals: &[Signal]) -> Result<Self, Error> {
        let streams = signals
            .iter()
            .map(|&signal| {
                tokio::signal::unix::signal(signal.kind())
                    .map(|stream| (signal, stream))
                    .map_err(|source| Error::SignalRegistration { signal, source })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { streams })
    }

    #[cfg(not(unix))]
    fn install(signals: &[Signal]) -> Result<Self, Error> {
        match signals.iter().find(|s| **s != Signal::Interrupt) {
            Some(&unsupported) => Err(Error::UnsupportedSignal(unsupported)),
            None => Ok(Self {}),
        }
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> Signal {
        std::future::poll_fn(|cx| {
            for (signal, stream) in &mut self.streams {
                if stream.poll_recv(cx).is_ready() {
                    return std::task::Poll::Ready(*signal);
                }
            }
            std::task::Poll::Pending
        })
        .await
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Signal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to wait for Ctrl+C");
            std::future::pending::<()>().await;
        }
        Signal::Interrupt
    }
}
