use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::callback::{ErrorHandler, ShutdownCallback};
use super::manager::ShutdownManager;
use crate::config::ShutdownCfg;
use crate::error::Error;
use crate::types::{BoxError, ShutdownReport};

type CallbackResult = (usize, Result<(), BoxError>);

/// Registration side of the coordinator.
///
/// Collect managers, callbacks and the error handler, then call
/// [`start`](Self::start). `start` consumes the builder, so nothing can be
/// registered once a manager is able to trigger shutdown.
#[derive(Default)]
pub struct GracefulShutdown {
    callbacks: Vec<Arc<dyn ShutdownCallback>>,
    managers: Vec<Arc<dyn ShutdownManager>>,
    error_handler: Option<Box<dyn ErrorHandler>>,
    callback_timeout: Option<Duration>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cfg(cfg: &ShutdownCfg) -> Self {
        Self {
            callback_timeout: cfg.callback_timeout(),
            ..Self::default()
        }
    }

    /// Abort callbacks still running after `timeout` and move on to the
    /// post hook. `None` (the default) waits for every callback.
    pub fn set_callback_timeout(&mut self, timeout: Option<Duration>) {
        self.callback_timeout = timeout;
    }

    pub fn add_manager(&mut self, manager: impl ShutdownManager + 'static) {
        self.managers.push(Arc::new(manager));
    }

    pub fn add_callback(&mut self, callback: impl ShutdownCallback + 'static) {
        self.callbacks.push(Arc::new(callback));
    }

    /// Replaces any previously set handler.
    pub fn set_error_handler(&mut self, handler: impl ErrorHandler + 'static) {
        self.error_handler = Some(Box::new(handler));
    }

    /// Start every manager in registration order.
    ///
    /// Stops at the first manager that fails; managers after it are never
    /// started, managers before it keep running with their handle.
    pub fn start(self) -> Result<ShutdownHandle, Error> {
        let handle = ShutdownHandle {
            shared: Arc::new(Shared {
                callbacks: self.callbacks,
                error_handler: self.error_handler,
                callback_timeout: self.callback_timeout,
                token: CancellationToken::new(),
            }),
        };

        for manager in &self.managers {
            tracing::debug!(manager = manager.name(), "starting shutdown manager");
            manager
                .start(handle.clone())
                .map_err(|source| Error::ManagerStart {
                    manager: manager.name().to_owned(),
                    source,
                })?;
        }

        tracing::info!(
            managers = self.managers.len(),
            callbacks = handle.shared.callbacks.len(),
            "graceful shutdown armed"
        );
        Ok(handle)
    }
}

struct Shared {
    callbacks: Vec<Arc<dyn ShutdownCallback>>,
    error_handler: Option<Box<dyn ErrorHandler>>,
    callback_timeout: Option<Duration>,
    token: CancellationToken,
}

/// Handle given to managers once the coordinator is started.
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Cancelled as soon as a shutdown sequence has passed its pre hook.
    pub fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Forward `err` to the error handler. Dropped when no handler is set.
    pub fn report_error(&self, err: BoxError) {
        match &self.shared.error_handler {
            Some(handler) => handler.on_error(err),
            None => tracing::debug!(error = %err, "no error handler set, dropping error"),
        }
    }

    /// Returns whether `result` carried an error.
    fn report(&self, result: Result<(), BoxError>) -> bool {
        match result {
            Ok(()) => false,
            Err(err) => {
                self.report_error(err);
                true
            }
        }
    }

    /// Run the shutdown sequence on behalf of `manager`.
    ///
    /// Pre hook, then all callbacks concurrently, then the post hook once
    /// every callback has finished (or the callback deadline has passed).
    /// Failures never abort the sequence; they go to the error handler.
    /// Resolves when the post hook has returned.
    pub async fn start_shutdown(&self, manager: &dyn ShutdownManager) -> ShutdownReport {
        let sequence = Uuid::new_v4();
        let name = manager.name().to_owned();
        let span = tracing::info_span!("shutdown", %sequence, manager = %name);
        self.run_sequence(manager, sequence, name).instrument(span).await
    }

    async fn run_sequence(
        &self,
        manager: &dyn ShutdownManager,
        sequence: Uuid,
        name: String,
    ) -> ShutdownReport {
        let started = Instant::now();
        let callbacks = self.shared.callbacks.len();
        tracing::info!(callbacks, "shutdown requested");

        let mut errors = usize::from(self.report(manager.shutdown_start().await));
        self.shared.token.cancel();

        let mut tasks = JoinSet::new();
        let mut indices = HashMap::with_capacity(callbacks);
        for (index, callback) in self.shared.callbacks.iter().enumerate() {
            let callback = Arc::clone(callback);
            let name = name.clone();
            let task = tasks.spawn(
                async move { (index, callback.on_shutdown(&name).await) }.in_current_span(),
            );
            indices.insert(task.id(), index);
        }

        match self.shared.callback_timeout {
            None => self.join_callbacks(&mut tasks, &indices, &mut errors).await,
            Some(timeout) => {
                let joined = tokio::time::timeout(
                    timeout,
                    self.join_callbacks(&mut tasks, &indices, &mut errors),
                )
                .await;
                if joined.is_err() {
                    let pending = tasks.len();
                    tasks.abort_all();
                    tracing::warn!(pending, ?timeout, "callbacks timed out, aborting");
                    self.report_error(Box::new(Error::CallbackTimeout { pending, timeout }));
                    errors += 1;
                }
            }
        }

        errors += usize::from(self.report(manager.shutdown_finish().await));

        let elapsed = started.elapsed();
        tracing::info!(errors, elapsed_ms = elapsed.as_millis() as u64, "shutdown sequence finished");
        ShutdownReport {
            sequence,
            manager: name,
            callbacks,
            errors,
            elapsed,
        }
    }

    async fn join_callbacks(
        &self,
        tasks: &mut JoinSet<CallbackResult>,
        indices: &HashMap<Id, usize>,
        errors: &mut usize,
    ) {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Err(e) = &result {
                        tracing::debug!(index, error = %e, "callback failed");
                    } else {
                        tracing::debug!(index, "callback finished");
                    }
                    *errors += usize::from(self.report(result));
                }
                Err(e) => {
                    let index = indices.get(&e.id()).copied().unwrap_or_default();
                    tracing::warn!(index, "callback panicked");
                    self.report_error(Box::new(Error::CallbackPanicked { index }));
                    *errors += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::shutdown::ShutdownFn;

    #[derive(Default)]
    struct Noop;

    #[async_trait::async_trait]
    impl ShutdownManager for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn start(&self, _handle: ShutdownHandle) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn recording_handler(gs: &mut GracefulShutdown) -> Arc<Mutex<Vec<String>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        gs.set_error_handler(move |err: BoxError| sink.lock().unwrap().push(err.to_string()));
        errors
    }

    #[tokio::test]
    async fn report_error_without_handler_is_dropped() {
        let handle = GracefulShutdown::new().start().unwrap();
        handle.report_error("ignored".into());
    }

    #[tokio::test]
    async fn set_error_handler_overwrites_previous() {
        let mut gs = GracefulShutdown::new();
        let first = recording_handler(&mut gs);
        let second = recording_handler(&mut gs);
        let handle = gs.start().unwrap();

        handle.report_error("boom".into());
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec!["boom"]);
    }

    #[tokio::test]
    async fn token_cancelled_once_sequence_begins() {
        let handle = GracefulShutdown::new().start().unwrap();
        let token = handle.token();
        assert!(!handle.is_shutting_down());

        handle.start_shutdown(&Noop).await;
        assert!(token.is_cancelled());
        assert!(handle.is_shutting_down());
    }

    #[tokio::test]
    async fn panicking_callback_is_reported_with_its_index() {
        let mut gs = GracefulShutdown::new();
        let errors = recording_handler(&mut gs);
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        gs.add_callback(ShutdownFn::new(move |_: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        }));
        gs.add_callback(ShutdownFn::new(|_: String| async {
            if true {
                panic!("callback exploded");
            }
            Ok::<(), BoxError>(())
        }));
        let handle = gs.start().unwrap();

        let report = handle.start_shutdown(&Noop).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(report.errors, 1);
        assert_eq!(*errors.lock().unwrap(), vec!["shutdown callback #1 panicked"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts_hung_callbacks_and_runs_post_hook() {
        let mut gs = GracefulShutdown::new();
        gs.set_callback_timeout(Some(Duration::from_secs(5)));
        let errors = recording_handler(&mut gs);
        gs.add_callback(ShutdownFn::new(|_: String| async {
            std::future::pending::<()>().await;
            Ok::<(), BoxError>(())
        }));
        gs.add_callback(ShutdownFn::new(|_: String| async { Ok::<(), BoxError>(()) }));
        let handle = gs.start().unwrap();

        let report = handle.start_shutdown(&Noop).await;
        assert_eq!(report.callbacks, 2);
        assert_eq!(report.errors, 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("1 shutdown callback(s) still running after 5s"));
    }

    #[tokio::test]
    async fn report_describes_sequence() {
        let mut gs = GracefulShutdown::new();
        gs.add_callback(ShutdownFn::new(|_: String| async { Ok::<(), BoxError>(()) }));
        gs.add_callback(ShutdownFn::new(|_: String| async { Err::<(), BoxError>("nope".into()) }));
        let handle = gs.start().unwrap();

        let first = handle.start_shutdown(&Noop).await;
        assert_eq!(first.manager, "noop");
        assert_eq!(first.callbacks, 2);
        assert_eq!(first.errors, 1);

        let second = handle.start_shutdown(&Noop).await;
        assert_ne!(first.sequence, second.sequence);
    }
}
