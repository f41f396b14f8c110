use std::future::Future;
use std::sync::Arc;

use crate::types::BoxError;

/// Cleanup work run when shutdown is requested.
///
/// `manager` is the name of the [`ShutdownManager`](super::ShutdownManager)
/// that triggered the sequence. Callbacks run concurrently with each other;
/// idempotency is up to the implementation.
#[async_trait::async_trait]
pub trait ShutdownCallback: Send + Sync {
    async fn on_shutdown(&self, manager: &str) -> Result<(), BoxError>;
}

#[async_trait::async_trait]
impl<T: ShutdownCallback + ?Sized> ShutdownCallback for Arc<T> {
    async fn on_shutdown(&self, manager: &str) -> Result<(), BoxError> {
        (**self).on_shutdown(manager).await
    }
}

/// Adapter turning an async closure into a [`ShutdownCallback`].
///
/// ```ignore
/// gs.add_callback(ShutdownFn::new(|manager| async move {
///     tracing::info!(%manager, "flushing");
///     Ok(())
/// }));
/// ```
pub struct ShutdownFn<F>(F);

impl<F> ShutdownFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F, Fut> ShutdownCallback for ShutdownFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn on_shutdown(&self, manager: &str) -> Result<(), BoxError> {
        (self.0)(manager.to_owned()).await
    }
}

/// Receives every error surfaced during a shutdown sequence.
///
/// Implemented for any `Fn(BoxError) + Send + Sync`, so a closure can be
/// passed directly to `set_error_handler`.
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, err: BoxError);
}

impl<F> ErrorHandler for F
where
    F: Fn(BoxError) + Send + Sync,
{
    fn on_error(&self, err: BoxError) {
        self(err)
    }
}
