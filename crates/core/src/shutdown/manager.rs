use std::sync::Arc;

use super::coordinator::ShutdownHandle;
use crate::types::BoxError;

/// A pluggable shutdown trigger.
///
/// `start` is called once by [`GracefulShutdown::start`](super::GracefulShutdown::start)
/// and must not block: it arms whatever listener the manager needs and keeps
/// the handle. When the trigger condition fires, the manager calls
/// [`ShutdownHandle::start_shutdown`] with itself, which runs
/// `shutdown_start`, then every callback, then `shutdown_finish`.
#[async_trait::async_trait]
pub trait ShutdownManager: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self, handle: ShutdownHandle) -> Result<(), BoxError>;

    /// Runs before any callback.
    async fn shutdown_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after every callback has returned.
    async fn shutdown_finish(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: ShutdownManager + ?Sized> ShutdownManager for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&self, handle: ShutdownHandle) -> Result<(), BoxError> {
        (**self).start(handle)
    }

    async fn shutdown_start(&self) -> Result<(), BoxError> {
        (**self).shutdown_start().await
    }

    async fn shutdown_finish(&self) -> Result<(), BoxError> {
        (**self).shutdown_finish().await
    }
}
