//! Shutdown coordination.
//!
//! ```text
//! GracefulShutdown::start()
//!     manager.start(handle) for each manager, in order, fail-fast
//!
//! manager detects its trigger → handle.start_shutdown(manager)
//!     manager.shutdown_start()
//!     callbacks[..].on_shutdown(manager.name())   (concurrent, joined)
//!     manager.shutdown_finish()
//!     every error → ErrorHandler
//! ```

mod callback;
mod coordinator;
mod manager;

pub use callback::{ErrorHandler, ShutdownCallback, ShutdownFn};
pub use coordinator::{GracefulShutdown, ShutdownHandle};
pub use manager::ShutdownManager;
