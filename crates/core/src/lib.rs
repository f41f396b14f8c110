//! Graceful shutdown coordination.
//!
//! Register [`ShutdownCallback`]s and [`ShutdownManager`]s on a
//! [`GracefulShutdown`], then [`start`](GracefulShutdown::start) it. When any
//! manager detects its trigger (e.g. [`PosixSignalManager`] on SIGTERM) it runs
//! the shutdown sequence through its [`ShutdownHandle`]: pre hook, every
//! callback concurrently, post hook. Errors from any step are routed to the
//! single [`ErrorHandler`].

pub mod config;
pub mod error;
pub mod managers;
pub mod shutdown;
pub mod types;

pub use config::ShutdownCfg;
pub use error::Error;
pub use managers::PosixSignalManager;
pub use shutdown::{
    ErrorHandler, GracefulShutdown, ShutdownCallback, ShutdownFn, ShutdownHandle, ShutdownManager,
};
pub use types::{BoxError, ShutdownReport, Signal};
