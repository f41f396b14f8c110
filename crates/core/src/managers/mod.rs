//! Concrete shutdown managers.

mod posix_signal;

pub use posix_signal::{NAME as POSIX_SIGNAL_MANAGER, PosixSignalManager};
