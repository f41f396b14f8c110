use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Error currency of callbacks, manager hooks and the error handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Summary of one finished shutdown sequence.
///
/// Informational only: every error counted here has already been routed to
/// the error handler (or dropped when none is set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Unique id of the sequence, also recorded on its tracing span.
    pub sequence: Uuid,
    /// Name of the manager that triggered the sequence.
    pub manager: String,
    /// Number of callbacks launched.
    pub callbacks: usize,
    /// Number of errors surfaced (hooks, callbacks, panics, timeout).
    pub errors: usize,
    pub elapsed: Duration,
}

/// OS signal a [`PosixSignalManager`](crate::managers::PosixSignalManager) can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
    User1,
    User2,
    /// Raw signal number (unix only).
    Raw(i32),
}

impl Signal {
    /// Signals used when none are configured.
    pub const DEFAULT: [Signal; 2] = [Signal::Interrupt, Signal::Terminate];

    #[cfg(unix)]
    pub fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;
        match self {
            Self::Interrupt => SignalKind::interrupt(),
            Self::Terminate => SignalKind::terminate(),
            Self::Hangup => SignalKind::hangup(),
            Self::Quit => SignalKind::quit(),
            Self::User1 => SignalKind::user_defined1(),
            Self::User2 => SignalKind::user_defined2(),
            Self::Raw(n) => SignalKind::from_raw(n),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Hangup => f.write_str("SIGHUP"),
            Self::Quit => f.write_str("SIGQUIT"),
            Self::User1 => f.write_str("SIGUSR1"),
            Self::User2 => f.write_str("SIGUSR2"),
            Self::Raw(n) => write!(f, "signal {n}"),
        }
    }
}

impl FromStr for Signal {
    type Err = Error;

    /// Accepts `SIGTERM`, `term`, `Term` and plain signal numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(Self::Interrupt),
            "TERM" => Ok(Self::Terminate),
            "HUP" => Ok(Self::Hangup),
            "QUIT" => Ok(Self::Quit),
            "USR1" => Ok(Self::User1),
            "USR2" => Ok(Self::User2),
            other => other
                .parse::<i32>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Raw)
                .ok_or_else(|| Error::InvalidSignal(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signal_names() {
        assert_eq!("SIGINT".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!("term".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!(" Hup ".parse::<Signal>().unwrap(), Signal::Hangup);
        assert_eq!("sigusr2".parse::<Signal>().unwrap(), Signal::User2);
        assert_eq!("10".parse::<Signal>().unwrap(), Signal::Raw(10));
    }

    #[test]
    fn rejects_unknown_signal() {
        assert!(matches!("SIGFOO".parse::<Signal>(), Err(Error::InvalidSignal(s)) if s == "SIGFOO"));
        assert!("-3".parse::<Signal>().is_err());
        assert!("".parse::<Signal>().is_err());
    }

    #[test]
    fn display_uses_conventional_names() {
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
        assert_eq!(Signal::Raw(12).to_string(), "signal 12");
    }
}
