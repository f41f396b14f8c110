//! Stateless helpers used by shutdown callbacks and the `graceful` binary.

pub mod flag;
pub mod fs;
pub mod random;
pub mod remote;
pub mod user;

pub use flag::{normalize_args, normalize_flag_name};
pub use random::{ALPHABET_36, ALPHABET_62, rand_string};
pub use remote::{RemoteClient, RemoteError};
pub use user::{current_user, user_home};
