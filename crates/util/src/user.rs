//! Current user lookups, with fallbacks for environments without a
//! passwd entry (containers, CI).

use std::path::PathBuf;

const FALLBACK_USER: &str = "root";
const FALLBACK_HOME: &str = "/root";

/// Login name of the current user, `"root"` when it cannot be resolved.
#[cfg(unix)]
pub fn current_user() -> String {
    users::get_current_username()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| FALLBACK_USER.to_owned())
}

#[cfg(not(unix))]
pub fn current_user() -> String {
    std::env::var("USERNAME").unwrap_or_else(|_| FALLBACK_USER.to_owned())
}

/// Home directory of the current user, `/root` when it cannot be resolved.
#[cfg(unix)]
pub fn user_home() -> PathBuf {
    use users::os::unix::UserExt;
    users::get_user_by_uid(users::get_current_uid())
        .map(|user| user.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_HOME))
}

#[cfg(not(unix))]
pub fn user_home() -> PathBuf {
    std::env::var_os("USERPROFILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_HOME))
}
