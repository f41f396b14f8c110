use std::borrow::Cow;
use std::ffi::OsString;

/// Normalize a flag name so `work_dir` and `work-dir` are the same flag.
pub fn normalize_flag_name(name: &str) -> Cow<'_, str> {
    if name.contains('_') {
        Cow::Owned(name.replace('_', "-"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Normalize the name part of every `--long` argument before handing argv
/// to the parser. Values (`--name=a_b`), short flags, positionals, arguments
/// that are not valid UTF-8 and everything after a bare `--` are left alone.
pub fn normalize_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            let Some(rest) = text.strip_prefix("--") else {
                return arg;
            };
            match rest.split_once('=') {
                Some((name, value)) => format!("--{}={value}", normalize_flag_name(name)).into(),
                None => format!("--{}", normalize_flag_name(rest)).into(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscores_become_dashes() {
        assert_eq!(normalize_flag_name("work_dir"), "work-dir");
        assert_eq!(normalize_flag_name("callback_timeout_secs"), "callback-timeout-secs");
        assert!(matches!(normalize_flag_name("signal"), Cow::Borrowed("signal")));
    }

    #[test]
    fn only_long_flag_names_are_rewritten() {
        let args = normalize_args([
            "graceful",
            "--work_dir=/tmp/a_b",
            "--remote_cmd",
            "echo a_b",
            "-v",
            "some_positional",
            "--",
            "--not_a_flag",
        ]);
        assert_eq!(
            args,
            vec![
                "graceful",
                "--work-dir=/tmp/a_b",
                "--remote-cmd",
                "echo a_b",
                "-v",
                "some_positional",
                "--",
                "--not_a_flag",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_pass_through() {
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(b"--work_dir=/tmp/\xff".to_vec());
        let args = normalize_args([OsString::from("graceful"), raw.clone(), "--remote_cmd".into()]);
        assert_eq!(args, vec![OsString::from("graceful"), raw, "--remote-cmd".into()]);
    }
}
