//! Small `sh` programs used as supervised children.
//!
//! All of them treat a line reading exactly `stop` as the shutdown command.

/// Echo every stdin line to stdout. On `stop`, print `bye` and exit 0.
pub const ECHO: &str = r#"
while IFS= read -r line; do
    if [ "$line" = stop ]; then
        echo bye
        exit 0
    fi
    printf '%s\n' "$line"
done
"#;

/// Like [`ECHO`], but echoes to stderr as well, prefixed with `err:`.
pub const ECHO_BOTH: &str = r#"
while IFS= read -r line; do
    if [ "$line" = stop ]; then
        echo bye
        echo bye >&2
        exit 0
    fi
    printf '%s\n' "$line"
    printf 'err:%s\n' "$line" >&2
done
"#;

/// Append every stdin line to the file named by `$1`, then echo it.
/// Exits 0 on `stop` without echoing.
pub const RECORD: &str = r#"
while IFS= read -r line; do
    printf '%s\n' "$line" >> "$1"
    if [ "$line" = stop ]; then
        exit 0
    fi
    printf '%s\n' "$line"
done
"#;

/// Print the working directory, then behave like [`ECHO`].
pub const PWD_THEN_ECHO: &str = r#"
pwd
while IFS= read -r line; do
    if [ "$line" = stop ]; then
        exit 0
    fi
    printf '%s\n' "$line"
done
"#;

/// Exit with status 3 on `stop`.
pub const FAIL_ON_STOP: &str = r#"
while IFS= read -r line; do
    if [ "$line" = stop ]; then
        exit 3
    fi
done
"#;

/// Ignore stdin, SIGTERM and EOF entirely; only SIGKILL ends it.
pub const STUBBORN: &str = r#"
trap '' TERM
while :; do
    sleep 1
done
"#;
