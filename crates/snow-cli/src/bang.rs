//! `!`cmd`` / `!!`cmd`` terminal passthrough (§6), with the optional
//! `<timeoutMs>` suffix. `!cmd` runs the command and hands its output back
//! to the caller so it can be folded into the next user turn; `!!cmd` runs
//! it and the caller discards the result instead of sending it to the LLM.

use snow_terminal::manager::TerminalManager;
use snow_terminal::types::ExecOptions;
use tokio_util::sync::CancellationToken;

/// Splits a trailing `<NNNN>` timeout suffix off `body`, if present and
/// numeric, returning `(command, timeout_ms)`.
fn split_timeout_suffix(body: &str) -> (&str, Option<u64>) {
    let Some(open) = body.rfind('<') else { return (body, None) };
    if !body.ends_with('>') {
        return (body, None);
    }
    let inner = &body[open + 1..body.len() - 1];
    match inner.parse::<u64>() {
        Ok(ms) => (body[..open].trim_end(), Some(ms)),
        Err(_) => (body, None),
    }
}

/// Parses a line starting with `!`/`!!`. Returns `None` if `line` is not a
/// bang command at all.
pub enum BangCommand<'a> {
    /// `!cmd` — include output in the next user message.
    Shared(&'a str, Option<u64>),
    /// `!!cmd` — run silently, never sent to the LLM.
    Silent(&'a str, Option<u64>),
}

pub fn parse(line: &str) -> Option<BangCommand<'_>> {
    if let Some(rest) = line.strip_prefix("!!") {
        let (cmd, timeout) = split_timeout_suffix(rest.trim());
        return Some(BangCommand::Silent(cmd, timeout));
    }
    if let Some(rest) = line.strip_prefix('!') {
        let (cmd, timeout) = split_timeout_suffix(rest.trim());
        return Some(BangCommand::Shared(cmd, timeout));
    }
    None
}

/// Runs `command` in `cwd` with the default terminal safety/timeout
/// policy, returning the formatted transcript that either gets printed
/// (`!!`) or folded into the next user message (`!`).
pub async fn run(manager: &TerminalManager, command: &str, cwd: &str, timeout_ms: Option<u64>) -> String {
    let options = ExecOptions {
        timeout_secs: timeout_ms.map(|ms| ms.div_ceil(1000).max(1)).unwrap_or(30),
        ..Default::default()
    };
    match manager.exec(command, cwd, options, CancellationToken::new()).await {
        Ok(result) => format!(
            "$ {}\nexit_code: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            result.command, result.exit_code, result.stdout, result.stderr
        ),
        Err(e) => format!("$ {command}\nfailed to execute: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_numeric_timeout_suffix() {
        assert_eq!(split_timeout_suffix("ls -la<5000>"), ("ls -la", Some(5000)));
    }

    #[test]
    fn leaves_command_without_suffix_untouched() {
        assert_eq!(split_timeout_suffix("ls -la"), ("ls -la", None));
    }

    #[test]
    fn ignores_non_numeric_angle_brackets() {
        assert_eq!(split_timeout_suffix("echo <not a number>"), ("echo <not a number>", None));
    }

    #[test]
    fn parses_double_bang_as_silent() {
        assert!(matches!(parse("!!echo hi"), Some(BangCommand::Silent("echo hi", None))));
    }

    #[test]
    fn parses_single_bang_as_shared() {
        assert!(matches!(parse("!echo hi"), Some(BangCommand::Shared("echo hi", None))));
    }

    #[test]
    fn non_bang_line_is_not_a_command() {
        assert!(parse("echo hi").is_none());
    }
}
