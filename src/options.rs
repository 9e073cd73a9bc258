//! Data model: the `Command` the caller supplies and the per-run
//! `RunOptions` that configure [`crate::core`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default chunk size for incremental reads.
pub const DEFAULT_READSIZE: usize = 1024;

/// Either an opaque shell string or an already-tokenized argument sequence.
#[derive(Debug, Clone)]
pub enum Command {
    /// A single string, interpreted verbatim by a shell, or POSIX-tokenized
    /// when running without a shell.
    Literal(String),
    /// An ordered sequence of argument tokens.
    Argv(Vec<String>),
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        Command::Literal(s.to_string())
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        Command::Literal(s)
    }
}

impl From<Vec<String>> for Command {
    fn from(v: Vec<String>) -> Self {
        Command::Argv(v)
    }
}

impl From<&[&str]> for Command {
    fn from(v: &[&str]) -> Self {
        Command::Argv(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Command {
    fn from(v: [&str; N]) -> Self {
        Command::Argv(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<crate::cmdlist::CmdList> for Command {
    fn from(c: crate::cmdlist::CmdList) -> Self {
        Command::Argv(c.into_vec())
    }
}

/// Per-run configuration. Consumed by exactly one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: Option<Vec<u8>>,
    pub startpath: Option<PathBuf>,
    pub use_shell: bool,
    pub shell: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub disable_log: bool,
    pub readsize: usize,
    /// QA sets this true; everything else leaves stdin closed after the
    /// initial write so children that read-until-EOF don't hang.
    pub keep_stdin_open: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            input: None,
            startpath: None,
            use_shell: false,
            shell: None,
            env: None,
            disable_log: false,
            readsize: DEFAULT_READSIZE,
            keep_stdin_open: false,
        }
    }
}

/// Short-lived tuning knobs for the loop driver, kept out of `RunOptions`
/// since callers never need to change them — they're the engine's own
/// polling cadence, not something a command author configures per run.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub init_delay: Duration,
    pub main_delay: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            init_delay: Duration::from_millis(100),
            main_delay: Duration::from_secs(1),
        }
    }
}

/// Sentinel exit codes for supervisory termination, distinct from any real
/// child exit status.
pub const TIMEOUT_EXIT_CODE: i32 = 123;
pub const QA_MISS_EXIT_CODE: i32 = 124;

/// Split a single command string into argv tokens the way a POSIX shell
/// would, without invoking a shell. Handles single/double quoting and
/// backslash escapes; does not expand globs, variables, or substitutions —
/// by design, the caller asked for *no* shell.
pub fn posix_split(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_current = false;
    let mut chars = input.chars().peekable();

    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }
    let mut quote = Quote::None;

    while let Some(c) = chars.next() {
        match quote {
            Quote::None => match c {
                ' ' | '\t' | '\n' => {
                    if has_current {
                        tokens.push(std::mem::take(&mut current));
                        has_current = false;
                    }
                }
                '\'' => {
                    quote = Quote::Single;
                    has_current = true;
                }
                '"' => {
                    quote = Quote::Double;
                    has_current = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        has_current = true;
                    }
                }
                _ => {
                    current.push(c);
                    has_current = true;
                }
            },
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' if matches!(chars.peek(), Some('"') | Some('\\') | Some('$')) => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if has_current {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(posix_split("echo hi there"), vec!["echo", "hi", "there"]);
    }

    #[test]
    fn strips_single_quotes() {
        assert_eq!(posix_split("echo 'a b'"), vec!["echo", "a b"]);
    }

    #[test]
    fn strips_double_quotes() {
        assert_eq!(posix_split("echo \"a b\""), vec!["echo", "a b"]);
    }

    #[test]
    fn handles_backslash_escape_outside_quotes() {
        assert_eq!(posix_split("echo a\\ b"), vec!["echo", "a b"]);
    }

    #[test]
    fn empty_string_yields_no_tokens() {
        assert!(posix_split("").is_empty());
    }

    #[test]
    fn default_run_options_are_no_shell() {
        let opts = RunOptions::default();
        assert!(!opts.use_shell);
        assert!(!opts.keep_stdin_open);
        assert_eq!(opts.readsize, DEFAULT_READSIZE);
    }
}
