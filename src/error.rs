//! Fatal error taxonomy for the command execution engine.

use std::path::PathBuf;

/// Fatal errors raised before or during a run. Non-fatal anomalies (non-zero
/// exit, timeout, QA miss-count) are reported through `RunResult`, not here.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("no command set")]
    NoCommand,

    #[error("item '{item}' being added to command contains a space")]
    SpaceInItem { item: String },

    #[error("startpath '{0}' does not exist")]
    StartPathMissing(PathBuf),

    #[error("startpath '{0}' exists but is not a directory")]
    StartPathNotADir(PathBuf),

    #[error("failed to change directory to '{path}': {source}")]
    ChdirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid answer for question '{question}': expected a string or list of strings")]
    InvalidAnswerType { question: String },

    #[error("question '{pattern}' converted to regex '{converted}' does not match itself")]
    QuestionSelfMatchFailed { pattern: String, converted: String },

    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to spawn command '{cmd}': {source}")]
    SpawnFailed {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open redirect file '{path}': {source}")]
    FileRedirectOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("redirect target '{0}' exists and is a directory")]
    FileRedirectIsDirectory(PathBuf),

    #[error("failed to write input to child stdin: {0}")]
    StdinWriteFailed(#[source] std::io::Error),
}

pub type RunFatalResult<T> = Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_no_command() {
        assert_eq!(RunError::NoCommand.to_string(), "no command set");
    }

    #[test]
    fn display_space_in_item() {
        let err = RunError::SpaceInItem {
            item: "a b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "item 'a b' being added to command contains a space"
        );
    }

    #[test]
    fn display_startpath_missing() {
        let err = RunError::StartPathMissing(PathBuf::from("/no/such/dir"));
        assert_eq!(err.to_string(), "startpath '/no/such/dir' does not exist");
    }

    #[test]
    fn display_file_redirect_is_directory() {
        let err = RunError::FileRedirectIsDirectory(PathBuf::from("/tmp"));
        assert_eq!(
            err.to_string(),
            "redirect target '/tmp' exists and is a directory"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RunError>();
    }
}
