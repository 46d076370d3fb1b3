use thiserror::Error;

use crate::types::Pid;

/// Failures of a user-triggered action. Reported through completions, never as dialogs.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("process {pid} is no longer running")]
    ProcessNotFound { pid: Pid },

    #[error("could not activate {name}")]
    ActivationFailed { name: String },

    #[error("sharing failed: {0}")]
    Share(String),

    #[error("discard failed: {0}")]
    Discard(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no home directory")]
    NoHome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_not_found_names_pid() {
        let err = ActionError::ProcessNotFound { pid: 4242 };
        assert_eq!(err.to_string(), "process 4242 is no longer running");
    }

    #[test]
    fn config_json_error_is_wrapped() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ConfigError::from(json_err);
        assert!(err.to_string().starts_with("JSON error"));
    }
}
