use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed field path {path:?}: {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("cannot descend into {kind} at {path}")]
    NotAContainer { path: String, kind: &'static str },

    #[error("index {index} at {path} is too far past the end of a list of {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}
