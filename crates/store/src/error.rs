use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("core error: {0}")]
    Core(#[from] formstate_core::CoreError),

    #[error("index {index} out of bounds for list {path} of length {len}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}
