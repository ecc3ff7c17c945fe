use formstate_core::CoreError;
use formstate_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid form settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("form has been dropped")]
    FormReleased,

    #[error("controlled field {0} written before hydration")]
    NotHydrated(String),

    #[error("controlled field {0} is not mounted")]
    NotMounted(String),

    #[error("submit requires a transport")]
    MissingTransport,
}
