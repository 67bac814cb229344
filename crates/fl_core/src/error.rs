use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Empty article body")]
    EmptyBody,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Whether the failure came from one of the remote services rather than
    /// from local validation.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Inference(_) | Error::Search(_) | Error::Timeout(_) | Error::Http(_)
        )
    }
}
