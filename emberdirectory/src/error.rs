use thiserror::Error;

/// Failures from the directory client.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("username already registered")]
    Conflict,
    #[error("not found in the directory")]
    NotFound,
    #[error("directory request failed: {0}")]
    NetErr(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        DirectoryError::NetErr(e.to_string())
    }
}
