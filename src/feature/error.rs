use thiserror::Error;

/// Failures that abort one load attempt. The previously loaded collection stays in place.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to fetch feature collection: {0}")]
    Fetch(String),

    #[error("Malformed feature collection: {0}")]
    Malformed(String),
}
