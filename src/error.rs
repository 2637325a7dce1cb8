use thiserror::Error;

/// Why a single detail page produced no record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("landmark `{landmark}` not found on {url}")]
    LandmarkNotFound { landmark: &'static str, url: String },
    #[error("webdriver session failed: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),
    #[error("webdriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),
}

impl ExtractionError {
    pub fn landmark(landmark: &'static str, url: &str) -> Self {
        ExtractionError::LandmarkNotFound {
            landmark,
            url: url.to_string(),
        }
    }
}
