use thiserror::Error;

/// Problems with the submission itself; nothing is launched for these
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("No code provided")]
    MissingCode,
    #[error("Unsupported language: {language}. Supported languages: {supported}")]
    UnsupportedLanguage { language: String, supported: String },
    #[error("Could not determine {what} for {language}")]
    EntryPointNotFound { language: String, what: &'static str },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The service failed, not the submitted program
    #[error(transparent)]
    Server(#[from] anyhow::Error),
}
