use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Request never got an answer (connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The model answered but produced no text.
    #[error("Model returned no text")]
    Empty,
}
