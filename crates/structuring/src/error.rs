#[derive(Debug, thiserror::Error)]
pub enum StructuringError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream API returned a non-2xx status code.
    #[error("Structuring API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The upstream returned no message content.
    #[error("Empty response from structuring service")]
    EmptyResponse,

    /// The message content was not a valid structured story.
    #[error("Malformed structuring output: {0}")]
    Malformed(String),

    #[error("Structuring misconfigured: {0}")]
    Configuration(String),
}

impl StructuringError {
    /// `true` when the upstream answered but its output was unusable, as
    /// opposed to the upstream being unreachable or erroring.
    pub fn is_bad_output(&self) -> bool {
        matches!(
            self,
            StructuringError::EmptyResponse | StructuringError::Malformed(_)
        )
    }
}
