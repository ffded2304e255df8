/// A failure to talk to the origin at all.
///
/// HTTP error statuses are *not* transport errors: the origin answered, so the
/// response is returned as-is and classified by the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection to origin failed: {0}")]
    Connect(String),
    #[error("origin request timed out: {0}")]
    Timeout(String),
    #[error("failed to read origin response body: {0}")]
    Body(String),
    #[error("invalid origin request: {0}")]
    Request(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
