use crate::Cancelled;

/// Boxed error returned by request customizers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum SacloudError {
    /// Required configuration (such as a credential variable) is missing.
    #[error("configuration error: {0}")]
    Config(String),
    /// The request customizer rejected the request before any attempt.
    #[error("request customization failed: {0}")]
    Customize(#[source] BoxError),
    /// The request body could not be buffered for replay.
    #[error("failed to buffer request body: {0}")]
    BodyCapture(#[source] reqwest::Error),
    /// Network or request execution error from the transport.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The cancellation signal fired (explicit cancel or deadline).
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    /// Response body decoding error (gzip or JSON).
    #[error("decode error: {0}")]
    Decode(String),
}

impl SacloudError {
    /// Returns `true` when the exchange ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
