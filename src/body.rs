use bytes::Bytes;
use http_body_util::BodyExt;

use crate::{Result, SacloudError};

/// Request body captured once so every attempt sends identical bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ReplayBody {
    bytes: Option<Bytes>,
}

impl ReplayBody {
    /// Takes the body out of `request` and buffers it.
    ///
    /// Streaming bodies are drained here; a stream that fails while being
    /// drained aborts the exchange before any attempt is made.
    pub(crate) async fn capture(request: &mut reqwest::Request) -> Result<Self> {
        let Some(body) = request.body_mut().take() else {
            return Ok(Self::default());
        };
        let bytes = match body.as_bytes() {
            Some(bytes) => Bytes::copy_from_slice(bytes),
            None => body
                .collect()
                .await
                .map_err(SacloudError::BodyCapture)?
                .to_bytes(),
        };
        Ok(Self { bytes: Some(bytes) })
    }

    /// Returns `true` when there is no body or the body has zero length.
    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.as_ref().map_or(true, Bytes::is_empty)
    }

    #[cfg(test)]
    pub(crate) fn as_bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    /// Produces a fresh body for the next attempt.
    pub(crate) fn replay(&self) -> Option<reqwest::Body> {
        self.bytes.clone().map(reqwest::Body::from)
    }
}
