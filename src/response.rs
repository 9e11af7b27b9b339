use std::{fmt, pin::Pin};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::{
    header::{HeaderMap, CONTENT_ENCODING, CONTENT_LENGTH},
    StatusCode, Url, Version,
};
use serde::de::DeserializeOwned;

use crate::{
    gzip::{gunzip, is_gzip_encoded},
    Result, SacloudError,
};

type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Final response of an exchange.
///
/// The body is read lazily; when gzip support is on and the server declared
/// `Content-Encoding: gzip`, reads yield the decompressed bytes.
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    decompressed: bool,
    body: BodyStream,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("decompressed", &self.decompressed)
            .finish()
    }
}

impl Response {
    pub(crate) fn new(response: reqwest::Response, gzip: bool) -> Self {
        let status = response.status();
        let version = response.version();
        let url = response.url().clone();
        let mut headers = response.headers().clone();
        let raw = response.bytes_stream().map_err(SacloudError::Transport);

        let decompressed = gzip && is_gzip_encoded(&headers);
        let body: BodyStream = if decompressed {
            // Both describe the encoded payload, not what the caller reads.
            headers.remove(CONTENT_ENCODING);
            headers.remove(CONTENT_LENGTH);
            Box::pin(gunzip(raw))
        } else {
            Box::pin(raw)
        };

        Self {
            status,
            version,
            headers,
            url,
            decompressed,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` when the body is being gzip-decoded on read.
    pub fn is_decompressed(&self) -> bool {
        self.decompressed
    }

    /// Reads the next chunk of the body, `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.body.next().await.transpose()
    }

    /// Reads the whole body.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Reads the whole body as UTF-8, replacing invalid sequences.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the whole body and deserializes it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            SacloudError::Decode(format!(
                "invalid response JSON: {err}; body: {}",
                String::from_utf8_lossy(&bytes)
            ))
        })
    }

    /// Converts the body into a stream of chunks.
    pub fn bytes_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        self.body
    }
}
