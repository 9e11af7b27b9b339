use std::sync::Arc;

use async_trait::async_trait;

/// Performs one physical request/response exchange.
///
/// Implementations must be safe to share between concurrent exchanges.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        self.execute(request).await
    }
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        (**self).send(request).await
    }
}

/// Transport used when the caller does not inject one.
///
/// Built without transparent decompression, so `Content-Encoding: gzip`
/// responses reach this crate's own adapter untouched.
pub fn default_transport() -> reqwest::Client {
    reqwest::Client::new()
}
