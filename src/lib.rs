//! `sacloud-http` is a retrying, authenticated HTTP client layer for the
//! Sakura Cloud API.
//!
//! [`SacloudClient::execute`] takes a caller-built [`reqwest::Request`] and:
//! - runs an optional request customizer, then adds Basic credentials and
//!   the API's default headers
//! - sends it through a pluggable [`Transport`], retrying under a
//!   [`RetryPolicy`] with exponential backoff
//! - stops immediately when the [`CancelSignal`] fires
//! - returns a [`Response`] whose body is gzip-decoded on read when enabled
//!
//! [`TracingTransport`] wraps any transport to dump each attempt.

mod auth;
mod backoff;
mod body;
mod cancel;
mod client;
mod error;
mod gzip;
mod options;
mod response;
mod retry;
mod trace;
mod transport;

pub use backoff::backoff_wait;
pub use cancel::{CancelSignal, Cancelled};
pub use client::{RequestCustomizer, SacloudClient, ACCESS_TOKEN_ENV, ACCESS_TOKEN_SECRET_ENV};
pub use error::{BoxError, SacloudError};
pub use options::{default_user_agent, ClientOptions, Defaults};
pub use response::Response;
pub use retry::{
    is_retryable_status, is_transient_transport_error, Outcome, RetryDecision, RetryPolicy,
    StandardRetryPolicy,
};
#[cfg(feature = "tracing")]
pub use trace::TracingSink;
pub use trace::{StderrSink, TraceSink, TracingTransport};
pub use transport::{default_transport, Transport};

pub type Result<T> = std::result::Result<T, SacloudError>;
