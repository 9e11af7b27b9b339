use reqwest::StatusCode;

use crate::{CancelSignal, Cancelled};

/// Result of a single attempt, as seen by a [`RetryPolicy`].
#[derive(Debug)]
pub enum Outcome<'a> {
    /// The transport produced a response.
    Response(&'a reqwest::Response),
    /// The transport failed before any response was obtained.
    Error(&'a reqwest::Error),
}

/// What to do after an attempt.
#[derive(Debug, Eq, PartialEq)]
pub enum RetryDecision {
    /// Send the request again, subject to the retry bound.
    Retry,
    /// Stop and return the attempt's result, or the carried error instead.
    Stop(Option<Cancelled>),
}

/// Decides whether a finished attempt should be followed by another one.
pub trait RetryPolicy: Send + Sync {
    fn decide(&self, outcome: Outcome<'_>, signal: &CancelSignal) -> RetryDecision;
}

impl<F> RetryPolicy for F
where
    F: Fn(Outcome<'_>, &CancelSignal) -> RetryDecision + Send + Sync,
{
    fn decide(&self, outcome: Outcome<'_>, signal: &CancelSignal) -> RetryDecision {
        self(outcome, signal)
    }
}

/// Default policy for the Sakura Cloud API.
///
/// Cancellation stops everything. Transport errors go through a replaceable
/// heuristic. Responses are retried on 423 (Locked) and 503 (Service
/// Unavailable) only. A reply without a status line never becomes a
/// [`reqwest::Response`]; it reaches the policy as a transport error.
#[derive(Clone, Copy, Debug)]
pub struct StandardRetryPolicy {
    transport_heuristic: fn(&reqwest::Error) -> bool,
}

impl Default for StandardRetryPolicy {
    fn default() -> Self {
        Self {
            transport_heuristic: is_transient_transport_error,
        }
    }
}

impl StandardRetryPolicy {
    /// Replaces the heuristic applied to transport errors.
    pub fn with_transport_heuristic(mut self, heuristic: fn(&reqwest::Error) -> bool) -> Self {
        self.transport_heuristic = heuristic;
        self
    }
}

impl RetryPolicy for StandardRetryPolicy {
    fn decide(&self, outcome: Outcome<'_>, signal: &CancelSignal) -> RetryDecision {
        if let Some(reason) = signal.check() {
            return RetryDecision::Stop(Some(reason));
        }
        let retry = match outcome {
            Outcome::Error(err) => (self.transport_heuristic)(err),
            Outcome::Response(response) => is_retryable_status(response.status()),
        };
        if retry {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop(None)
        }
    }
}

/// Status codes the Sakura Cloud API uses for "try again later".
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::LOCKED
}

/// Generic connectivity heuristic for errors that produced no response.
///
/// Request construction failures, redirect loops and body decoding errors
/// are permanent; everything else (connect, timeout, broken body upload) is
/// treated as transient.
pub fn is_transient_transport_error(err: &reqwest::Error) -> bool {
    !(err.is_builder() || err.is_redirect() || err.is_decode())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{is_retryable_status, RetryDecision, RetryPolicy, StandardRetryPolicy};
    use crate::{CancelSignal, Cancelled};

    fn response(status: u16) -> reqwest::Response {
        reqwest::Response::from(
            http::Response::builder()
                .status(status)
                .body(Vec::<u8>::new())
                .expect("valid response"),
        )
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::LOCKED));
        assert!(!is_retryable_status(StatusCode::OK));
        assert!(!is_retryable_status(StatusCode::MOVED_PERMANENTLY));
        assert!(!is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn retries_503_and_423() {
        let policy = StandardRetryPolicy::default();
        let signal = CancelSignal::new();
        for status in [503, 423] {
            let resp = response(status);
            assert_eq!(
                policy.decide(super::Outcome::Response(&resp), &signal),
                RetryDecision::Retry
            );
        }
    }

    #[test]
    fn stops_without_error_on_other_statuses() {
        let policy = StandardRetryPolicy::default();
        let signal = CancelSignal::new();
        for status in [200, 301, 404, 500] {
            let resp = response(status);
            assert_eq!(
                policy.decide(super::Outcome::Response(&resp), &signal),
                RetryDecision::Stop(None)
            );
        }
    }

    #[test]
    fn cancellation_wins_over_retryable_status() {
        let policy = StandardRetryPolicy::default();
        let signal = CancelSignal::new();
        signal.cancel();
        let resp = response(503);
        assert_eq!(
            policy.decide(super::Outcome::Response(&resp), &signal),
            RetryDecision::Stop(Some(Cancelled::Canceled))
        );
    }

    #[test]
    fn closures_are_policies() {
        let never = |_: super::Outcome<'_>, _: &CancelSignal| RetryDecision::Stop(None);
        let resp = response(503);
        assert_eq!(
            never.decide(super::Outcome::Response(&resp), &CancelSignal::new()),
            RetryDecision::Stop(None)
        );
    }

    #[tokio::test]
    async fn connect_errors_are_transient_unless_heuristic_replaced() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .expect_err("nothing listens on port 1");
        let signal = CancelSignal::new();

        assert_eq!(
            StandardRetryPolicy::default().decide(super::Outcome::Error(&err), &signal),
            RetryDecision::Retry
        );

        let strict = StandardRetryPolicy::default().with_transport_heuristic(|_| false);
        assert_eq!(
            strict.decide(super::Outcome::Error(&err), &signal),
            RetryDecision::Stop(None)
        );
    }
}
