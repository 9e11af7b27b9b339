use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason a [`CancelSignal`] fired.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Cancelled {
    /// The signal was cancelled explicitly.
    #[error("request canceled")]
    Canceled,
    /// The signal's deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Caller-supplied cancellation signal carrying an explicit-cancel token and
/// an optional deadline.
///
/// Clones share the same token, so cancelling any clone cancels all of them.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// Creates a signal that only fires when [`CancelSignal::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token, so cancellation can be driven from elsewhere.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy of this signal that also fires at `deadline`.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Returns a copy of this signal that also fires after `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels the signal and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the signal has fired, or `None` while it is still live.
    ///
    /// Explicit cancellation wins over an expired deadline.
    pub fn check(&self) -> Option<Cancelled> {
        if self.token.is_cancelled() {
            return Some(Cancelled::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the signal fires.
    pub async fn fired(&self) -> Cancelled {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Cancelled::Canceled,
                    _ = tokio::time::sleep_until(deadline) => Cancelled::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Cancelled::Canceled
            }
        }
    }

    /// Sleeps for `duration`, returning early with the reason if the signal
    /// fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if let Some(reason) = self.check() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.fired() => Err(reason),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{CancelSignal, Cancelled};

    #[tokio::test]
    async fn fresh_signal_is_live() {
        let signal = CancelSignal::new();
        assert_eq!(signal.check(), None);
    }

    #[tokio::test]
    async fn cancel_propagates_to_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        signal.cancel();
        assert_eq!(clone.check(), Some(Cancelled::Canceled));
    }

    #[tokio::test]
    async fn expired_deadline_reports_deadline_exceeded() {
        let signal = CancelSignal::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(signal.check(), Some(Cancelled::DeadlineExceeded));
    }

    #[tokio::test]
    async fn explicit_cancel_takes_precedence_over_deadline() {
        let signal = CancelSignal::new().with_deadline(Instant::now() - Duration::from_millis(1));
        signal.cancel();
        assert_eq!(signal.check(), Some(Cancelled::Canceled));
    }

    #[tokio::test]
    async fn with_deadline_keeps_the_earlier_one() {
        let early = Instant::now() + Duration::from_millis(10);
        let late = early + Duration::from_secs(10);
        let signal = CancelSignal::new().with_deadline(early).with_deadline(late);
        assert_eq!(signal.deadline(), Some(early));
    }

    #[tokio::test]
    async fn sleep_aborts_when_cancelled_mid_wait() {
        let signal = CancelSignal::new();
        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = signal.sleep(Duration::from_secs(30)).await;

        assert_eq!(result, Err(Cancelled::Canceled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn sleep_stops_at_deadline() {
        let signal = CancelSignal::new().with_timeout(Duration::from_millis(20));
        let result = signal.sleep(Duration::from_secs(30)).await;
        assert_eq!(result, Err(Cancelled::DeadlineExceeded));
    }

    #[tokio::test]
    async fn sleep_completes_when_live() {
        let signal = CancelSignal::new();
        assert_eq!(signal.sleep(Duration::from_millis(1)).await, Ok(()));
    }
}
