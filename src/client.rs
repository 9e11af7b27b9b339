use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{
    auth::authenticate,
    backoff::backoff_wait,
    body::ReplayBody,
    options::ResolvedOptions,
    transport::default_transport,
    BoxError, CancelSignal, ClientOptions, Defaults, Outcome, Response, Result, RetryDecision,
    RetryPolicy, SacloudError, StandardRetryPolicy, Transport,
};

/// Environment variable holding the API access token.
pub const ACCESS_TOKEN_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN";
/// Environment variable holding the API access token secret.
pub const ACCESS_TOKEN_SECRET_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN_SECRET";

/// Hook that may rewrite a request before it is authenticated and sent.
pub type RequestCustomizer =
    dyn Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync;

type AttemptResult = std::result::Result<reqwest::Response, reqwest::Error>;

#[derive(Clone)]
/// HTTP client for the Sakura Cloud API.
///
/// Every call authenticates the request, retries it on transient failures
/// with exponential backoff and transparently decodes gzip responses when
/// enabled. The client is cheap to clone and safe to share between tasks.
pub struct SacloudClient {
    access_token: String,
    access_token_secret: String,
    options: ClientOptions,
    defaults: &'static Defaults,
    transport: Arc<dyn Transport>,
    retry_policy: Arc<dyn RetryPolicy>,
    customizer: Option<Arc<RequestCustomizer>>,
    resolved: Arc<OnceLock<ResolvedOptions>>,
}

impl fmt::Debug for SacloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SacloudClient")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("options", &self.options)
            .field("customizer", &self.customizer.is_some())
            .finish()
    }
}

impl SacloudClient {
    /// Creates a client from an access token and its secret.
    pub fn new(access_token: impl Into<String>, access_token_secret: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
            options: ClientOptions::default(),
            defaults: Defaults::global(),
            transport: Arc::new(default_transport()),
            retry_policy: Arc::new(StandardRetryPolicy::default()),
            customizer: None,
            resolved: Arc::new(OnceLock::new()),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `SAKURACLOUD_ACCESS_TOKEN`
    /// - `SAKURACLOUD_ACCESS_TOKEN_SECRET`
    ///
    /// Returns [`SacloudError::Config`] if either variable is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sacloud_http::SacloudClient;
    ///
    /// let client = SacloudClient::from_env().expect("missing SAKURACLOUD_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        let token = required_env(ACCESS_TOKEN_ENV)?;
        let secret = required_env(ACCESS_TOKEN_SECRET_ENV)?;
        Ok(Self::new(token, secret))
    }

    /// Applies user agent, gzip and retry options.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self.resolved = Arc::new(OnceLock::new());
        self
    }

    /// Uses `defaults` instead of [`Defaults::global`] for unset options.
    pub fn with_defaults(mut self, defaults: &'static Defaults) -> Self {
        self.defaults = defaults;
        self.resolved = Arc::new(OnceLock::new());
        self
    }

    /// Replaces the transport that performs each attempt.
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Arc::new(transport);
        self
    }

    /// Replaces the retry decision.
    pub fn with_retry_policy<P>(mut self, policy: P) -> Self
    where
        P: RetryPolicy + 'static,
    {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Installs a hook run on every request before authentication.
    ///
    /// An error from the hook fails the call before anything is sent.
    pub fn with_request_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.customizer = Some(Arc::new(customizer));
        self
    }

    /// Sends `request` with no cancellation signal.
    pub async fn execute(&self, request: reqwest::Request) -> Result<Response> {
        self.execute_with_signal(request, &CancelSignal::new()).await
    }

    /// Sends `request`, retrying as configured, until `signal` fires.
    ///
    /// When retries run out, the last attempt's response or transport error
    /// is returned as is.
    pub async fn execute_with_signal(
        &self,
        mut request: reqwest::Request,
        signal: &CancelSignal,
    ) -> Result<Response> {
        let options = self.resolved_options();

        if let Some(customizer) = &self.customizer {
            customizer(&mut request).map_err(SacloudError::Customize)?;
        }
        let body = ReplayBody::capture(&mut request).await?;
        authenticate(
            request.headers_mut(),
            &self.access_token,
            &self.access_token_secret,
            options,
            !body.is_empty(),
        )?;

        let mut retries = 0usize;
        loop {
            let outcome = self.send_attempt(&request, &body, signal).await?;
            let decision = match &outcome {
                Ok(response) => self.retry_policy.decide(Outcome::Response(response), signal),
                Err(err) => self.retry_policy.decide(Outcome::Error(err), signal),
            };

            match decision {
                RetryDecision::Stop(Some(reason)) => return Err(reason.into()),
                RetryDecision::Stop(None) => return finish(outcome, options.gzip),
                RetryDecision::Retry if retries >= options.max_retries => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("giving up on {} after {} attempts", request.url(), retries + 1);
                    return finish(outcome, options.gzip);
                }
                RetryDecision::Retry => {
                    retries += 1;
                    let wait = backoff_wait(retries, options.retry_wait_min, options.retry_wait_max);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "retrying {} {} after {:?} (retry {}/{})",
                        request.method(),
                        request.url(),
                        wait,
                        retries,
                        options.max_retries
                    );

                    // Release the connection before sleeping.
                    drop(outcome);
                    signal.sleep(wait).await?;
                }
            }
        }
    }

    fn resolved_options(&self) -> &ResolvedOptions {
        self.resolved
            .get_or_init(|| ResolvedOptions::resolve(&self.options, self.defaults))
    }

    /// Sends one copy of the prepared request.
    ///
    /// The send is polled before the signal, so it always starts; if the
    /// signal fires while it is in flight the attempt is abandoned.
    async fn send_attempt(
        &self,
        template: &reqwest::Request,
        body: &ReplayBody,
        signal: &CancelSignal,
    ) -> Result<AttemptResult> {
        let request = build_attempt(template, body);
        tokio::select! {
            biased;
            outcome = self.transport.send(request) => Ok(outcome),
            reason = signal.fired() => Err(reason.into()),
        }
    }
}

fn build_attempt(template: &reqwest::Request, body: &ReplayBody) -> reqwest::Request {
    let mut request = reqwest::Request::new(template.method().clone(), template.url().clone());
    *request.headers_mut() = template.headers().clone();
    *request.version_mut() = template.version();
    *request.timeout_mut() = template.timeout().copied();
    *request.body_mut() = body.replay();
    request
}

fn finish(outcome: AttemptResult, gzip: bool) -> Result<Response> {
    outcome
        .map(|response| Response::new(response, gzip))
        .map_err(SacloudError::Transport)
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(SacloudError::Config(format!(
            "environment variable {name:?} is required"
        ))),
    }
}
