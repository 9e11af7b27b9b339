use std::sync::OnceLock;
use std::time::Duration;

/// Per-client tunables.
///
/// Fields left as `None` are filled from [`Defaults`] on the client's first
/// request and are fixed from then on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClientOptions {
    /// `User-Agent` sent when the request does not set one.
    pub user_agent: Option<String>,
    /// `Accept-Language` sent when non-empty and the request does not set one.
    pub accept_language: Option<String>,
    /// Request gzip responses and decode them transparently.
    pub gzip: bool,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: Option<usize>,
    /// Wait before the first retry; doubled for every further retry.
    pub retry_wait_min: Option<Duration>,
    /// Upper bound for a single backoff wait.
    pub retry_wait_max: Option<Duration>,
}

/// Process-wide fallback values for [`ClientOptions`].
///
/// Built once and never mutated; clients hold it by `Arc`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Defaults {
    pub user_agent: String,
    pub accept_language: String,
    pub max_retries: usize,
    pub retry_wait_min: Duration,
    pub retry_wait_max: Duration,
}

impl Defaults {
    /// Returns the shared process-wide defaults.
    pub fn global() -> &'static Defaults {
        static GLOBAL: OnceLock<Defaults> = OnceLock::new();
        GLOBAL.get_or_init(Defaults::default)
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: String::new(),
            max_retries: 10,
            retry_wait_min: Duration::from_secs(1),
            retry_wait_max: Duration::from_secs(64),
        }
    }
}

/// Default `User-Agent`, e.g. `sacloud-http/v0.1.0 (linux/x86_64; +https://github.com/sacloud/go-http)`.
pub fn default_user_agent() -> String {
    format!(
        "sacloud-http/v{} ({}/{}; +https://github.com/sacloud/go-http)",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

/// [`ClientOptions`] with every field resolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ResolvedOptions {
    pub user_agent: String,
    pub accept_language: String,
    pub gzip: bool,
    pub max_retries: usize,
    pub retry_wait_min: Duration,
    pub retry_wait_max: Duration,
}

impl ResolvedOptions {
    pub(crate) fn resolve(options: &ClientOptions, defaults: &Defaults) -> Self {
        let user_agent = options
            .user_agent
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| defaults.user_agent.clone());
        let accept_language = options
            .accept_language
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| defaults.accept_language.clone());
        let retry_wait_min = options.retry_wait_min.unwrap_or(defaults.retry_wait_min);
        let retry_wait_max = options
            .retry_wait_max
            .unwrap_or(defaults.retry_wait_max)
            .max(retry_wait_min);

        Self {
            user_agent,
            accept_language,
            gzip: options.gzip,
            max_retries: options.max_retries.unwrap_or(defaults.max_retries),
            retry_wait_min,
            retry_wait_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientOptions, Defaults, ResolvedOptions};

    #[test]
    fn unset_fields_take_defaults() {
        let defaults = Defaults::default();
        let resolved = ResolvedOptions::resolve(&ClientOptions::default(), &defaults);

        assert_eq!(resolved.user_agent, defaults.user_agent);
        assert_eq!(resolved.accept_language, "");
        assert!(!resolved.gzip);
        assert_eq!(resolved.max_retries, 10);
        assert_eq!(resolved.retry_wait_min, Duration::from_secs(1));
        assert_eq!(resolved.retry_wait_max, Duration::from_secs(64));
    }

    #[test]
    fn explicit_zero_retries_is_kept() {
        let options = ClientOptions {
            max_retries: Some(0),
            ..ClientOptions::default()
        };
        let resolved = ResolvedOptions::resolve(&options, &Defaults::default());
        assert_eq!(resolved.max_retries, 0);
    }

    #[test]
    fn max_wait_is_raised_to_min_wait() {
        let options = ClientOptions {
            retry_wait_min: Some(Duration::from_secs(5)),
            retry_wait_max: Some(Duration::from_secs(2)),
            ..ClientOptions::default()
        };
        let resolved = ResolvedOptions::resolve(&options, &Defaults::default());
        assert_eq!(resolved.retry_wait_max, Duration::from_secs(5));
    }

    #[test]
    fn default_user_agent_names_crate_and_platform() {
        let agent = Defaults::global().user_agent.clone();
        assert!(agent.starts_with("sacloud-http/v"));
        assert!(agent.contains(std::env::consts::OS));
    }
}
