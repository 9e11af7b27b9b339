use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::{options::ResolvedOptions, Result, SacloudError};

pub(crate) const X_REQUESTED_WITH: &str = "x-requested-with";
pub(crate) const X_SAKURA_BIGINT_AS_INT: &str = "x-sakura-bigint-as-int";

/// Adds Basic credentials and the API's default headers to `headers`.
///
/// Authorization is always replaced. Every other header is only added when
/// the caller has not set it, so running this twice changes nothing.
pub(crate) fn authenticate(
    headers: &mut HeaderMap,
    access_token: &str,
    access_token_secret: &str,
    options: &ResolvedOptions,
    has_body: bool,
) -> Result<()> {
    headers.insert(
        header::AUTHORIZATION,
        basic_authorization(access_token, access_token_secret)?,
    );

    if has_body {
        set_default(
            headers,
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    if options.gzip {
        set_default(
            headers,
            header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip"),
        );
    }
    set_default(
        headers,
        HeaderName::from_static(X_REQUESTED_WITH),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    // Resource IDs exceed 2^53; ask for them as JSON integers.
    set_default(
        headers,
        HeaderName::from_static(X_SAKURA_BIGINT_AS_INT),
        HeaderValue::from_static("1"),
    );
    set_default(
        headers,
        header::USER_AGENT,
        header_value("User-Agent", &options.user_agent)?,
    );
    if !options.accept_language.is_empty() {
        set_default(
            headers,
            header::ACCEPT_LANGUAGE,
            header_value("Accept-Language", &options.accept_language)?,
        );
    }
    Ok(())
}

fn basic_authorization(user: &str, password: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!("{user}:{password}"));
    let mut value = header_value("Authorization", &format!("Basic {encoded}"))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| SacloudError::Config(format!("invalid {name} header value: {value:?}")))
}

fn set_default(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}
