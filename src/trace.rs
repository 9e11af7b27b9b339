use std::{
    fmt::Write as _,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream;
use http_body_util::BodyExt;
use reqwest::{header::HeaderMap, ResponseBuilderExt, StatusCode};

use crate::{gzip::is_gzip_encoded, Transport};

/// Destination for trace dumps.
pub trait TraceSink: Send + Sync {
    fn write_trace(&self, message: &str);
}

/// Writes trace dumps to standard error.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl TraceSink for StderrSink {
    fn write_trace(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Emits trace dumps as `tracing` events at info level.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl TraceSink for TracingSink {
    fn write_trace(&self, message: &str) {
        tracing::info!(target: "sacloud_http::trace", "{message}");
    }
}

impl<W> TraceSink for Mutex<W>
where
    W: Write + Send,
{
    fn write_trace(&self, message: &str) {
        let mut writer = self.lock().unwrap_or_else(PoisonError::into_inner);
        // Tracing is best effort; a failing sink must not fail the request.
        let _ = writeln!(writer, "{message}");
    }
}

/// Transport decorator that dumps each attempt's request and response.
///
/// The request is observed before it is handed to the inner transport. The
/// response body is read in full and put back, so callers still see the
/// complete, unmodified body.
#[derive(Clone)]
pub struct TracingTransport<T> {
    inner: T,
    output_only_error: bool,
    sink: Arc<dyn TraceSink>,
}

impl<T> TracingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            output_only_error: false,
            sink: default_sink(),
        }
    }

    /// Only dump attempts that failed: transport errors and statuses outside
    /// 2xx/3xx.
    pub fn output_only_error(mut self, enabled: bool) -> Self {
        self.output_only_error = enabled;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[cfg(feature = "tracing")]
fn default_sink() -> Arc<dyn TraceSink> {
    Arc::new(TracingSink)
}

#[cfg(not(feature = "tracing"))]
fn default_sink() -> Arc<dyn TraceSink> {
    Arc::new(StderrSink)
}

#[async_trait]
impl<T> Transport for TracingTransport<T>
where
    T: Transport,
{
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        let request_dump = dump_request(&request);

        let response = match self.inner.send(request).await {
            Ok(response) => response,
            Err(err) => {
                self.sink.write_trace(&format!(
                    "[TRACE] request:\n{request_dump}\n[TRACE] error: {err}"
                ));
                return Err(err);
            }
        };

        if self.output_only_error && !is_error_status(response.status()) {
            return Ok(response);
        }

        let (response_dump, response) = tee_response(response).await;
        self.sink.write_trace(&format!(
            "[TRACE] request:\n{request_dump}\n[TRACE] response:\n{response_dump}"
        ));
        Ok(response)
    }
}

fn is_error_status(status: StatusCode) -> bool {
    !(status.is_success() || status.is_redirection())
}

fn dump_request(request: &reqwest::Request) -> String {
    let url = request.url();
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut dump = format!("{} {} {:?}\r\n", request.method(), target, request.version());
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => {
                let _ = write!(dump, "Host: {host}:{port}\r\n");
            }
            None => {
                let _ = write!(dump, "Host: {host}\r\n");
            }
        }
    }
    write_headers(&mut dump, request.headers());
    if let Some(body) = request.body() {
        match body.as_bytes() {
            Some(bytes) => write_body(&mut dump, request.headers(), bytes),
            None => dump.push_str("\r\n<streaming body>"),
        }
    }
    dump
}

/// Reads the body, renders the dump and rebuilds an equivalent response.
///
/// The rebuilt response keeps the status, version, headers and url. If the
/// body fails midway, the rebuilt body yields the bytes read so far and then
/// the same failure, so the attempt still ends as a response.
async fn tee_response(response: reqwest::Response) -> (String, reqwest::Response) {
    let url = response.url().clone();
    let (mut parts, mut body) = http::Response::<reqwest::Body>::from(response).into_parts();

    let mut buf = BytesMut::new();
    let mut read_error = None;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    buf.extend_from_slice(&data);
                }
            }
            Err(err) => {
                read_error = Some(err);
                break;
            }
        }
    }
    let bytes = buf.freeze();

    let mut dump = format!("{:?} {}\r\n", parts.version, parts.status);
    write_headers(&mut dump, &parts.headers);
    write_body(&mut dump, &parts.headers, &bytes);

    let body = match read_error {
        None => reqwest::Body::from(bytes),
        Some(err) => {
            let _ = write!(dump, "\r\n<body read error: {err}>");
            let chunks: Vec<Result<Bytes, io::Error>> =
                vec![Ok(bytes), Err(io::Error::new(io::ErrorKind::Other, err))];
            reqwest::Body::wrap_stream(stream::iter(chunks))
        }
    };

    // The url lives in a reqwest-private extension that only its builder sets.
    if let Ok(carrier) = http::Response::builder().url(url).body(()) {
        parts.extensions.extend(carrier.into_parts().0.extensions);
    }

    (dump, reqwest::Response::from(http::Response::from_parts(parts, body)))
}

fn write_headers(dump: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if value.is_sensitive() {
            "<redacted>"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        let _ = write!(dump, "{name}: {value}\r\n");
    }
}

fn write_body(dump: &mut String, headers: &HeaderMap, body: &[u8]) {
    if body.is_empty() {
        return;
    }
    dump.push_str("\r\n");
    if is_gzip_encoded(headers) {
        let _ = write!(dump, "<{} bytes gzip-encoded>", body.len());
    } else {
        dump.push_str(&String::from_utf8_lossy(body));
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header, Method, StatusCode};

    use super::{dump_request, is_error_status};

    #[test]
    fn error_status_classes() {
        assert!(!is_error_status(StatusCode::OK));
        assert!(!is_error_status(StatusCode::FOUND));
        assert!(is_error_status(StatusCode::NOT_FOUND));
        assert!(is_error_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn request_dump_has_start_line_host_headers_and_body() {
        let mut request = reqwest::Request::new(
            Method::POST,
            "http://127.0.0.1:8080/cloud/1.1/server?From=0"
                .parse()
                .expect("valid url"),
        );
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().expect("value"));
        let mut auth: header::HeaderValue = "Basic c2VjcmV0".parse().expect("value");
        auth.set_sensitive(true);
        request.headers_mut().insert(header::AUTHORIZATION, auth);
        *request.body_mut() = Some(reqwest::Body::from(r#"{"Server":{}}"#));

        let dump = dump_request(&request);

        assert!(dump.starts_with("POST /cloud/1.1/server?From=0 HTTP/1.1\r\n"));
        assert!(dump.contains("Host: 127.0.0.1:8080\r\n"));
        assert!(dump.contains("content-type: application/json\r\n"));
        assert!(dump.contains("authorization: <redacted>\r\n"));
        assert!(!dump.contains("c2VjcmV0"));
        assert!(dump.ends_with(r#"{"Server":{}}"#));
    }
}
