use std::{io::Write, pin::Pin};

use bytes::Bytes;
use flate2::write::GzDecoder;
use futures_util::{stream, Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_ENCODING};

use crate::{Result, SacloudError};

pub(crate) fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"))
}

struct Gunzip<S> {
    upstream: Pin<Box<S>>,
    decoder: Option<GzDecoder<Vec<u8>>>,
}

/// Decodes a gzip body chunk by chunk as the caller reads it.
///
/// Malformed input is reported as [`SacloudError::Decode`] from the read that
/// hits it; upstream errors pass through unchanged.
pub(crate) fn gunzip<S>(upstream: S) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let state = Gunzip {
        upstream: Box::pin(upstream),
        decoder: Some(GzDecoder::new(Vec::new())),
    };

    stream::try_unfold(state, |mut state| async move {
        while let Some(mut decoder) = state.decoder.take() {
            match state.upstream.next().await {
                Some(chunk) => {
                    decoder.write_all(&chunk?).map_err(decode_error)?;
                    let decoded = std::mem::take(decoder.get_mut());
                    state.decoder = Some(decoder);
                    if !decoded.is_empty() {
                        return Ok(Some((Bytes::from(decoded), state)));
                    }
                }
                None => {
                    // Validates the trailer; a truncated stream fails here.
                    let decoded = decoder.finish().map_err(decode_error)?;
                    if !decoded.is_empty() {
                        return Ok(Some((Bytes::from(decoded), state)));
                    }
                }
            }
        }
        Ok::<_, SacloudError>(None)
    })
}

fn decode_error(err: std::io::Error) -> SacloudError {
    SacloudError::Decode(format!("invalid gzip body: {err}"))
}
