//! Incremental relay of upstream media bytes to HTTP clients.
//!
//! The payload is forwarded chunk-by-chunk as it arrives from upstream and
//! is never materialized in memory. Response metadata (`Content-Type`,
//! `Content-Length`) is fixed before the first body byte is written.

use axum::body::Body;
use axum::http::{header, Response, StatusCode};

use crate::upstream::{FetchedMedia, OperationClient, UpstreamError};

/// Content type assumed when upstream does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Errors raised while relaying a result stream.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The result URI became unfetchable after being reported ready.
    #[error("relay fetch failed with status {status}: {body}")]
    Fetch { status: u16, body: String },

    #[error("relay fetch failed: {0}")]
    Upstream(#[source] UpstreamError),

    #[error("building relay response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Fetch `result_uri` through the operation client and build a streaming
/// response around it.
///
/// Once streaming has begun, a downstream write failure simply aborts the
/// transfer; there is no retry. Partial delivery is the receiving client's
/// to detect via content-length mismatch or connection close.
pub async fn relay(
    client: &OperationClient,
    result_uri: &str,
) -> Result<Response<Body>, RelayError> {
    let media = match client.fetch(result_uri).await {
        Ok(media) => media,
        Err(UpstreamError::Fetch { status, body }) => {
            return Err(RelayError::Fetch { status, body })
        }
        Err(err) => return Err(RelayError::Upstream(err)),
    };
    relay_response(media)
}

/// Wrap fetched media in a streaming HTTP response, mirroring its metadata.
pub fn relay_response(media: FetchedMedia) -> Result<Response<Body>, RelayError> {
    let content_type = media
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(length) = media.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    log::debug!(
        "relaying media: content-type={} content-length={:?}",
        content_type,
        media.content_length
    );

    let response = builder.body(Body::from_stream(media.body.bytes_stream()))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_content_type_is_mp4() {
        assert_eq!(DEFAULT_CONTENT_TYPE, "video/mp4");
    }

    #[test]
    fn test_relay_error_display_carries_status_and_body() {
        let err = RelayError::Fetch {
            status: 404,
            body: "gone".to_string(),
        };
        assert_eq!(err.to_string(), "relay fetch failed with status 404: gone");
    }
}
