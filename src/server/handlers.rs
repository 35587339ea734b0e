use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::payload::{ZipPayload, content_disposition};
use super::{AppState, BODY_CHANNEL_CAPACITY};
use crate::error::RequestError;
use crate::io::{ArchiveSink, BodySink};
use crate::signature::{EXPIRES_HEADER, SIGNATURE_HEADER};
use crate::zip::ZipStreamer;

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match self {
            RequestError::Unauthorized(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub(super) async fn health() -> &'static str {
    "OK"
}

pub(super) async fn get_zip(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, RequestError> {
    let query = uri.query().unwrap_or_default();

    if state.policy.is_enforced() {
        state
            .validator
            .validate_from_query(uri.path(), query)
            .inspect_err(|e| warn!(reason = %e, "rejected GET signature"))?;
    }

    let payload = ZipPayload::from_query(query, &state.source)
        .await
        .inspect_err(|e| warn!(error = %e, "invalid GET request"))?;

    stream_zip(state, payload)
}

pub(super) async fn post_zip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RequestError> {
    if state.policy.is_enforced() {
        state
            .validator
            .validate_from_headers(
                header_str(&headers, SIGNATURE_HEADER),
                header_str(&headers, EXPIRES_HEADER),
                &body,
            )
            .inspect_err(|e| warn!(reason = %e, "rejected POST signature"))?;
    }

    let payload =
        ZipPayload::from_json(&body).inspect_err(|e| warn!(error = %e, "invalid POST body"))?;

    stream_zip(state, payload)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validate the payload and start streaming it. Everything that can be
/// rejected is rejected here, before the `200` is committed.
fn stream_zip(state: Arc<AppState>, payload: ZipPayload) -> Result<Response, RequestError> {
    let archive_name = payload.archive_name().to_string();
    info!(archive = %archive_name, files = payload.files.len(), "creating zip");

    let streamer = ZipStreamer::from_descriptors(&payload.files).inspect_err(
        |e| warn!(archive = %archive_name, error = %e, "error while parsing source files"),
    )?;

    let disposition = HeaderValue::from_bytes(content_disposition(&archive_name).as_bytes())
        .map_err(|_| RequestError::InvalidArchiveName)?;

    let (mut sink, body) = BodySink::channel(BODY_CHANNEL_CAPACITY);
    let source = Arc::clone(&state.source);

    tokio::spawn(async move {
        match streamer.stream_to(source.as_ref(), &mut sink).await {
            Ok(summary) => info!(
                archive = %archive_name,
                entries = summary.entries,
                bytes = summary.bytes_written,
                "done streaming zip"
            ),
            Err(e) => {
                error!(
                    archive = %archive_name,
                    path = e.path().unwrap_or_default(),
                    error = %e,
                    "streaming error, closing connection"
                );
                // Headers are already sent; dropping the connection is the
                // only way left to tell the client the archive is broken.
                sink.abort(&e.to_string()).await;
            }
        }
    });

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}
