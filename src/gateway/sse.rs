//! `GET /stream`: resolve a tool request and relay the executor's output as
//! server-sent events.
//!
//! Every frame goes out on the default (unnamed) event channel so a browser
//! `EventSource.onmessage` handler sees all of it. Each executor output line
//! becomes one `data:` frame, and every stream ends with exactly one
//! `data: DONE` or `data: ERROR [<kind>]: <message>` frame.

use super::AppState;
use crate::dispatch::{self, DispatchError, ToolRequest};
use crate::executor::{Frame, FrameStream};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

/// Tells nginx-style proxies not to buffer the event stream.
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub tool: Option<String>,
    pub target: Option<String>,
    pub scan: Option<String>,
}

/// GET /stream?tool=<id>&target=<t>[&scan=<s>]
pub async fn handle_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let Some(tool) = query.tool.filter(|tool| !tool.trim().is_empty()) else {
        return bad_request("missing_parameter", "missing required query parameter 'tool'");
    };
    let Some(target) = query.target else {
        return bad_request("missing_parameter", "missing required query parameter 'target'");
    };
    let request = ToolRequest {
        tool,
        target,
        scan: query.scan.filter(|scan| !scan.is_empty()),
    };

    let snapshot = state.catalog.snapshot();
    let resolved = match dispatch::resolve(&snapshot, &request) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::warn!(
                tool = %request.tool,
                kind = err.kind(),
                "Rejected tool request: {err}"
            );
            return rejection(&err);
        }
    };

    tracing::info!(
        tool = resolved.tool_id(),
        transport = resolved.transport(),
        scan = request.scan.as_deref().unwrap_or("-"),
        "Dispatching tool"
    );
    let (endpoint, payload) = dispatch::build(resolved);
    event_stream(state.forwarder.forward(endpoint, payload))
}

/// Wrap a session's frames in an SSE response. Dropping the body (client
/// disconnect) drops the frames and cancels the session.
pub fn event_stream(frames: FrameStream) -> Response {
    let body = frames.map(|frame| Ok::<_, Infallible>(encode_frame(&frame)));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Success frame payload, matched by clients to close the stream.
pub const DONE_PAYLOAD: &str = "DONE";

/// Encode one frame in SSE wire format.
pub fn encode_frame(frame: &Frame) -> String {
    match frame {
        Frame::Output(text) => data_event(text),
        Frame::Done => data_event(DONE_PAYLOAD),
        Frame::Error(err) => data_event(&format!("ERROR [{}]: {err}", err.kind())),
    }
}

/// One event on the default channel. A bare CR also ends an SSE line, so
/// both CR and LF split the text into separate `data:` fields.
fn data_event(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split(['\r', '\n']).filter(|line| !line.is_empty()) {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

fn rejection(err: &DispatchError) -> Response {
    bad_request(err.kind(), &err.to_string())
}

fn bad_request(kind: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message, "kind": kind })),
    )
        .into_response()
}
