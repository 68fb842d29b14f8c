//! Response preparation for write-back.
//!
//! # Responsibilities
//! - Turn the (possibly transformed) upstream response into the client reply
//! - Strip hop-by-hop headers that described the upstream connection
//! - Make Content-Length match the body actually sent
//!
//! # Design Decisions
//! - The body has already been decoded by the upstream client, so the
//!   client sees an identity-encoded body
//! - HEAD replies keep the upstream's Content-Length

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderValue, Response, StatusCode, Version};
use bytes::Bytes;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the reply written to the client from the final upstream response.
pub fn prepare_for_client(response: &Response<Bytes>, head_request: bool) -> Response<Body> {
    let mut headers = response.headers().clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }

    let status = response.status();
    if !head_request && carries_body(status) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(response.body().len()));
    }

    let mut reply = Response::new(Body::from(response.body().clone()));
    *reply.status_mut() = status;
    *reply.version_mut() = Version::HTTP_11;
    *reply.headers_mut() = headers;
    reply
}

fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}
