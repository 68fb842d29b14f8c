//! Completed request/response pairs and their text rendering.

use std::fmt::Write;
use std::net::SocketAddr;
use std::time::SystemTime;
use axum::http::{HeaderMap, Request, Response, Version};
use bytes::Bytes;

use crate::net::ConnectionId;

/// One exchange that was written back to the client in full.
///
/// Only built after write-back succeeded; ownership moves to the sink.
#[derive(Debug)]
pub struct Transaction {
    connection_id: ConnectionId,
    peer: SocketAddr,
    completed_at: SystemTime,
    request: Request<Bytes>,
    response: Response<Bytes>,
}

impl Transaction {
    pub fn new(
        connection_id: ConnectionId,
        peer: SocketAddr,
        request: Request<Bytes>,
        response: Response<Bytes>,
    ) -> Self {
        Self {
            connection_id,
            peer,
            completed_at: SystemTime::now(),
            request,
            response,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn completed_at(&self) -> SystemTime {
        self.completed_at
    }

    /// The rewritten request as sent to the target.
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// The response as written back, after every transformer ran.
    pub fn response(&self) -> &Response<Bytes> {
        &self.response
    }
}

/// Render a request as HTTP/1.x text: request line, headers, optional body.
pub fn dump_request(request: &Request<Bytes>, include_body: bool) -> String {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {}\r\n",
        request.method(),
        target,
        version_str(request.version())
    );
    write_headers(&mut out, request.headers());
    out.push_str("\r\n");
    if include_body {
        out.push_str(&String::from_utf8_lossy(request.body()));
    }
    out
}

/// Render a response status line and headers, without the body.
pub fn dump_response_head(response: &Response<Bytes>) -> String {
    let status = response.status();
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {}\r\n",
        version_str(response.version()),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    write_headers(&mut out, response.headers());
    out.push_str("\r\n");
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
    }
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_dump_request() {
        let request = Request::builder()
            .method("POST")
            .uri("https://good.example/login?next=%2F")
            .header("host", "good.example")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"user=mark&pass=hunter2"))
            .unwrap();

        let dump = dump_request(&request, true);
        assert_eq!(
            dump,
            "POST /login?next=%2F HTTP/1.1\r\n\
             host: good.example\r\n\
             content-type: application/x-www-form-urlencoded\r\n\
             \r\n\
             user=mark&pass=hunter2"
        );

        let without_body = dump_request(&request, false);
        assert!(without_body.ends_with("\r\n\r\n"));
        assert!(!without_body.contains("hunter2"));
    }

    #[test]
    fn test_dump_response_head_omits_body() {
        let mut response = Response::new(Bytes::from_static(b"<html>secret</html>"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
            .headers_mut()
            .insert("content-type", HeaderValue::from_static("text/html"));

        let dump = dump_response_head(&response);
        assert_eq!(dump, "HTTP/1.1 404 Not Found\r\ncontent-type: text/html\r\n\r\n");
    }

    #[test]
    fn test_transaction_accessors() {
        let request = Request::new(Bytes::new());
        let response = Response::new(Bytes::new());
        let id = ConnectionId::new();
        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        let transaction = Transaction::new(id, peer, request, response);
        assert_eq!(transaction.connection_id(), id);
        assert_eq!(transaction.peer(), peer);
        assert!(transaction.completed_at() <= SystemTime::now());
    }
}
