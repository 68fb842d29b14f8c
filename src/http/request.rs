//! Request rewriting.
//!
//! # Responsibilities
//! - Re-address the inbound request to the target origin
//! - Copy headers, one value per name
//! - Keep the listening host out of the Referer
//! - Drop Accept-Encoding so the upstream client negotiates compression itself
//!
//! # Design Decisions
//! - Path and query are preserved byte for byte
//! - Framing headers (Host, Content-Length, Transfer-Encoding) are not copied;
//!   Host names the target and the client recomputes framing
//! - When a header repeats, the first value wins

use std::str::FromStr;
use axum::http::header::{
    InvalidHeaderValue, ACCEPT_ENCODING, CONTENT_LENGTH, HOST, REFERER, TRANSFER_ENCODING,
};
use axum::http::request::Parts;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Uri};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

/// Errors building the outbound request.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid target origin {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("failed to compose outbound request: {0}")]
    Compose(#[from] axum::http::Error),

    #[error("invalid rewritten header value: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),
}

/// Scheme and authority every request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOrigin {
    scheme: Scheme,
    authority: Authority,
}

impl TargetOrigin {
    /// Parse an absolute `http`/`https` URL. Path and query are ignored.
    pub fn parse(raw: &str) -> Result<Self, RewriteError> {
        let invalid = |reason: String| RewriteError::InvalidTarget {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        };
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(e.to_string()))?;

        Ok(Self { scheme, authority })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl std::fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Produce the outbound request for `inbound`, addressed to `origin`.
pub fn rewrite_request(
    inbound: Request<Bytes>,
    origin: &TargetOrigin,
) -> Result<Request<Bytes>, RewriteError> {
    let (parts, body) = inbound.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    let uri = Uri::builder()
        .scheme(origin.scheme.clone())
        .authority(origin.authority.clone())
        .path_and_query(path_and_query)
        .build()?;

    let mut headers = HeaderMap::with_capacity(parts.headers.keys_len() + 1);
    for name in parts.headers.keys() {
        if is_framing(name) {
            continue;
        }
        if let Some(value) = parts.headers.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers.insert(HOST, HeaderValue::from_str(origin.authority.as_str())?);

    // Don't let a stray referer give away the location of the listener.
    // Full URLs elsewhere in the request can still leak it.
    if let Some(referer) = rewrite_referer(&parts, origin) {
        headers.insert(REFERER, HeaderValue::from_str(&referer)?);
    }

    // The upstream client only decodes what it asked for itself.
    headers.remove(ACCEPT_ENCODING);

    let mut request = Request::builder()
        .method(parts.method)
        .uri(uri)
        .version(parts.version)
        .body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn is_framing(name: &HeaderName) -> bool {
    name == HOST || name == CONTENT_LENGTH || name == TRANSFER_ENCODING
}

/// Authority the client addressed: from an absolute-form URI, else `Host`.
fn client_authority(parts: &Parts) -> Option<&str> {
    parts
        .uri
        .authority()
        .map(Authority::as_str)
        .or_else(|| parts.headers.get(HOST).and_then(|host| host.to_str().ok()))
        .filter(|authority| !authority.is_empty())
}

fn rewrite_referer(parts: &Parts, origin: &TargetOrigin) -> Option<String> {
    let referer = parts.headers.get(REFERER)?.to_str().ok()?;
    let client = client_authority(parts)?;
    Some(referer.replace(client, origin.authority.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn origin() -> TargetOrigin {
        TargetOrigin::parse("https://good.example").unwrap()
    }

    fn inbound(uri: &str) -> axum::http::request::Builder {
        Request::builder().method(Method::GET).uri(uri)
    }

    #[test]
    fn test_parse_origin() {
        let origin = TargetOrigin::parse("https://good.example/ignored?x=1").unwrap();
        assert_eq!(origin.scheme(), &Scheme::HTTPS);
        assert_eq!(origin.authority().as_str(), "good.example");
        assert_eq!(origin.to_string(), "https://good.example");

        let with_port = TargetOrigin::parse("http://127.0.0.1:8081").unwrap();
        assert_eq!(with_port.authority().as_str(), "127.0.0.1:8081");
    }

    #[test]
    fn test_parse_origin_errors() {
        assert!(TargetOrigin::parse("good.example").is_err());
        assert!(TargetOrigin::parse("ftp://good.example").is_err());
        assert!(TargetOrigin::parse("").is_err());
    }

    #[test]
    fn test_rewrite_scenario() {
        let request = inbound("/path?q=1")
            .header(HOST, "proxyhost")
            .header(REFERER, "http://proxyhost/")
            .header(ACCEPT_ENCODING, "gzip, br")
            .header("x-custom", "kept")
            .body(Bytes::new())
            .unwrap();

        let outbound = rewrite_request(request, &origin()).unwrap();
        assert_eq!(outbound.method(), Method::GET);
        assert_eq!(outbound.uri().to_string(), "https://good.example/path?q=1");
        assert_eq!(outbound.headers()[HOST], "good.example");
        assert_eq!(outbound.headers()[REFERER], "http://good.example/");
        assert_eq!(outbound.headers()["x-custom"], "kept");
        assert!(outbound.headers().get(ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn test_absolute_form_uses_its_authority() {
        let request = inbound("http://proxyhost:8080/a")
            .header(REFERER, "http://proxyhost:8080/login")
            .body(Bytes::new())
            .unwrap();

        let outbound = rewrite_request(request, &origin()).unwrap();
        assert_eq!(outbound.uri().to_string(), "https://good.example/a");
        assert_eq!(outbound.headers()[REFERER], "http://good.example/login");
    }

    #[test]
    fn test_referer_without_client_host_is_copied() {
        let request = inbound("/")
            .header(REFERER, "https://elsewhere.example/")
            .body(Bytes::new())
            .unwrap();

        let outbound = rewrite_request(request, &origin()).unwrap();
        assert_eq!(outbound.headers()[REFERER], "https://elsewhere.example/");
    }

    #[test]
    fn test_first_value_wins() {
        let request = inbound("/")
            .header("x-multi", "one")
            .header("x-multi", "two")
            .body(Bytes::new())
            .unwrap();

        let outbound = rewrite_request(request, &origin()).unwrap();
        let values: Vec<_> = outbound.headers().get_all("x-multi").iter().collect();
        assert_eq!(values, vec!["one"]);
    }

    #[test]
    fn test_body_and_method_preserved() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(CONTENT_LENGTH, "9")
            .header(TRANSFER_ENCODING, "chunked")
            .body(Bytes::from_static(b"user=mark"))
            .unwrap();

        let outbound = rewrite_request(request, &origin()).unwrap();
        assert_eq!(outbound.method(), Method::POST);
        assert_eq!(outbound.body().as_ref(), b"user=mark");
        assert!(outbound.headers().get(CONTENT_LENGTH).is_none());
        assert!(outbound.headers().get(TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_missing_path_becomes_root() {
        let request = inbound("http://proxyhost").body(Bytes::new()).unwrap();
        let outbound = rewrite_request(request, &origin()).unwrap();
        assert_eq!(outbound.uri().path(), "/");
    }
}
