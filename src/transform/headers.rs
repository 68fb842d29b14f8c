//! Response header removal.

use axum::http::{HeaderName, Response};
use bytes::Bytes;

use crate::transform::{TransformError, Transformer};

/// Removes a fixed set of headers from every response.
///
/// Typical targets are `strict-transport-security` and
/// `content-security-policy-report-only`.
#[derive(Debug, Clone)]
pub struct StripHeaders {
    names: Vec<HeaderName>,
}

impl StripHeaders {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, TransformError> {
        let names = names
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_ref().trim().as_bytes())
                    .map_err(|_| TransformError::InvalidHeaderName(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }
}

impl Transformer for StripHeaders {
    fn name(&self) -> &'static str {
        "strip_headers"
    }

    fn transform(&self, response: &mut Response<Bytes>) -> Result<(), TransformError> {
        let headers = response.headers_mut();
        for name in &self.names {
            headers.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_removes_every_value() {
        let strip = StripHeaders::new(&["Strict-Transport-Security", "x-frame-options"]).unwrap();
        let mut response = Response::new(Bytes::new());
        let headers = response.headers_mut();
        headers.append("strict-transport-security", HeaderValue::from_static("max-age=1"));
        headers.append("strict-transport-security", HeaderValue::from_static("max-age=2"));
        headers.append("x-frame-options", HeaderValue::from_static("DENY"));
        headers.append("content-type", HeaderValue::from_static("text/html"));

        strip.transform(&mut response).unwrap();
        assert!(response.headers().get("strict-transport-security").is_none());
        assert!(response.headers().get("x-frame-options").is_none());
        assert_eq!(response.headers()["content-type"], "text/html");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = StripHeaders::new(&["bad header"]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidHeaderName(_)));
    }
}
