//! Set-Cookie domain rewriting.
//!
//! Cookies scoped to the target's domain would be rejected by the browser,
//! which is talking to the listening host. The `Domain` attribute of every
//! cookie is pointed at the configured domain instead.

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, Response};
use bytes::Bytes;

use crate::transform::{TransformError, Transformer};

#[derive(Debug, Clone)]
pub struct CookieDomainRewriter {
    domain: String,
}

impl CookieDomainRewriter {
    pub fn new(domain: impl Into<String>) -> Result<Self, TransformError> {
        let domain = domain.into();
        // Reject anything that could not appear in a header value up front.
        HeaderValue::from_str(&domain)?;
        Ok(Self { domain })
    }
}

impl Transformer for CookieDomainRewriter {
    fn name(&self) -> &'static str {
        "cookie_domain"
    }

    fn transform(&self, response: &mut Response<Bytes>) -> Result<(), TransformError> {
        let headers = response.headers_mut();
        let cookies: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
        if cookies.is_empty() {
            return Ok(());
        }

        let mut rewritten = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            match cookie.to_str() {
                Ok(text) => rewritten.push(HeaderValue::from_str(&rewrite_domain(text, &self.domain))?),
                // Opaque bytes pass through unchanged
                Err(_) => rewritten.push(cookie),
            }
        }

        headers.remove(SET_COOKIE);
        for cookie in rewritten {
            headers.append(SET_COOKIE, cookie);
        }
        Ok(())
    }
}

/// Replace the `Domain` attribute of a single Set-Cookie value.
fn rewrite_domain(cookie: &str, domain: &str) -> String {
    let mut parts = cookie.split(';');
    let mut out = parts.next().unwrap_or_default().trim().to_string();
    for attribute in parts {
        let attribute = attribute.trim();
        if attribute.is_empty() {
            continue;
        }
        out.push_str("; ");
        let is_domain = attribute
            .split_once('=')
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case("domain"));
        if is_domain {
            out.push_str("Domain=");
            out.push_str(domain);
        } else {
            out.push_str(attribute);
        }
    }
    out
}
