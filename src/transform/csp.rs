//! Content-Security-Policy rewriting.
//!
//! An injected script is only executed if the page's policy allows its
//! origin, so every `script-src` directive gets the origin appended.

use axum::http::header::CONTENT_SECURITY_POLICY;
use axum::http::{HeaderMap, HeaderValue};

/// Origin of an absolute URL: the text between the first `//` and the next `/`.
pub fn script_origin(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("//")?;
    let origin = rest.split('/').next().unwrap_or_default();
    if origin.is_empty() {
        None
    } else {
        Some(origin)
    }
}

/// Append `origin` to every `script-src` directive of `policy`.
///
/// Directives are trimmed and re-joined with `"; "`; their order is kept.
pub fn allow_script_origin(policy: &str, origin: &str) -> String {
    policy
        .split(';')
        .map(|directive| {
            let directive = directive.trim();
            if directive.contains("script-src") {
                format!("{directive} {origin}")
            } else {
                directive.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Widen every Content-Security-Policy header so scripts from `origin` load.
///
/// A policy that already mentions `origin` anywhere is left alone, which keeps
/// repeated rewrites from stacking duplicates. Returns whether anything changed.
pub fn widen_policy(headers: &mut HeaderMap, origin: &str) -> bool {
    let current: Vec<HeaderValue> = headers
        .get_all(CONTENT_SECURITY_POLICY)
        .iter()
        .cloned()
        .collect();
    if current.is_empty() {
        return false;
    }

    let mut changed = false;
    let mut rebuilt = Vec::with_capacity(current.len());
    for value in current {
        let widened = match value.to_str() {
            Ok(policy) if !policy.contains(origin) => {
                HeaderValue::from_str(&allow_script_origin(policy, origin)).ok()
            }
            _ => None,
        };
        match widened {
            Some(widened) => {
                changed = true;
                rebuilt.push(widened);
            }
            None => rebuilt.push(value),
        }
    }

    if changed {
        headers.remove(CONTENT_SECURITY_POLICY);
        for value in rebuilt {
            headers.append(CONTENT_SECURITY_POLICY, value);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_origin() {
        assert_eq!(script_origin("https://cdn.example/x.js"), Some("cdn.example"));
        assert_eq!(script_origin("http://cdn.example:8080/a/b.js"), Some("cdn.example:8080"));
        assert_eq!(script_origin("https://cdn.example"), Some("cdn.example"));
        assert_eq!(script_origin("//cdn.example/x.js"), Some("cdn.example"));
        assert_eq!(script_origin("/x.js"), None);
        assert_eq!(script_origin("https:///x.js"), None);
    }

    #[test]
    fn test_allow_script_origin() {
        assert_eq!(
            allow_script_origin("default-src 'self'; script-src 'self'", "cdn.example"),
            "default-src 'self'; script-src 'self' cdn.example"
        );
    }

    #[test]
    fn test_every_script_src_directive_is_widened() {
        let policy = "script-src 'self';img-src *;  script-src-elem 'none'  ";
        assert_eq!(
            allow_script_origin(policy, "cdn.example"),
            "script-src 'self' cdn.example; img-src *; script-src-elem 'none' cdn.example"
        );
    }

    #[test]
    fn test_policy_without_script_src_only_normalised() {
        assert_eq!(
            allow_script_origin("default-src 'self' ;img-src *", "cdn.example"),
            "default-src 'self'; img-src *"
        );
    }

    #[test]
    fn test_widen_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'; script-src 'self'"),
        );

        assert!(widen_policy(&mut headers, "cdn.example"));
        assert_eq!(
            headers[CONTENT_SECURITY_POLICY],
            "default-src 'self'; script-src 'self' cdn.example"
        );
    }

    #[test]
    fn test_widen_is_not_repeated() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("script-src 'self'"),
        );

        assert!(widen_policy(&mut headers, "cdn.example"));
        assert!(!widen_policy(&mut headers, "cdn.example"));
        assert_eq!(headers[CONTENT_SECURITY_POLICY], "script-src 'self' cdn.example");
    }

    #[test]
    fn test_missing_header_not_added() {
        let mut headers = HeaderMap::new();
        assert!(!widen_policy(&mut headers, "cdn.example"));
        assert!(headers.get(CONTENT_SECURITY_POLICY).is_none());
    }

    #[test]
    fn test_each_policy_rewritten_independently() {
        let mut headers = HeaderMap::new();
        headers.append(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("script-src 'self'"),
        );
        headers.append(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("script-src cdn.example"),
        );

        assert!(widen_policy(&mut headers, "cdn.example"));
        let values: Vec<_> = headers.get_all(CONTENT_SECURITY_POLICY).iter().collect();
        assert_eq!(values, vec!["script-src 'self' cdn.example", "script-src cdn.example"]);
    }
}
