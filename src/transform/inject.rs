//! HTML script injection.
//!
//! # Responsibilities
//! - Recognise HTML responses by content type
//! - Widen the Content-Security-Policy for the script's origin
//! - Append a `<script>` element as the last child of `<head>`
//!
//! # Design Decisions
//! - The body is rewritten with a streaming tokenizer (`lol_html`), so
//!   markup outside the insertion point is passed through untouched
//! - Only the first `<head>` receives the script
//! - An omitted `</head>` ends the head where a parser would close it
//! - A document without any head content is given one

use std::cell::Cell;
use std::rc::Rc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Response};
use bytes::Bytes;
use lol_html::html_content::ContentType;
use lol_html::{doc_text, element, end, HtmlRewriter, Settings};

use crate::transform::csp;
use crate::transform::{TransformError, Transformer};

/// Injects a script reference into every HTML document.
#[derive(Debug, Clone)]
pub struct ScriptInjector {
    script_url: String,
    origin: String,
    tag: String,
}

impl ScriptInjector {
    /// Create an injector for an absolute script URL.
    pub fn new(script_url: impl Into<String>) -> Result<Self, TransformError> {
        let script_url = script_url.into();
        let origin = csp::script_origin(&script_url)
            .ok_or_else(|| TransformError::InvalidScriptUrl(script_url.clone()))?
            .to_string();
        let tag = format!(
            r#"<script type="text/javascript" src="{}"></script>"#,
            escape_attribute(&script_url)
        );
        Ok(Self {
            script_url,
            origin,
            tag,
        })
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    /// Host (and port) the script is served from.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Transformer for ScriptInjector {
    fn name(&self) -> &'static str {
        "script_injector"
    }

    fn transform(&self, response: &mut Response<Bytes>) -> Result<(), TransformError> {
        if !is_html(response.headers()) {
            return Ok(());
        }

        csp::widen_policy(response.headers_mut(), &self.origin);

        let document = response.body().clone();
        let rewritten = append_to_head(&document, &self.tag)?;
        *response.body_mut() = rewritten;
        Ok(())
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/html"))
}

/// Where the rewriter is relative to the document head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadState {
    /// No head content seen yet.
    Pending,
    /// Inside the head, whether its tags are written out or implied.
    Open,
    Injected,
}

/// Insert `markup` as the last child of the document head.
///
/// The head ends at `</head>` when present, otherwise just before the first
/// element that cannot live in a head. A document without any head content
/// gets a `<head>` holding only `markup`.
fn append_to_head(document: &[u8], markup: &str) -> Result<Bytes, TransformError> {
    let state = Rc::new(Cell::new(HeadState::Pending));
    let wrapped = format!("<head>{markup}</head>");
    let mut output = Vec::with_capacity(document.len() + wrapped.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("head", |el| {
                    if state.get() != HeadState::Pending {
                        return Ok(());
                    }
                    state.set(HeadState::Open);
                    if let Some(handlers) = el.end_tag_handlers() {
                        let state = Rc::clone(&state);
                        let markup = markup.to_string();
                        handlers.push(Box::new(move |end| {
                            if state.get() == HeadState::Open {
                                end.before(&markup, ContentType::Html);
                                state.set(HeadState::Injected);
                            }
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                element!("*", |el| {
                    let name = el.tag_name();
                    if name == "html" || name == "head" {
                        return Ok(());
                    }
                    match state.get() {
                        HeadState::Injected => {}
                        HeadState::Pending if is_head_content(&name) => {
                            state.set(HeadState::Open);
                        }
                        HeadState::Pending => {
                            el.before(&wrapped, ContentType::Html);
                            state.set(HeadState::Injected);
                        }
                        HeadState::Open if is_head_content(&name) => {}
                        // The head closed implicitly at this element.
                        HeadState::Open => {
                            el.before(markup, ContentType::Html);
                            state.set(HeadState::Injected);
                        }
                    }
                    Ok(())
                }),
            ],
            document_content_handlers: vec![
                doc_text!(|text| {
                    if state.get() == HeadState::Pending && !text.as_str().trim().is_empty() {
                        text.before(&wrapped, ContentType::Html);
                        state.set(HeadState::Injected);
                    }
                    Ok(())
                }),
                end!(|end| {
                    match state.get() {
                        HeadState::Pending => end.append(&wrapped, ContentType::Html),
                        HeadState::Open => end.append(markup, ContentType::Html),
                        HeadState::Injected => {}
                    }
                    state.set(HeadState::Injected);
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(document)?;
    rewriter.end()?;

    Ok(Bytes::from(output))
}

/// Elements the HTML parser keeps inside the head.
fn is_head_content(name: &str) -> bool {
    matches!(
        name,
        "base" | "basefont" | "bgsound" | "link" | "meta" | "noscript" | "script" | "style"
            | "template" | "title"
    )
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
