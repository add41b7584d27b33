//! Framework-neutral request view.
//!
//! The payment gate never touches a concrete web framework: it sees
//! requests through [`HttpRequest`], and hands deferred pricing hooks an
//! owned [`RequestContext`] snapshot so they can run after the request
//! has moved on.

use std::collections::HashMap;

/// Capability set the payment gate needs from an incoming request.
///
/// Implement this once per web framework; the axum layer in
/// [`crate::server`] ships an implementation for `http` request parts.
pub trait HttpRequest {
    /// HTTP method (uppercase).
    fn method(&self) -> &str;

    /// Request path (no query string).
    fn path(&self) -> &str;

    /// Full request URL.
    fn url(&self) -> String;

    /// A request header by case-insensitive name.
    fn header(&self, name: &str) -> Option<String>;

    /// A single query parameter.
    fn query_param(&self, name: &str) -> Option<String> {
        self.query_params().get(name).cloned()
    }

    /// All query parameters.
    fn query_params(&self) -> HashMap<String, String>;

    /// The `Accept` header.
    fn accept_header(&self) -> Option<String> {
        self.header("accept")
    }

    /// The `User-Agent` header.
    fn user_agent(&self) -> Option<String> {
        self.header("user-agent")
    }

    /// The request body, when buffered.
    fn body(&self) -> Option<&[u8]> {
        None
    }
}

/// Owned snapshot of a request, passed to deferred price / payTo hooks.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method (uppercase).
    pub method: String,

    /// Request path.
    pub path: String,

    /// Full request URL.
    pub url: String,

    /// Query parameters.
    pub query: HashMap<String, String>,

    /// `Accept` header, when present.
    pub accept: Option<String>,

    /// `User-Agent` header, when present.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Snapshots an [`HttpRequest`].
    pub fn from_request<R: HttpRequest + ?Sized>(request: &R) -> Self {
        Self {
            method: request.method().to_ascii_uppercase(),
            path: request.path().to_owned(),
            url: request.url(),
            query: request.query_params(),
            accept: request.accept_header(),
            user_agent: request.user_agent(),
        }
    }

    /// Builds a context from `http` request parts.
    #[must_use]
    pub fn from_parts(method: &http::Method, uri: &http::Uri, headers: &http::HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned)
        };
        Self {
            method: method.as_str().to_ascii_uppercase(),
            path: uri.path().to_owned(),
            url: uri.to_string(),
            query,
            accept: header("accept"),
            user_agent: header("user-agent"),
        }
    }

    /// Returns one query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
