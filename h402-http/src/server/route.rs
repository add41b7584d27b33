//! Per-route payment configuration.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use h402::scheme::{BoxFuture, SchemeError};

use crate::request::RequestContext;

/// Default guard applied to deferred price / payTo hooks.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// A deferred value callback evaluated per request.
pub type DynamicValueFn =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<Value, SchemeError>> + Send + Sync>;

/// A route value that is either fixed or computed per request.
///
/// Dynamic sources run under the route's hook timeout; a timeout or
/// error fails the request with a sanitized 500 rather than producing a
/// payment challenge.
#[derive(Clone)]
pub enum ValueSource {
    /// A fixed value.
    Static(Value),
    /// A per-request callback.
    Dynamic(DynamicValueFn),
}

impl std::fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<fn>").finish(),
        }
    }
}

impl ValueSource {
    /// A fixed JSON value.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Static(value.into())
    }

    /// A per-request callback. The callback receives an owned request
    /// snapshot and may be async.
    pub fn dynamic<F, Fut>(callback: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SchemeError>> + Send + 'static,
    {
        Self::Dynamic(Arc::new(move |ctx| Box::pin(callback(ctx))))
    }

    /// Resolves the value for one request, enforcing `timeout` on
    /// dynamic sources.
    pub(crate) async fn resolve(
        &self,
        ctx: &RequestContext,
        timeout: Duration,
    ) -> Result<Value, String> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Dynamic(callback) => {
                match tokio::time::timeout(timeout, callback(ctx.clone())).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(format!("hook failed: {err}")),
                    Err(_) => Err(format!("hook timed out after {timeout:?}")),
                }
            }
        }
    }
}

impl From<Value> for ValueSource {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for ValueSource {
    fn from(value: &str) -> Self {
        Self::Static(Value::String(value.to_owned()))
    }
}

/// One acceptable way of paying for a route.
#[derive(Debug, Clone)]
pub struct PaymentOption {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier.
    pub network: String,

    /// Price — fixed or computed per request.
    pub price: ValueSource,

    /// Recipient — fixed or computed per request.
    pub pay_to: ValueSource,

    /// Maximum validity window override, in seconds.
    pub max_timeout_seconds: Option<u64>,
}

impl PaymentOption {
    /// Creates an option with fixed price and recipient.
    #[must_use]
    pub fn new(
        scheme: impl Into<String>,
        network: impl Into<String>,
        price: impl Into<ValueSource>,
        pay_to: impl Into<ValueSource>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
            price: price.into(),
            pay_to: pay_to.into(),
            max_timeout_seconds: None,
        }
    }

    /// Sets the validity window override.
    #[must_use]
    pub const fn with_max_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }
}

/// Payment configuration of one protected route.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Acceptable payment options, preference order.
    pub accepts: Vec<PaymentOption>,

    /// Human-readable description included in 402 responses.
    pub description: Option<String>,

    /// MIME type of the protected resource.
    pub mime_type: Option<String>,

    /// Extension declarations (e.g., a bazaar declaration) enriched per
    /// request.
    pub extensions: Option<Value>,

    /// Guard applied to each deferred hook invocation.
    pub hook_timeout: Duration,
}

impl RouteConfig {
    /// Creates a route accepting a single payment option.
    #[must_use]
    pub fn new(option: PaymentOption) -> Self {
        Self {
            accepts: vec![option],
            description: None,
            mime_type: None,
            extensions: None,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Adds another payment option.
    #[must_use]
    pub fn with_option(mut self, option: PaymentOption) -> Self {
        self.accepts.push(option);
        self
    }

    /// Sets the route description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the resource MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attaches extension declarations.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Overrides the hook timeout.
    #[must_use]
    pub const fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_values_resolve_immediately() {
        let source = ValueSource::value(json!("$1.00"));
        let value = source
            .resolve(&RequestContext::default(), DEFAULT_HOOK_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value, json!("$1.00"));
    }

    #[tokio::test]
    async fn dynamic_values_see_the_request() {
        let source = ValueSource::dynamic(|ctx: RequestContext| async move {
            Ok(json!(ctx.query_param("tier").unwrap_or("none").to_owned()))
        });
        let mut ctx = RequestContext::default();
        ctx.query.insert("tier".into(), "business".into());
        let value = source.resolve(&ctx, DEFAULT_HOOK_TIMEOUT).await.unwrap();
        assert_eq!(value, json!("business"));
    }

    #[tokio::test]
    async fn hanging_hooks_are_bounded_by_the_timeout() {
        let source = ValueSource::dynamic(|_ctx: RequestContext| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!("never"))
        });
        let err = source
            .resolve(&RequestContext::default(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[tokio::test]
    async fn failing_hooks_report_errors() {
        let source =
            ValueSource::dynamic(|_ctx: RequestContext| async move { Err("boom".into()) });
        let err = source
            .resolve(&RequestContext::default(), DEFAULT_HOOK_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.contains("boom"));
    }
}
