//! Per-request routing state.
//!
//! A [`RouteContext`] is installed on the request's user-value bag
//! under [`ROUTE_CTX_KEY`] before dispatch and tracks captured URL
//! parameters, the matched pattern stack, and the path/method
//! overrides used when descending into mounted sub-routers.

use crate::request::RequestCtx;

/// User-value key under which the routing context is stored. Prefixed
/// to avoid collisions with user-defined keys.
pub const ROUTE_CTX_KEY: &str = "phi context key: RouteContext";

/// URL parameters captured during routing, in descent order.
///
/// Lookup returns the last binding for a name, so a parameter bound by
/// an inner sub-router shadows an outer one of the same name.
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    keys: Vec<String>,
    values: Vec<String>,
}

impl RouteParams {
    /// Appends a binding.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.keys.push(key.into());
        self.values.push(value.into());
    }

    /// Returns the last value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .rposition(|k| k == key)
            .map(|i| self.values[i].as_str())
    }

    /// Iterates bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn last(&self) -> Option<(&str, &str)> {
        let key = self.keys.last()?;
        let value = self.values.last()?;
        Some((key, value))
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.keys.truncate(len);
        self.values.truncate(len);
    }
}

/// The routing context tracked across a request, including across a
/// stack of mounted sub-routers.
#[derive(Debug, Default)]
pub struct RouteContext {
    /// Path override set by a mount shim: the unconsumed tail that the
    /// sub-router should match instead of the request path.
    pub route_path: String,

    /// Method override; filled from the request on first dispatch.
    pub route_method: String,

    /// Matched pattern per traversed router layer.
    pub route_patterns: Vec<String>,

    /// Parameters committed across the whole request lifecycle.
    url_params: RouteParams,
    /// Scratch for the router layer currently searching; merged into
    /// `url_params` when the layer's search succeeds. The mount shim
    /// reads the layer's own catch-all capture from here.
    route_params: RouteParams,
    method_not_allowed: bool,
}

impl RouteContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context to its initial state without releasing the
    /// backing storage, so pooled reuse amortizes allocations.
    pub fn reset(&mut self) {
        self.route_path.clear();
        self.route_method.clear();
        self.route_patterns.clear();
        self.url_params.truncate(0);
        self.route_params.truncate(0);
        self.method_not_allowed = false;
    }

    /// Returns the last value captured for the URL parameter `key`.
    pub fn url_param(&self, key: &str) -> Option<&str> {
        self.url_params.get(key)
    }

    pub fn url_params(&self) -> &RouteParams {
        &self.url_params
    }

    /// Mutable access to the parameter list, for callers that invoke a
    /// handler outside a router and want to pre-bind parameters.
    pub fn url_params_mut(&mut self) -> &mut RouteParams {
        &mut self.url_params
    }

    /// The full routing pattern for the request at this point of the
    /// lifecycle: the per-layer patterns joined with mount wildcards
    /// collapsed. Stable only once the innermost handler has matched.
    pub fn route_pattern(&self) -> String {
        self.route_patterns.concat().replace("/*/", "/")
    }

    // The layer scratch: each router layer's search starts empty,
    // binds tentatively during descent, and commits on success.

    pub(crate) fn begin_layer(&mut self) {
        self.route_params.truncate(0);
    }

    pub(crate) fn commit_params(&mut self) {
        for i in 0..self.route_params.len() {
            self.url_params.keys.push(self.route_params.keys[i].clone());
            self.url_params.values.push(self.route_params.values[i].clone());
        }
    }

    pub(crate) fn push_param(&mut self, key: &str, value: String) {
        self.route_params.keys.push(key.to_owned());
        self.route_params.values.push(value);
    }

    pub(crate) fn params_len(&self) -> usize {
        self.route_params.len()
    }

    pub(crate) fn truncate_params(&mut self, len: usize) {
        self.route_params.truncate(len);
    }

    /// Last binding of the current layer, which for a mount match is
    /// the catch-all capture.
    pub(crate) fn last_param(&self) -> Option<(&str, &str)> {
        self.route_params.last()
    }

    pub(crate) fn set_method_not_allowed(&mut self) {
        self.method_not_allowed = true;
    }

    pub(crate) fn is_method_not_allowed(&self) -> bool {
        self.method_not_allowed
    }
}

/// Returns the routing context installed on `ctx`, if the request is
/// being (or has been) routed.
pub fn route_context(ctx: &RequestCtx) -> Option<&RouteContext> {
    ctx.user_value::<RouteContext>(ROUTE_CTX_KEY)
}

/// Mutable variant of [`route_context`].
pub fn route_context_mut(ctx: &mut RequestCtx) -> Option<&mut RouteContext> {
    ctx.user_value_mut::<RouteContext>(ROUTE_CTX_KEY)
}

/// Returns the URL parameter `key` captured for this request.
pub fn url_param<'a>(ctx: &'a RequestCtx, key: &str) -> Option<&'a str> {
    route_context(ctx)?.url_param(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_binding_wins() {
        let mut rctx = RouteContext::new();
        rctx.url_params_mut().add("id", "outer");
        rctx.url_params_mut().add("other", "x");
        rctx.url_params_mut().add("id", "inner");

        assert_eq!(rctx.url_param("id"), Some("inner"));
        assert_eq!(rctx.url_param("other"), Some("x"));
        assert_eq!(rctx.url_param("missing"), None);
    }

    #[test]
    fn test_layer_commit_merges_into_url_params() {
        let mut rctx = RouteContext::new();
        rctx.begin_layer();
        rctx.push_param("hash", "aBc".to_owned());
        rctx.push_param("*", "share/x".to_owned());
        assert_eq!(rctx.url_param("hash"), None);

        rctx.commit_params();
        assert_eq!(rctx.url_param("hash"), Some("aBc"));
        assert_eq!(rctx.last_param(), Some(("*", "share/x")));

        // the next layer starts empty but committed params survive
        rctx.begin_layer();
        assert_eq!(rctx.params_len(), 0);
        assert_eq!(rctx.url_param("hash"), Some("aBc"));
        assert_eq!(rctx.last_param(), None);
    }

    #[test]
    fn test_truncate_restores_snapshot() {
        let mut rctx = RouteContext::new();
        rctx.push_param("a", "1".to_owned());
        let mark = rctx.params_len();
        rctx.push_param("b", "2".to_owned());
        rctx.push_param("c", "3".to_owned());
        rctx.truncate_params(mark);

        assert_eq!(rctx.params_len(), 1);
        assert_eq!(rctx.last_param(), Some(("a", "1")));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut rctx = RouteContext::new();
        rctx.route_path = "/tail".to_owned();
        rctx.route_method = "GET".to_owned();
        rctx.route_patterns.push("/x/*".to_owned());
        rctx.push_param("a", "1".to_owned());
        rctx.commit_params();
        rctx.set_method_not_allowed();

        rctx.reset();
        assert!(rctx.route_path.is_empty());
        assert!(rctx.route_method.is_empty());
        assert!(rctx.route_patterns.is_empty());
        assert!(rctx.url_params().is_empty());
        assert_eq!(rctx.last_param(), None);
        assert!(!rctx.is_method_not_allowed());
    }

    #[test]
    fn test_route_pattern_collapses_mounts() {
        let mut rctx = RouteContext::new();
        rctx.route_patterns.push("/accounts/{accountID}/*".to_owned());
        rctx.route_patterns.push("/*".to_owned());
        rctx.route_patterns.push("/hi".to_owned());

        assert_eq!(rctx.route_pattern(), "/accounts/{accountID}/*/hi");
    }
}
