//! Process-wide pool of routing contexts.
//!
//! Dispatch acquires a context, installs it on the request, and returns
//! it after the response is written. Contexts are recycled through a
//! free list so parameter storage amortizes across requests.

use std::sync::Mutex;

use crate::context::RouteContext;

static FREE_LIST: Mutex<Vec<Box<RouteContext>>> = Mutex::new(Vec::new());

/// Takes a reset context from the pool, or allocates a fresh one.
pub(crate) fn acquire() -> Box<RouteContext> {
    let recycled = FREE_LIST.lock().ok().and_then(|mut list| list.pop());
    let mut rctx = recycled.unwrap_or_default();
    rctx.reset();
    rctx
}

/// Returns a context to the pool.
pub(crate) fn release(rctx: Box<RouteContext>) {
    if let Ok(mut list) = FREE_LIST.lock() {
        list.push(rctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycled_context_behaves_like_fresh() {
        let mut rctx = acquire();
        rctx.route_path = "/leftover".to_owned();
        rctx.push_param("id", "42".to_owned());
        rctx.commit_params();
        rctx.route_patterns.push("/x".to_owned());
        rctx.set_method_not_allowed();
        release(rctx);

        let rctx = acquire();
        assert!(rctx.route_path.is_empty());
        assert!(rctx.route_method.is_empty());
        assert!(rctx.route_patterns.is_empty());
        assert!(rctx.url_params().is_empty());
        assert!(!rctx.is_method_not_allowed());
    }
}
