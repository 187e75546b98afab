//! Middleware composition.
//!
//! A middleware is anything that takes a handler and returns a wrapped
//! handler. Stacks compose right to left so the first registered
//! middleware runs outermost at request time.

use std::sync::Arc;

use crate::request::RequestCtx;

/// A terminal request handler.
pub type HandlerFn = Arc<dyn Fn(&mut RequestCtx) + Send + Sync>;

/// A middleware: wraps a handler in another handler.
pub type Middleware = Arc<dyn Fn(HandlerFn) -> HandlerFn + Send + Sync>;

/// Wraps a closure as a [`HandlerFn`].
pub fn handler_fn(f: impl Fn(&mut RequestCtx) + Send + Sync + 'static) -> HandlerFn {
    Arc::new(f)
}

/// Composes `middlewares` around `endpoint`: the first middleware in
/// the slice becomes the outermost wrapper. An empty slice returns the
/// endpoint untouched.
pub(crate) fn chain(middlewares: &[Middleware], endpoint: HandlerFn) -> HandlerFn {
    let mut wrapped = endpoint;
    for mw in middlewares.iter().rev() {
        wrapped = mw(wrapped);
    }
    wrapped
}

/// An ordered middleware stack that can be composed around any handler,
/// useful for putting middleware in front of a mounted handler.
#[derive(Clone, Default)]
pub struct Middlewares {
    stack: Vec<Middleware>,
}

impl Middlewares {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the stack.
    pub fn push(&mut self, mw: impl Fn(HandlerFn) -> HandlerFn + Send + Sync + 'static) {
        self.stack.push(Arc::new(mw));
    }

    pub(crate) fn push_middleware(&mut self, mw: Middleware) {
        self.stack.push(mw);
    }

    /// Builds a single handler from the stack with `endpoint` as the
    /// innermost handler.
    pub fn handler(&self, endpoint: HandlerFn) -> HandlerFn {
        chain(&self.stack, endpoint)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(tag: &'static str) -> Middleware {
        Arc::new(move |next: HandlerFn| {
            handler_fn(move |ctx| {
                next(ctx);
                ctx.write_str(tag);
            })
        })
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let endpoint = handler_fn(|ctx| ctx.write_str("ok"));
        let composed = chain(&[], endpoint);

        let mut ctx = RequestCtx::new("GET", "/");
        composed(&mut ctx);
        assert_eq!(ctx.response.body_string().as_deref(), Some("ok"));
    }

    #[test]
    fn test_first_middleware_runs_outermost() {
        let endpoint = handler_fn(|ctx| ctx.write_str("ok"));
        let composed = chain(&[tag("+mw1"), tag("+mw2")], endpoint);

        let mut ctx = RequestCtx::new("GET", "/");
        composed(&mut ctx);
        // innermost middleware finishes first
        assert_eq!(ctx.response.body_string().as_deref(), Some("ok+mw2+mw1"));
    }

    #[test]
    fn test_middlewares_stack_handler() {
        let mut mws = Middlewares::new();
        assert!(mws.is_empty());
        mws.push(|next| {
            handler_fn(move |ctx| {
                ctx.write_str("pre ");
                next(ctx);
            })
        });
        assert_eq!(mws.len(), 1);

        let h = mws.handler(handler_fn(|ctx| ctx.write_str("end")));
        let mut ctx = RequestCtx::new("GET", "/");
        h(&mut ctx);
        assert_eq!(ctx.response.body_string().as_deref(), Some("pre end"));
    }
}
