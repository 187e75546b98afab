//! # phi
//!
//! A small, composable HTTP request router.
//!
//! phi matches request paths against a radix trie and dispatches to
//! handlers wrapped in composable middleware stacks. It is a routing
//! library only: the host runtime parses HTTP, builds a
//! [`RequestCtx`], and writes the finished response out.
//!
//! Routing patterns are `/`-rooted:
//!
//! - `/users` matches literally.
//! - `/users/{id}` binds one path segment to the parameter `id`.
//! - `/files/*` binds the whole remaining path (possibly empty) to `*`;
//!   the `*` must be the final segment.
//!
//! Captured parameters are raw path bytes; phi does not URL-decode.
//!
//! ## Quick start
//!
//! ```
//! use phi::{handler_fn, url_param, Mux, RequestCtx};
//!
//! let mut router = Mux::new();
//!
//! // a middleware takes the next handler and returns a wrapped one
//! router.use_middleware(|next| {
//!     handler_fn(move |ctx| {
//!         next(ctx);
//!         ctx.set_header("X-Served-By", "phi");
//!     })
//! });
//!
//! router.get("/ping", |ctx| ctx.write_str("."));
//! router.get("/users/{id}", |ctx| {
//!     let id = url_param(ctx, "id").unwrap_or("unknown").to_owned();
//!     ctx.write_str(&format!("user {id}"));
//! });
//!
//! let mut ctx = RequestCtx::get("/users/42");
//! router.serve(&mut ctx);
//! assert_eq!(ctx.response.status, 200);
//! assert_eq!(ctx.response.body_string().as_deref(), Some("user 42"));
//! ```
//!
//! ## Sub-routers
//!
//! Routers compose: [`Mux::mount`] attaches a whole router under a
//! prefix, and [`Mux::route`] is the inline shorthand. Requests below
//! the prefix descend into the sub-router with the unconsumed tail.
//!
//! ```
//! use phi::{url_param, Mux, RequestCtx};
//!
//! let mut api = Mux::new();
//! api.get("/users/{id}", |ctx| {
//!     let id = url_param(ctx, "id").unwrap_or_default().to_owned();
//!     ctx.write_str(&format!("api user {id}"));
//! });
//!
//! let mut root = Mux::new();
//! root.get("/", |ctx| ctx.write_str("index"));
//! root.mount("/api", api);
//!
//! let mut ctx = RequestCtx::get("/api/users/7");
//! root.serve(&mut ctx);
//! assert_eq!(ctx.response.body_string().as_deref(), Some("api user 7"));
//! ```
//!
//! ## Registration, then serving
//!
//! All `use_middleware`, route, and mount calls must finish before the
//! router serves its first request: the middleware stack freezes on the
//! first route registration, and `use_middleware` after that point
//! panics. A frozen [`Mux`] is immutable at dispatch time and can be
//! shared across threads behind an [`Arc`](std::sync::Arc).

mod chain;
mod context;
mod error;
mod method;
mod mux;
mod pattern;
mod pool;
mod request;
mod response;
mod tree;

pub use chain::{handler_fn, HandlerFn, Middleware, Middlewares};
pub use context::{
    route_context, route_context_mut, url_param, RouteContext, RouteParams, ROUTE_CTX_KEY,
};
pub use error::{Result, RouterError};
pub use method::Method;
pub use mux::{Mux, RouteInfo};
pub use request::RequestCtx;
pub use response::Response;
