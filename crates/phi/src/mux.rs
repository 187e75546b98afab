//! The router façade.
//!
//! A [`Mux`] multiplexes requests over a routing tree: registration
//! calls graft patterns onto the shared tree, and the first route
//! insertion freezes the middleware stack into a single dispatch
//! handler. Sub-routers compose through [`Mux::mount`] and inline
//! middleware scopes through [`Mux::with`] and [`Mux::group`].

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::chain::{HandlerFn, Middleware, Middlewares};
use crate::context::{route_context, route_context_mut, RouteContext, ROUTE_CTX_KEY};
use crate::method::{Method, MethodMask};
use crate::pool;
use crate::request::RequestCtx;
use crate::tree::Node;

const POISONED: &str = "phi: router lock poisoned";

type Responder = Arc<RwLock<Option<HandlerFn>>>;

/// A routing-tree record returned by [`Mux::routes`], used to traverse
/// the registered routes of a router and its mounted sub-routers.
#[derive(Clone)]
pub struct RouteInfo {
    /// The registered pattern.
    pub pattern: String,
    /// Method names with a handler at this pattern; `*` marks a
    /// handler registered for all methods.
    pub methods: Vec<&'static str>,
    /// The mounted sub-router, when this route is a mount point.
    pub subroutes: Option<Arc<Mux>>,
}

/// An HTTP request multiplexer.
///
/// Routes are registered against `/`-rooted patterns with `{name}`
/// parameters and a terminal `*` catch-all. At dispatch the path is
/// matched against a radix trie, captured parameters land on the
/// request's [`RouteContext`], and the matched handler runs inside the
/// composed middleware stack.
///
/// All registration must happen before the mux serves requests;
/// serving is then safe from any number of threads.
pub struct Mux {
    tree: Arc<RwLock<Node>>,
    middlewares: Middlewares,
    /// Inline muxes share their parent's tree and responders; they
    /// exist to attach an extended middleware stack to subsequent
    /// registrations and cannot be served directly.
    inline: bool,
    /// The frozen dispatch handler: middleware stack around the tree
    /// search. Present once the mux has frozen.
    handler: Option<HandlerFn>,
    not_found: Responder,
    method_not_allowed: Responder,
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Mux {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(RwLock::new(Node::default())),
            middlewares: Middlewares::new(),
            inline: false,
            handler: None,
            not_found: Arc::new(RwLock::new(None)),
            method_not_allowed: Arc::new(RwLock::new(None)),
        }
    }

    /// Appends a middleware to the stack. Middleware runs before the
    /// route search, outermost first in registration order.
    ///
    /// # Panics
    ///
    /// Panics when called after the first route registration.
    pub fn use_middleware(
        &mut self,
        mw: impl Fn(HandlerFn) -> HandlerFn + Send + Sync + 'static,
    ) {
        if self.handler.is_some() {
            panic!("phi: all middlewares must be defined before routes on a mux");
        }
        self.middlewares.push(mw);
    }

    /// Returns an inline mux sharing this router's tree, with this
    /// stack extended by `mw` for its registrations. Freezes a
    /// non-inline receiver. Calls chain:
    /// `r.with(a).with(b).get("/x", h)`.
    pub fn with(&mut self, mw: impl Fn(HandlerFn) -> HandlerFn + Send + Sync + 'static) -> Mux {
        let mw: Middleware = Arc::new(mw);
        self.make_inline(Some(mw))
    }

    /// Runs `f` with an inline mux: a scoped middleware extension with
    /// no path prefix.
    pub fn group(&mut self, f: impl FnOnce(&mut Mux)) {
        let mut inline = self.make_inline(None);
        f(&mut inline);
    }

    fn make_inline(&mut self, extra: Option<Middleware>) -> Mux {
        if !self.inline && self.handler.is_none() {
            self.freeze();
        }
        let mut middlewares = if self.inline {
            self.middlewares.clone()
        } else {
            Middlewares::new()
        };
        if let Some(mw) = extra {
            middlewares.push_middleware(mw);
        }
        Mux {
            tree: Arc::clone(&self.tree),
            middlewares,
            inline: true,
            handler: None,
            not_found: Arc::clone(&self.not_found),
            method_not_allowed: Arc::clone(&self.method_not_allowed),
        }
    }

    /// Builds a fresh router, populates it with `f`, and mounts it
    /// under `pattern`.
    pub fn route(&mut self, pattern: &str, f: impl FnOnce(&mut Mux)) {
        let mut sub = Mux::new();
        f(&mut sub);
        self.mount(pattern, sub);
    }

    /// Mounts `sub` under `pattern`: requests below the prefix descend
    /// into the sub-router with the unconsumed tail as their path. The
    /// sub-router inherits this router's not-found and
    /// method-not-allowed responders for any it has not set itself.
    ///
    /// # Panics
    ///
    /// Panics when something is already mounted at `pattern`.
    pub fn mount(&mut self, pattern: &str, sub: Mux) {
        let parent_not_found = self.not_found.read().expect(POISONED).clone();
        if sub.not_found.read().expect(POISONED).is_none() {
            if let Some(h) = parent_not_found {
                sub.install_not_found(h);
            }
        }
        let parent_mna = self.method_not_allowed.read().expect(POISONED).clone();
        if sub.method_not_allowed.read().expect(POISONED).is_none() {
            if let Some(h) = parent_mna {
                sub.install_method_not_allowed(h);
            }
        }

        let sub = Arc::new(sub);
        let target = Arc::clone(&sub);
        let shim: HandlerFn = Arc::new(move |ctx: &mut RequestCtx| target.serve(ctx));
        self.mount_inner(pattern, shim, Some(sub));
    }

    /// Mounts an opaque handler under `pattern`. Like [`Mux::mount`]
    /// but without sub-router traversal or responder propagation.
    pub fn mount_handler(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.mount_inner(pattern, Arc::new(handler), None);
    }

    fn mount_inner(&mut self, pattern: &str, handler: HandlerFn, subroutes: Option<Arc<Mux>>) {
        {
            let tree = self.tree.read().expect(POISONED);
            if tree.find_pattern(&format!("{pattern}*"))
                || tree.find_pattern(&format!("{pattern}/*"))
            {
                panic!("phi: attempting to mount a handler on an existing path, '{pattern}'");
            }
        }
        debug!(pattern, "mounting handler");

        // entering the mount rewrites the routing path to the
        // unconsumed tail before dispatching into the target
        let mount_handler: HandlerFn = Arc::new(move |ctx: &mut RequestCtx| {
            if let Some(rctx) = route_context_mut(ctx) {
                rctx.route_path = next_route_path(rctx);
            }
            handler(ctx);
        });

        let mut pattern = pattern.to_owned();
        if pattern.is_empty() || !pattern.ends_with('/') {
            // `/prefix` dispatches into the target with an empty inner
            // path; `/prefix/` resolves to this router's not-found
            // responder, late-bound so later registration still wins
            let cell = Arc::clone(&self.not_found);
            let parent_not_found: HandlerFn = Arc::new(move |ctx: &mut RequestCtx| {
                let handler = cell.read().expect(POISONED).clone();
                match handler {
                    Some(h) => h(ctx),
                    None => ctx.not_found(),
                }
            });
            self.register_with(
                MethodMask::ALL | MethodMask::STUB,
                &pattern,
                Arc::clone(&mount_handler),
                None,
            );
            self.register_with(
                MethodMask::ALL | MethodMask::STUB,
                &format!("{pattern}/"),
                parent_not_found,
                None,
            );
            pattern.push('/');
        }

        let mut mask = MethodMask::ALL;
        if subroutes.is_some() {
            mask = mask | MethodMask::STUB;
        }
        self.register_with(mask, &format!("{pattern}*"), mount_handler, subroutes);
    }

    /// Registers `handler` for every HTTP method at `pattern`.
    pub fn handle(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(MethodMask::ALL, pattern, Arc::new(handler));
    }

    /// Registers `handler` for the named method. The name is
    /// case-insensitive.
    ///
    /// # Panics
    ///
    /// Panics when the method name is not a supported HTTP method.
    pub fn method(
        &mut self,
        method: &str,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        let name = method.to_ascii_uppercase();
        let Some(m) = Method::from_name(&name) else {
            panic!("phi: '{method}' http method is not supported.");
        };
        self.register(m.bit(), pattern, Arc::new(handler));
    }

    /// Registers a CONNECT handler at `pattern`.
    pub fn connect(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Connect.bit(), pattern, Arc::new(handler));
    }

    /// Registers a DELETE handler at `pattern`.
    pub fn delete(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Delete.bit(), pattern, Arc::new(handler));
    }

    /// Registers a GET handler at `pattern`.
    pub fn get(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Get.bit(), pattern, Arc::new(handler));
    }

    /// Registers a HEAD handler at `pattern`.
    pub fn head(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Head.bit(), pattern, Arc::new(handler));
    }

    /// Registers an OPTIONS handler at `pattern`.
    pub fn options(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Options.bit(), pattern, Arc::new(handler));
    }

    /// Registers a PATCH handler at `pattern`.
    pub fn patch(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Patch.bit(), pattern, Arc::new(handler));
    }

    /// Registers a POST handler at `pattern`.
    pub fn post(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Post.bit(), pattern, Arc::new(handler));
    }

    /// Registers a PUT handler at `pattern`.
    pub fn put(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Put.bit(), pattern, Arc::new(handler));
    }

    /// Registers a TRACE handler at `pattern`.
    pub fn trace(
        &mut self,
        pattern: &str,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        self.register(Method::Trace.bit(), pattern, Arc::new(handler));
    }

    /// Sets the responder for paths that match no route. On an inline
    /// mux the responder is wrapped in the inline stack and stored on
    /// the parent. Mounted sub-routers without their own responder
    /// inherit it.
    pub fn not_found(&mut self, handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static) {
        let mut h: HandlerFn = Arc::new(handler);
        if self.inline {
            h = self.middlewares.handler(h);
        }
        self.install_not_found(h);
    }

    /// Sets the responder for paths whose route has no handler for the
    /// request method. Propagates like [`Mux::not_found`].
    pub fn method_not_allowed(
        &mut self,
        handler: impl Fn(&mut RequestCtx) + Send + Sync + 'static,
    ) {
        let mut h: HandlerFn = Arc::new(handler);
        if self.inline {
            h = self.middlewares.handler(h);
        }
        self.install_method_not_allowed(h);
    }

    fn install_not_found(&self, h: HandlerFn) {
        {
            let mut cell = self.not_found.write().expect(POISONED);
            *cell = Some(h.clone());
        }
        self.update_sub_routes(|sub| {
            if sub.not_found.read().expect(POISONED).is_none() {
                sub.install_not_found(h.clone());
            }
        });
    }

    fn install_method_not_allowed(&self, h: HandlerFn) {
        {
            let mut cell = self.method_not_allowed.write().expect(POISONED);
            *cell = Some(h.clone());
        }
        self.update_sub_routes(|sub| {
            if sub.method_not_allowed.read().expect(POISONED).is_none() {
                sub.install_method_not_allowed(h.clone());
            }
        });
    }

    fn update_sub_routes(&self, f: impl Fn(&Mux)) {
        let subs: Vec<Arc<Mux>> = self
            .tree
            .read()
            .expect(POISONED)
            .routes()
            .into_iter()
            .filter_map(|route| route.subroutes)
            .collect();
        for sub in subs {
            f(&sub);
        }
    }

    /// Dispatches a request through the frozen middleware chain and the
    /// routing tree, writing the response into `ctx`.
    ///
    /// # Panics
    ///
    /// Panics when no routes have been registered on this mux.
    pub fn serve(&self, ctx: &mut RequestCtx) {
        let Some(handler) = self.handler.clone() else {
            panic!("phi: attempting to route to a mux with no handlers.");
        };

        // a parent router already installed a routing context; reuse it
        if ctx.user_value::<RouteContext>(ROUTE_CTX_KEY).is_some() {
            handler(ctx);
            return;
        }

        ctx.install_boxed(ROUTE_CTX_KEY, pool::acquire());
        handler(ctx);
        if let Some(rctx) = ctx.remove_boxed::<RouteContext>(ROUTE_CTX_KEY) {
            pool::release(rctx);
        }
    }

    /// Searches the routing tree for a handler matching `method` and
    /// `path`, descending into mounted sub-routers, without executing
    /// anything. The context accumulates captured parameters and
    /// matched patterns as a real dispatch would.
    pub fn match_route(&self, rctx: &mut RouteContext, method: &str, path: &str) -> bool {
        let Some(m) = Method::from_name(method) else {
            return false;
        };
        let found = {
            let tree = self.tree.read().expect(POISONED);
            tree.find_route(rctx, m, path)
        };
        match found {
            Some(route) => {
                if let Some(sub) = route.subroutes {
                    rctx.route_path = next_route_path(rctx);
                    let tail = rctx.route_path.clone();
                    return sub.match_route(rctx, method, &tail);
                }
                true
            }
            None => false,
        }
    }

    /// Returns the registered routes, mount stubs excluded.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.tree.read().expect(POISONED).routes()
    }

    /// Returns the middleware stack in use by this mux.
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }

    // Freezes the mux: composes the middleware stack around the tree
    // search exactly once. No Use is accepted afterwards.
    fn freeze(&mut self) {
        self.handler = Some(self.middlewares.handler(self.route_dispatcher()));
    }

    fn route_dispatcher(&self) -> HandlerFn {
        let tree = Arc::clone(&self.tree);
        let not_found = Arc::clone(&self.not_found);
        let method_not_allowed = Arc::clone(&self.method_not_allowed);
        Arc::new(move |ctx: &mut RequestCtx| {
            route_http(&tree, &not_found, &method_not_allowed, ctx);
        })
    }

    fn register(&mut self, mask: MethodMask, pattern: &str, handler: HandlerFn) {
        self.register_with(mask, pattern, handler, None);
    }

    fn register_with(
        &mut self,
        mask: MethodMask,
        pattern: &str,
        handler: HandlerFn,
        subroutes: Option<Arc<Mux>>,
    ) {
        if !pattern.starts_with('/') {
            panic!("phi: routing pattern must begin with '/' in '{pattern}'");
        }

        if !self.inline && self.handler.is_none() {
            self.freeze();
        }

        // inline muxes never freeze a shared stack; each endpoint gets
        // its own chain of the inherited middlewares
        let endpoint = if self.inline {
            if self.handler.is_none() {
                self.handler = Some(self.route_dispatcher());
            }
            self.middlewares.handler(handler)
        } else {
            handler
        };

        debug!(pattern, "route registered");
        let result = {
            let mut tree = self.tree.write().expect(POISONED);
            tree.insert_route(mask, pattern, endpoint, subroutes)
        };
        if let Err(err) = result {
            panic!("phi: {err}");
        }
    }
}

/// The tail path a mounted handler should route: `/` plus whatever the
/// catch-all at the mount point captured.
fn next_route_path(rctx: &RouteContext) -> String {
    let mut path = String::from("/");
    if let Some(("*", tail)) = rctx.last_param() {
        path.push_str(tail);
    }
    path
}

fn route_http(
    tree: &RwLock<Node>,
    not_found: &RwLock<Option<HandlerFn>>,
    method_not_allowed: &RwLock<Option<HandlerFn>>,
    ctx: &mut RequestCtx,
) {
    let req_method = ctx.method().to_owned();
    let req_path = ctx.path().to_owned();

    let (route_path, route_method) = {
        let rctx = route_context_mut(ctx).expect("phi: routing context missing from request");
        if rctx.route_method.is_empty() {
            rctx.route_method = req_method;
        }
        let method = rctx.route_method.clone();
        let path = if rctx.route_path.is_empty() {
            req_path
        } else {
            rctx.route_path.clone()
        };
        (path, method)
    };

    let Some(method) = Method::from_name(&route_method) else {
        respond(method_not_allowed, ctx, default_method_not_allowed);
        return;
    };

    let found = {
        let tree = tree.read().expect(POISONED);
        let rctx = route_context_mut(ctx).expect("phi: routing context missing from request");
        tree.find_route(rctx, method, &route_path)
    };

    match found {
        Some(route) => (route.handler)(ctx),
        None => {
            let hinted = route_context(ctx).is_some_and(|rctx| rctx.is_method_not_allowed());
            if hinted {
                respond(method_not_allowed, ctx, default_method_not_allowed);
            } else {
                respond(not_found, ctx, default_not_found);
            }
        }
    }
}

fn respond(cell: &RwLock<Option<HandlerFn>>, ctx: &mut RequestCtx, fallback: fn(&mut RequestCtx)) {
    let handler = cell.read().expect(POISONED).clone();
    match handler {
        Some(h) => h(ctx),
        None => fallback(ctx),
    }
}

fn default_not_found(ctx: &mut RequestCtx) {
    ctx.not_found();
}

fn default_method_not_allowed(ctx: &mut RequestCtx) {
    ctx.set_status(405);
}
