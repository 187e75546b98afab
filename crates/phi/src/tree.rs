//! The routing tree: a compressed prefix trie keyed by path bytes.
//!
//! Each node carries a static prefix and up to three kinds of children,
//! searched in priority order: static (indexed by first byte), then a
//! single parameter child, then a single catch-all child. Endpoints
//! live in per-node method tables.

use std::mem;
use std::sync::Arc;

use crate::chain::HandlerFn;
use crate::context::RouteContext;
use crate::error::{Result, RouterError};
use crate::method::{Method, MethodMask};
use crate::mux::{Mux, RouteInfo};
use crate::pattern::{self, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param,
    CatchAll,
}

/// A handler installed at a node for one method slot.
struct Endpoint {
    /// A single concrete method bit, or `ALL`.
    slot: MethodMask,
    /// Mount-internal entry, dispatchable but hidden from enumeration.
    stub: bool,
    handler: HandlerFn,
    pattern: String,
}

/// The result of a successful search: everything the dispatcher needs,
/// cloned out of the tree so no borrow outlives the tree lock.
pub(crate) struct FoundRoute {
    pub(crate) handler: HandlerFn,
    pub(crate) pattern: String,
    pub(crate) subroutes: Option<Arc<Mux>>,
}

pub(crate) struct Node {
    kind: NodeKind,
    /// Bytes this node contributes to a static edge; empty for
    /// parameter and catch-all nodes.
    prefix: Vec<u8>,
    /// Parameter name for param nodes; `*` for catch-all nodes.
    param_name: String,
    /// First byte of each static child, parallel to `static_children`.
    indices: Vec<u8>,
    static_children: Vec<Node>,
    param_child: Option<Box<Node>>,
    catch_all: Option<Box<Node>>,
    endpoints: Vec<Endpoint>,
    /// Mounted sub-router, recorded for traversal and responder
    /// propagation.
    subroutes: Option<Arc<Mux>>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new_static(&[])
    }
}

impl Node {
    fn new_static(prefix: &[u8]) -> Self {
        Self {
            kind: NodeKind::Static,
            prefix: prefix.to_vec(),
            param_name: String::new(),
            indices: Vec::new(),
            static_children: Vec::new(),
            param_child: None,
            catch_all: None,
            endpoints: Vec::new(),
            subroutes: None,
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            kind: NodeKind::Param,
            param_name: name.to_owned(),
            ..Self::default()
        }
    }

    fn new_catch_all() -> Self {
        Self {
            kind: NodeKind::CatchAll,
            param_name: "*".to_owned(),
            ..Self::default()
        }
    }

    /// Grafts `pattern` onto the tree and installs `handler` under the
    /// methods in `mask` at the terminal node.
    pub(crate) fn insert_route(
        &mut self,
        mask: MethodMask,
        pattern: &str,
        handler: HandlerFn,
        subroutes: Option<Arc<Mux>>,
    ) -> Result<()> {
        let segments = pattern::parse(pattern)?;

        let mut current = self;
        for segment in &segments {
            current = match segment {
                Segment::Static(run) => current.static_edge(run),
                Segment::Param(name) => current.param_edge(name, pattern)?,
                Segment::CatchAll => current.catch_all_edge(),
            };
        }

        current.set_endpoint(mask, handler, pattern);
        if subroutes.is_some() {
            current.subroutes = subroutes;
        }
        Ok(())
    }

    /// Descends through static children consuming `run`, splitting
    /// shared prefixes and creating nodes as needed.
    fn static_edge(&mut self, run: &[u8]) -> &mut Node {
        let mut current = self;
        let mut rest = run;
        while !rest.is_empty() {
            match current.indices.iter().position(|&b| b == rest[0]) {
                Some(idx) => {
                    let common = common_prefix_len(rest, &current.static_children[idx].prefix);
                    if common < current.static_children[idx].prefix.len() {
                        // split edge
                        current.static_children[idx].split_at(common);
                    }
                    rest = &rest[common..];
                    current = &mut current.static_children[idx];
                }
                None => {
                    current.indices.push(rest[0]);
                    current.static_children.push(Node::new_static(rest));
                    let last = current.static_children.len() - 1;
                    current = &mut current.static_children[last];
                    rest = &[];
                }
            }
        }
        current
    }

    /// Splits this static node at `at`: the node keeps the shared
    /// prefix and the remainder is re-parented beneath it.
    fn split_at(&mut self, at: usize) {
        debug_assert_eq!(self.kind, NodeKind::Static);
        debug_assert!(at > 0 && at < self.prefix.len());
        let rest = Node {
            kind: NodeKind::Static,
            prefix: self.prefix.split_off(at),
            param_name: String::new(),
            indices: mem::take(&mut self.indices),
            static_children: mem::take(&mut self.static_children),
            param_child: self.param_child.take(),
            catch_all: self.catch_all.take(),
            endpoints: mem::take(&mut self.endpoints),
            subroutes: self.subroutes.take(),
        };
        self.indices = vec![rest.prefix[0]];
        self.static_children = vec![rest];
    }

    /// Descends into the unique parameter child, creating it if absent.
    /// A child with a different name is a registration conflict.
    fn param_edge(&mut self, name: &str, pattern: &str) -> Result<&mut Node> {
        if let Some(existing) = self.param_child.as_deref() {
            if existing.param_name != name {
                return Err(RouterError::ParamNameConflict {
                    existing: existing.param_name.clone(),
                    new: name.to_owned(),
                    pattern: pattern.to_owned(),
                });
            }
        }
        Ok(self
            .param_child
            .get_or_insert_with(|| Box::new(Node::new_param(name))))
    }

    fn catch_all_edge(&mut self) -> &mut Node {
        self.catch_all
            .get_or_insert_with(|| Box::new(Node::new_catch_all()))
    }

    fn set_endpoint(&mut self, mask: MethodMask, handler: HandlerFn, pattern: &str) {
        let stub = mask.contains(MethodMask::STUB);
        if mask.contains(MethodMask::ALL) {
            self.put_endpoint(MethodMask::ALL, stub, handler.clone(), pattern);
        }
        for method in Method::ALL {
            if mask.contains(method.bit()) {
                self.put_endpoint(method.bit(), stub, handler.clone(), pattern);
            }
        }
    }

    // re-registration on the same slot overwrites
    fn put_endpoint(&mut self, slot: MethodMask, stub: bool, handler: HandlerFn, pattern: &str) {
        let endpoint = Endpoint {
            slot,
            stub,
            handler,
            pattern: pattern.to_owned(),
        };
        match self.endpoints.iter_mut().find(|e| e.slot == slot) {
            Some(existing) => *existing = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }

    /// A concrete method resolves to its own slot first, then to the
    /// `ALL` slot.
    fn endpoint_for(&self, method: Method) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.slot == method.bit())
            .or_else(|| self.endpoints.iter().find(|e| e.slot == MethodMask::ALL))
    }

    /// Walks `path` against the tree, capturing parameters into `rctx`.
    /// On a hit the matched pattern is pushed onto the context's
    /// pattern stack; on a near miss (node matched, method did not) the
    /// context's method-not-allowed hint is set.
    pub(crate) fn find_route(
        &self,
        rctx: &mut RouteContext,
        method: Method,
        path: &str,
    ) -> Option<FoundRoute> {
        rctx.begin_layer();
        let found = self.find(rctx, method, path.as_bytes());
        if let Some(found) = &found {
            rctx.commit_params();
            rctx.route_patterns.push(found.pattern.clone());
        }
        found
    }

    fn find(&self, rctx: &mut RouteContext, method: Method, path: &[u8]) -> Option<FoundRoute> {
        if path.is_empty() {
            // end of path at this node
            if !self.endpoints.is_empty() {
                if let Some(endpoint) = self.endpoint_for(method) {
                    return Some(self.found(endpoint));
                }
                rctx.set_method_not_allowed();
            }
        } else {
            // static children first: at most one can match a given
            // first byte
            if let Some(idx) = self.indices.iter().position(|&b| b == path[0]) {
                let child = &self.static_children[idx];
                if path.starts_with(&child.prefix) {
                    if let Some(found) = child.find(rctx, method, &path[child.prefix.len()..]) {
                        return Some(found);
                    }
                }
            }

            // then the parameter child; a param never binds an empty
            // segment
            if let Some(child) = self.param_child.as_deref() {
                let end = path
                    .iter()
                    .position(|&b| b == b'/')
                    .unwrap_or(path.len());
                if end > 0 {
                    let mark = rctx.params_len();
                    rctx.push_param(
                        &child.param_name,
                        String::from_utf8_lossy(&path[..end]).into_owned(),
                    );
                    if let Some(found) = child.find(rctx, method, &path[end..]) {
                        return Some(found);
                    }
                    rctx.truncate_params(mark);
                }
            }
        }

        // finally the catch-all child, which may bind an empty
        // remainder
        if let Some(child) = self.catch_all.as_deref() {
            if !child.endpoints.is_empty() {
                if let Some(endpoint) = child.endpoint_for(method) {
                    rctx.push_param("*", String::from_utf8_lossy(path).into_owned());
                    return Some(child.found(endpoint));
                }
                rctx.set_method_not_allowed();
            }
        }

        None
    }

    fn found(&self, endpoint: &Endpoint) -> FoundRoute {
        FoundRoute {
            handler: endpoint.handler.clone(),
            pattern: endpoint.pattern.clone(),
            subroutes: self.subroutes.clone(),
        }
    }

    /// Reports whether an endpoint is already registered at exactly
    /// `pattern`. Used to detect double mounts; accepts the raw probe
    /// string without full grammar validation.
    pub(crate) fn find_pattern(&self, pattern: &str) -> bool {
        let mut current = self;
        let mut rest = pattern.as_bytes();
        loop {
            if rest.is_empty() {
                return !current.endpoints.is_empty();
            }
            match rest[0] {
                b'{' => {
                    let Some(close) = rest.iter().position(|&b| b == b'}') else {
                        return false;
                    };
                    let name = &rest[1..close];
                    match current.param_child.as_deref() {
                        Some(child) if child.param_name.as_bytes() == name => {
                            current = child;
                            rest = &rest[close + 1..];
                        }
                        _ => return false,
                    }
                }
                b'*' => {
                    return current
                        .catch_all
                        .as_deref()
                        .is_some_and(|c| !c.endpoints.is_empty());
                }
                _ => {
                    let end = rest
                        .iter()
                        .position(|&b| b == b'{' || b == b'*')
                        .unwrap_or(rest.len());
                    let mut run = &rest[..end];
                    rest = &rest[end..];
                    while !run.is_empty() {
                        let Some(idx) = current.indices.iter().position(|&b| b == run[0]) else {
                            return false;
                        };
                        let child = &current.static_children[idx];
                        if !run.starts_with(&child.prefix) {
                            return false;
                        }
                        run = &run[child.prefix.len()..];
                        current = child;
                    }
                }
            }
        }
    }

    /// Flattens the tree into traversal records. Mount-internal stubs
    /// without a sub-router are skipped.
    pub(crate) fn routes(&self) -> Vec<RouteInfo> {
        let mut out = Vec::new();
        self.collect_routes(&mut out);
        out
    }

    fn collect_routes(&self, out: &mut Vec<RouteInfo>) {
        if !self.endpoints.is_empty() {
            let stub = self.endpoints.iter().any(|e| e.stub);
            if !stub || self.subroutes.is_some() {
                let mut methods = Vec::new();
                for endpoint in &self.endpoints {
                    if endpoint.slot == MethodMask::ALL {
                        methods.push("*");
                    } else if let Some(m) = Method::ALL.iter().find(|m| m.bit() == endpoint.slot) {
                        methods.push(m.as_str());
                    }
                }
                out.push(RouteInfo {
                    pattern: self.endpoints[0].pattern.clone(),
                    methods,
                    subroutes: self.subroutes.clone(),
                });
            }
        }
        for child in &self.static_children {
            child.collect_routes(out);
        }
        if let Some(child) = self.param_child.as_deref() {
            child.collect_routes(out);
        }
        if let Some(child) = self.catch_all.as_deref() {
            child.collect_routes(out);
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
