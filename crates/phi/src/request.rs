//! The request/response context handlers operate on.
//!
//! The host runtime builds one [`RequestCtx`] per request and hands it
//! to [`Mux::serve`](crate::Mux::serve). The router only reads the
//! method and path and stores its routing context in the user-value
//! bag; everything else is surface for handlers and middleware.

use std::any::Any;
use std::collections::HashMap;

use crate::response::Response;

/// A request/response context: the request line, request headers and
/// body, a typed key/value bag for request-scoped values, and the
/// response under construction.
pub struct RequestCtx {
    method: String,
    path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
    user_values: HashMap<String, Box<dyn Any + Send + Sync>>,
    /// The response being built for this request.
    pub response: Response,
}

impl RequestCtx {
    /// Creates a context for `method` and `path`. The method is matched
    /// verbatim at dispatch; hosts are expected to pass the canonical
    /// uppercase form.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            user_values: HashMap::new(),
            response: Response::ok(),
        }
    }

    /// Creates a GET request context.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// Creates a POST request context.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    /// The request method, as received.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw request path. Values captured from it are not
    /// URL-decoded by the router.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sets a request header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets a request header, case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Parses the request body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Stores a request-scoped value under `key`.
    pub fn set_user_value<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.user_values.insert(key.into(), Box::new(value));
    }

    /// Returns the value stored under `key`, if it has type `T`.
    pub fn user_value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.user_values.get(key)?.downcast_ref::<T>()
    }

    /// Mutable variant of [`user_value`](Self::user_value).
    pub fn user_value_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.user_values.get_mut(key)?.downcast_mut::<T>()
    }

    pub(crate) fn install_boxed<T: Any + Send + Sync>(&mut self, key: &str, value: Box<T>) {
        self.user_values.insert(key.to_owned(), value);
    }

    pub(crate) fn remove_boxed<T: Any + Send + Sync>(&mut self, key: &str) -> Option<Box<T>> {
        self.user_values.remove(key)?.downcast::<T>().ok()
    }

    /// Appends text to the response body.
    pub fn write_str(&mut self, s: &str) {
        self.response.write(s.as_bytes());
    }

    /// Appends bytes to the response body.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.response.write(bytes);
    }

    /// Serializes `value` as JSON into the response body and sets the
    /// content type, or sets a 500 status when serialization fails.
    pub fn write_json<T: serde::Serialize>(&mut self, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.set_header("Content-Type", "application/json");
                self.response.write(&bytes);
            }
            Err(_) => self.set_status(500),
        }
    }

    /// Sets the response status code.
    pub fn set_status(&mut self, status: u16) {
        self.response.status = status;
    }

    /// Sets a response header.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.response.headers.insert(key.into(), value.into());
    }

    /// Resets the response to the host's default 404: status 404 with
    /// body `404 Page not found`.
    pub fn not_found(&mut self) {
        self.response.status = 404;
        self.response.body.clear();
        self.response.write(b"404 Page not found");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let ctx = RequestCtx::get("/users")
            .header("Content-Type", "application/json")
            .body("{}");

        assert_eq!(ctx.method(), "GET");
        assert_eq!(ctx.path(), "/users");
        assert_eq!(ctx.get_header("content-type"), Some("application/json"));
        assert_eq!(ctx.body, b"{}");
    }

    #[test]
    fn test_user_values_are_typed() {
        let mut ctx = RequestCtx::get("/");
        ctx.set_user_value("user", "peter".to_owned());
        ctx.set_user_value("count", 3u64);

        assert_eq!(ctx.user_value::<String>("user").map(String::as_str), Some("peter"));
        assert_eq!(ctx.user_value::<u64>("count"), Some(&3));
        // wrong type or missing key both come back empty
        assert_eq!(ctx.user_value::<u64>("user"), None);
        assert_eq!(ctx.user_value::<u64>("missing"), None);

        *ctx.user_value_mut::<u64>("count").unwrap() += 1;
        assert_eq!(ctx.user_value::<u64>("count"), Some(&4));
    }

    #[test]
    fn test_response_write_helpers() {
        let mut ctx = RequestCtx::get("/");
        ctx.write_str("hello ");
        ctx.write_bytes(b"world");
        ctx.set_status(201);
        ctx.set_header("X-Test", "1");

        assert_eq!(ctx.response.status, 201);
        assert_eq!(ctx.response.body_string().as_deref(), Some("hello world"));
        assert_eq!(
            ctx.response.headers.get("X-Test").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_default_not_found_replaces_body() {
        let mut ctx = RequestCtx::get("/");
        ctx.write_str("partial");
        ctx.not_found();

        assert_eq!(ctx.response.status, 404);
        assert_eq!(
            ctx.response.body_string().as_deref(),
            Some("404 Page not found")
        );
    }
}
