//! The response half of the request/response context.

use std::collections::HashMap;

/// An HTTP response under construction: status code, headers, and body
/// bytes. Handlers and middleware mutate it through
/// [`RequestCtx`](crate::RequestCtx) or directly.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a 200 response with plain text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body.into().into_bytes())
    }

    /// Creates a 200 response with HTML content.
    pub fn html(body: impl Into<String>) -> Self {
        Self::ok()
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body.into().into_bytes())
    }

    /// Creates a 200 response with JSON content, or a 500 response when
    /// serialization fails.
    pub fn json<T: serde::Serialize>(data: &T) -> Self {
        match serde_json::to_vec(data) {
            Ok(body) => Self::ok()
                .header("Content-Type", "application/json")
                .body(body),
            Err(_) => Self::internal_server_error(),
        }
    }

    /// Creates a 302 redirect response.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::new(302).header("Location", url)
    }

    /// Creates the default 404 response.
    pub fn not_found() -> Self {
        Self::new(404).body(&b"404 Page not found"[..])
    }

    /// Creates the default 405 response (empty body).
    pub fn method_not_allowed() -> Self {
        Self::new(405)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_server_error() -> Self {
        Self::new(500).body(&b"Internal Server Error"[..])
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the status code.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Returns the body as a string, if it is valid UTF-8.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the reason phrase for the current status code.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let res = Response::text("hello");
        assert_eq!(res.status, 200);
        assert_eq!(
            res.headers.get("Content-Type").map(String::as_str),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(res.body_string().as_deref(), Some("hello"));
    }

    #[test]
    fn test_json_response() {
        let res = Response::json(&serde_json::json!({"name": "test"}));
        assert_eq!(res.status, 200);
        assert_eq!(
            res.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_redirect_response() {
        let res = Response::redirect("/login");
        assert_eq!(res.status, 302);
        assert_eq!(
            res.headers.get("Location").map(String::as_str),
            Some("/login")
        );
    }

    #[test]
    fn test_write_appends() {
        let mut res = Response::ok();
        res.write(b"a");
        res.write(b"b");
        assert_eq!(res.body_string().as_deref(), Some("ab"));
    }

    #[test]
    fn test_default_fallback_bodies() {
        assert_eq!(
            Response::not_found().body_string().as_deref(),
            Some("404 Page not found")
        );
        assert!(Response::method_not_allowed().body.is_empty());
        assert_eq!(Response::method_not_allowed().status, 405);
    }
}
