//! The terminal contract: per-request environments and application functions.
//!
//! A host hands every request to the composed pipeline as an [`Environment`],
//! a mutable key-value map shared by every stage, and awaits the completion
//! future the [`AppFunc`] returns. The keys follow the OWIN conventions so
//! that middleware written against them can be mixed freely.
//!
//! ```text
//! host ──Environment──▶ AppFunc ──▶ middleware … ──▶ terminal
//!   ◀────────── completion (BoxFuture<'static, ()>) ─────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

use crate::value::EntryPoint;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The application function: takes a request environment and completes
/// asynchronously once the response has been written into it.
pub type AppFunc = Arc<dyn Fn(Environment) -> BoxFuture<'static, ()> + Send + Sync>;

/// Well-known environment keys.
pub mod keys {
    /// HTTP method of the request (`"GET"`, `"POST"`, …).
    pub const REQUEST_METHOD: &str = "owin.RequestMethod";
    /// Request path.
    pub const REQUEST_PATH: &str = "owin.RequestPath";
    /// Raw query string, without the leading `?`.
    pub const REQUEST_QUERY_STRING: &str = "owin.RequestQueryString";
    /// Request headers as an object keyed by lower-cased header name.
    pub const REQUEST_HEADERS: &str = "owin.RequestHeaders";
    /// Request body as UTF-8 text.
    pub const REQUEST_BODY: &str = "owin.RequestBody";
    /// Numeric response status code.
    pub const RESPONSE_STATUS_CODE: &str = "owin.ResponseStatusCode";
    /// Response headers as an object keyed by lower-cased header name.
    pub const RESPONSE_HEADERS: &str = "owin.ResponseHeaders";
    /// Response body as UTF-8 text.
    pub const RESPONSE_BODY: &str = "owin.ResponseBody";
}

/// A per-request key-value environment.
///
/// Cloning an `Environment` yields another handle to the same map, so every
/// stage of a pipeline observes the writes of the stages before it.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use weft_core::Environment;
///
/// let env = Environment::new();
/// env.set_request_header("X-Token", "abc");
/// assert_eq!(env.request_header("x-token").as_deref(), Some("abc"));
///
/// env.set_response_status(StatusCode::ACCEPTED);
/// assert_eq!(env.response_status(), Some(StatusCode::ACCEPTED));
/// ```
#[derive(Clone, Default)]
pub struct Environment {
    inner: Arc<Mutex<HashMap<String, JsonValue>>>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.inner.lock().get(key).cloned()
    }

    /// Returns the string stored under `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::to_owned)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.inner.lock().insert(key.into(), value.into())
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        self.inner.lock().remove(key)
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Returns the request method.
    #[must_use]
    pub fn request_method(&self) -> Option<String> {
        self.get_str(keys::REQUEST_METHOD)
    }

    /// Returns the request path.
    #[must_use]
    pub fn request_path(&self) -> Option<String> {
        self.get_str(keys::REQUEST_PATH)
    }

    /// Case-insensitive request header lookup.
    #[must_use]
    pub fn request_header(&self, name: &str) -> Option<String> {
        self.header(keys::REQUEST_HEADERS, name)
    }

    /// Sets a request header, replacing any previous value.
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.set_header(keys::REQUEST_HEADERS, name, value);
    }

    /// Returns the response status, if one has been set.
    #[must_use]
    pub fn response_status(&self) -> Option<StatusCode> {
        self.inner
            .lock()
            .get(keys::RESPONSE_STATUS_CODE)
            .and_then(JsonValue::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
    }

    /// Sets the response status.
    pub fn set_response_status(&self, status: StatusCode) {
        self.insert(keys::RESPONSE_STATUS_CODE, status.as_u16());
    }

    /// Case-insensitive response header lookup.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.header(keys::RESPONSE_HEADERS, name)
    }

    /// Sets a response header, replacing any previous value.
    pub fn set_response_header(&self, name: &str, value: &str) {
        self.set_header(keys::RESPONSE_HEADERS, name, value);
    }

    /// Returns all response headers.
    #[must_use]
    pub fn response_headers(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .get(keys::RESPONSE_HEADERS)
            .and_then(JsonValue::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_owned())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Appends text to the response body.
    pub fn write_response_body(&self, text: &str) {
        let mut map = self.inner.lock();
        let body = map
            .entry(keys::RESPONSE_BODY.to_owned())
            .or_insert_with(|| JsonValue::String(String::new()));
        match body {
            JsonValue::String(existing) => existing.push_str(text),
            other => *other = JsonValue::String(text.to_owned()),
        }
    }

    /// Returns the response body written so far.
    #[must_use]
    pub fn response_body(&self) -> Option<String> {
        self.get_str(keys::RESPONSE_BODY)
    }

    fn header(&self, key: &str, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.inner
            .lock()
            .get(key)
            .and_then(JsonValue::as_object)
            .and_then(|headers| headers.get(&name))
            .and_then(JsonValue::as_str)
            .map(str::to_owned)
    }

    fn set_header(&self, key: &str, name: &str, value: &str) {
        let mut map = self.inner.lock();
        let headers = map
            .entry(key.to_owned())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !headers.is_object() {
            *headers = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(headers) = headers {
            headers.insert(name.to_ascii_lowercase(), JsonValue::String(value.to_owned()));
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.lock().iter()).finish()
    }
}

/// Builds an [`AppFunc`] from a closure.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use weft_core::{app_func, AppFunc};
///
/// let ok: AppFunc = app_func(|env| {
///     env.set_response_status(StatusCode::OK);
///     Box::pin(async {})
/// });
/// ```
pub fn app_func<F>(f: F) -> AppFunc
where
    F: Fn(Environment) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The default terminal: marks the response as `404 Not Found` and completes
/// immediately.
#[must_use]
pub fn not_found() -> AppFunc {
    app_func(|env| {
        env.set_response_status(StatusCode::NOT_FOUND);
        Box::pin(std::future::ready(()))
    })
}

/// An object with an invocation entry point matching [`AppFunc`].
///
/// Every `Invoke` implementor can be bound as an `AppFunc` through its
/// [`EntryPoint`] implementation.
pub trait Invoke: Send + Sync + 'static {
    /// Handles one request.
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()>;
}

impl<T: Invoke> EntryPoint<AppFunc> for T {
    fn entry_point(self: Arc<Self>) -> AppFunc {
        app_func(move |env| Arc::clone(&self).invoke(env))
    }
}
