//! Bridge between `http` messages and the environment-based terminal contract.
//!
//! A server loop that owns the sockets can hand each request to a composed
//! [`AppFunc`] with [`serve_request`]; the response is assembled from what the
//! pipeline wrote into the [`Environment`].

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};
use weft_core::{keys, AppFunc, Environment};

/// The HTTP request type accepted by the bridge.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the bridge.
pub type Response = http::Response<Full<Bytes>>;

/// Builds the environment for `request`.
///
/// Header names are lower-cased. A header sent more than once is folded into
/// one entry, its values joined with `", "` in the order received. Values that
/// are not valid UTF-8 are skipped. The body is read as lossy UTF-8.
pub async fn environment_from_request(request: Request) -> Environment {
    let (parts, body) = request.into_parts();
    let env = Environment::new();

    env.insert(keys::REQUEST_METHOD, parts.method.as_str());
    env.insert(keys::REQUEST_PATH, parts.uri.path());
    env.insert(keys::REQUEST_QUERY_STRING, parts.uri.query().unwrap_or_default());

    let headers: Map<String, JsonValue> = parts
        .headers
        .keys()
        .filter_map(|name| {
            let values: Vec<&str> = parts
                .headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            if values.is_empty() {
                return None;
            }
            Some((name.as_str().to_owned(), JsonValue::from(values.join(", "))))
        })
        .collect();
    env.insert(keys::REQUEST_HEADERS, JsonValue::Object(headers));

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    env.insert(keys::REQUEST_BODY, String::from_utf8_lossy(&bytes).into_owned());

    env
}

/// Builds a response from what the pipeline wrote into `env`.
///
/// The status defaults to `200 OK`. Headers that are not valid HTTP header
/// names or values are dropped with a warning.
#[must_use]
pub fn response_from_environment(env: &Environment) -> Response {
    let status = env.response_status().unwrap_or(StatusCode::OK);
    let body = env.response_body().unwrap_or_default();

    let mut response = http::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;

    for (name, value) in env.response_headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }

    response
}

/// Runs `app` for `request` and returns the response it produced.
pub async fn serve_request(app: &AppFunc, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let env = environment_from_request(request).await;
    app(env.clone()).await;
    let response = response_from_environment(&env);

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "served request"
    );
    response
}
