//! Mixing middleware styles in one pipeline.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=weft_middleware=debug cargo run -p weft --example basic
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use parking_lot::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weft::prelude::*;

/// Logs every request, then delegates.
fn logger(next: AppFunc) -> AppFunc {
    app_func(move |env: Environment| {
        info!(
            method = ?env.request_method(),
            path = ?env.request_path(),
            "incoming request"
        );
        next(env)
    })
}

/// Rejects requests without the configured header.
#[derive(Default)]
struct RequireHeader {
    next: RwLock<Option<AppFunc>>,
    header: RwLock<String>,
}

impl Initialize<AppFunc, (String,)> for RequireHeader {
    fn initialize(&self, next: AppFunc, (header,): (String,)) {
        *self.next.write() = Some(next);
        *self.header.write() = header;
    }
}

impl Invoke for RequireHeader {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        let header = self.header.read().clone();
        let next = self.next.read().clone();
        Box::pin(async move {
            match next {
                Some(next) if env.request_header(&header).is_some() => next(env).await,
                _ => {
                    env.set_response_status(StatusCode::UNAUTHORIZED);
                    env.write_response_body("missing credentials");
                }
            }
        })
    }
}

/// Produces a stage that reports how long the rest of the pipeline took.
struct Timing;

impl Generate<AppFunc> for Timing {
    type Output = AppFunc;

    fn generate(&self, next: AppFunc, (): ()) -> AppFunc {
        app_func(move |env: Environment| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let started = Instant::now();
                next(env.clone()).await;
                env.set_response_header(
                    "Server-Timing",
                    &format!("app;dur={}", started.elapsed().as_micros()),
                );
            })
        })
    }
}

/// Answers `503` once shutdown begins, built fresh for every composition.
struct Drain {
    next: AppFunc,
    shutdown: ShutdownSignal,
    grace: Duration,
}

impl Construct<AppFunc, (ShutdownSignal, Duration)> for Drain {
    fn construct(next: AppFunc, (shutdown, grace): (ShutdownSignal, Duration)) -> Self {
        Self {
            next,
            shutdown,
            grace,
        }
    }
}

impl Invoke for Drain {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        if self.shutdown.is_triggered() {
            env.set_response_status(StatusCode::SERVICE_UNAVAILABLE);
            env.set_response_header("Retry-After", &self.grace.as_secs().to_string());
            return Box::pin(async {});
        }
        (self.next)(env)
    }
}

fn hello() -> AppFunc {
    app_func(|env: Environment| {
        env.set_response_header("Content-Type", "text/plain");
        env.write_response_body("hello from weft");
        Box::pin(async {})
    })
}

async fn send(app: &AppFunc, path: &str, token: Option<&str>) -> anyhow::Result<()> {
    let mut request = http::Request::builder().uri(path);
    if let Some(token) = token {
        request = request.header("Authorization", token);
    }
    let response = serve_request(app, request.body(Full::new(Bytes::new()))?).await;

    let status = response.status();
    let timing = response
        .headers()
        .get("server-timing")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.into_body().collect().await?.to_bytes();
    println!(
        "{path} -> {status} {:?} (timing: {})",
        String::from_utf8_lossy(&body),
        timing.as_deref().unwrap_or("-")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (shutdown, trigger) = ShutdownSignal::channel();
    let builder = PipelineBuilder::with_properties(
        Properties::new(shutdown.clone())
            .with_default_terminal(Value::new(hello()))
            .with_extension("host.AppName", "weft-basic"),
    );

    let app = builder
        .use_fn(logger)?
        .register(
            Component::builder(Arc::new(Timing)).generator::<AppFunc, ()>(),
            Vec::new(),
        )?
        .register(
            TypeDescriptor::builder::<Drain>()
                .constructor::<AppFunc, (ShutdownSignal, Duration)>()
                .exposing::<AppFunc>(),
            vec![Arg::new(shutdown), Arg::new(Duration::from_secs(5))],
        )?
        .register(
            Component::builder(Arc::new(RequireHeader::default()))
                .initializer::<AppFunc, (String,)>()
                .exposing::<AppFunc>(),
            vec![Arg::new(String::from("Authorization"))],
        )?
        .build_app()?;

    send(&app, "/hello", None).await?;
    send(&app, "/hello", Some("Bearer demo")).await?;

    trigger.trigger();
    send(&app, "/hello", Some("Bearer demo")).await?;

    Ok(())
}
