//! End-to-end tests for pipeline composition.
//!
//! Each test builds a pipeline through the public API only and drives it the
//! way a host would.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use parking_lot::{Mutex, RwLock};
use weft_core::{
    app_func, AppFunc, Arg, BoxFuture, Environment, Invoke, PipelineError, Shape, Value,
};
use weft_middleware::{
    serve_request, Component, Construct, ConversionRegistry, Converter, Generate, Initialize,
    MiddlewareKind, PipelineBuilder, Properties, ShutdownSignal, TypeDescriptor,
};

type Log = Arc<Mutex<Vec<String>>>;

/// A plain callable that records `label` and delegates.
fn recording(log: &Log, label: &'static str) -> impl Fn(AppFunc) -> AppFunc + Send + Sync {
    let log = Arc::clone(log);
    move |next: AppFunc| -> AppFunc {
        let log = Arc::clone(&log);
        app_func(move |env: Environment| {
            log.lock().push(label.to_owned());
            next(env)
        })
    }
}

fn recording_terminal(log: &Log) -> Value {
    let log = Arc::clone(log);
    let terminal = app_func(move |env: Environment| {
        log.lock().push("terminal".to_owned());
        env.set_response_status(StatusCode::OK);
        Box::pin(async {})
    });
    Value::new(terminal)
}

fn builder_with_terminal(log: &Log) -> PipelineBuilder {
    PipelineBuilder::with_properties(
        Properties::new(ShutdownSignal::never()).with_default_terminal(recording_terminal(log)),
    )
}

/// Rejects requests that lack a configured header.
#[derive(Default)]
struct Auth {
    next: RwLock<Option<AppFunc>>,
    header: RwLock<String>,
}

impl Initialize<AppFunc> for Auth {
    fn initialize(&self, next: AppFunc, (): ()) {
        *self.next.write() = Some(next);
        *self.header.write() = "X".to_owned();
    }
}

impl Initialize<AppFunc, (String,)> for Auth {
    fn initialize(&self, next: AppFunc, (header,): (String,)) {
        *self.next.write() = Some(next);
        *self.header.write() = header;
    }
}

impl Invoke for Auth {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        let header = self.header.read().clone();
        let next = self.next.read().clone();
        Box::pin(async move {
            match next {
                Some(next) if env.request_header(&header).is_some() => next(env).await,
                _ => env.set_response_status(StatusCode::UNAUTHORIZED),
            }
        })
    }
}

fn auth() -> Component {
    Component::builder(Arc::new(Auth::default()))
        .initializer::<AppFunc, ()>()
        .initializer::<AppFunc, (String,)>()
        .exposing::<AppFunc>()
        .build()
}

#[tokio::test]
async fn test_empty_pipeline_is_not_found() {
    let app = PipelineBuilder::new(ShutdownSignal::never())
        .build_app()
        .unwrap();

    let env = Environment::new();
    app(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_registration_order_is_execution_order() {
    let log = Log::default();
    let app = builder_with_terminal(&log)
        .use_fn(recording(&log, "a"))
        .unwrap()
        .use_fn(recording(&log, "b"))
        .unwrap()
        .use_fn(recording(&log, "c"))
        .unwrap()
        .build_app()
        .unwrap();

    app(Environment::new()).await;
    assert_eq!(*log.lock(), vec!["a", "b", "c", "terminal"]);
}

#[test]
fn test_conversion_to_own_shape_is_identity() {
    let value = Value::new(app_func(|_env| Box::pin(async {})));
    let converted = Converter::new(&ConversionRegistry::new())
        .convert(Shape::of::<AppFunc>(), Some(value.clone()))
        .unwrap()
        .unwrap();
    assert!(converted.ptr_eq(&value));
}

#[derive(Debug, PartialEq)]
struct Meters(f64);

#[derive(Debug, PartialEq)]
struct Feet(f64);

#[derive(Debug, PartialEq)]
struct Label(String);

#[test]
fn test_two_conversions_compose() {
    let registry = ConversionRegistry::new();
    let f = |m: Arc<Meters>| Arc::new(Feet(m.0 * 3.25));
    let g = |ft: Arc<Feet>| Label(format!("{} ft", ft.0));
    registry.add(f);
    registry.add(g);

    let converted = Converter::new(&registry)
        .convert(Shape::of::<Label>(), Some(Value::new(Arc::new(Meters(2.0)))))
        .unwrap()
        .unwrap();
    let expected = g(f(Arc::new(Meters(2.0))));
    assert_eq!(converted.downcast_ref::<Label>(), Some(&expected));
}

#[test]
fn test_unrelated_shapes_fail_without_conversions() {
    let err = Converter::new(&ConversionRegistry::new())
        .convert(Shape::of::<Label>(), Some(Value::new(Arc::new(Meters(1.0)))))
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoConversionPath { .. }));
}

#[tokio::test]
async fn test_callable_takes_priority_over_initializer() {
    let log = Log::default();
    let component = Component::builder(Arc::new(Auth::default()))
        .callable(recording(&log, "callable"))
        .initializer::<AppFunc, ()>()
        .exposing::<AppFunc>()
        .build();

    let builder = builder_with_terminal(&log)
        .register(component, Vec::new())
        .unwrap();
    assert_eq!(builder.entries()[0].kind(), MiddlewareKind::Callable);

    // The initializer would reject a request without "X".
    builder.build_app().unwrap()(Environment::new()).await;
    assert_eq!(*log.lock(), vec!["callable", "terminal"]);
}

struct Delay {
    next: AppFunc,
}

impl Construct<AppFunc, (u64, String)> for Delay {
    fn construct(next: AppFunc, (_millis, _reason): (u64, String)) -> Self {
        Self { next }
    }
}

impl Invoke for Delay {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        (self.next)(env)
    }
}

#[test]
fn test_constructor_arity_mismatch_is_reported() {
    let descriptor = TypeDescriptor::builder::<Delay>()
        .constructor::<AppFunc, (u64, String)>()
        .exposing::<AppFunc>();

    let err = PipelineBuilder::default()
        .register(descriptor, vec![Arg::new(5_u64)])
        .unwrap_err();
    match err {
        PipelineError::NoMatchingConstructor {
            type_name,
            extra_args,
        } => {
            assert!(type_name.ends_with("Delay"));
            assert_eq!(extra_args, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_logger_then_auth_rejects_without_header() {
    let log = Log::default();
    let app = builder_with_terminal(&log)
        .use_fn(recording(&log, "logger"))
        .unwrap()
        .register(auth(), Vec::new())
        .unwrap()
        .build_app()
        .unwrap();

    let env = Environment::new();
    app(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(*log.lock(), vec!["logger"]);

    env.set_request_header("X", "token");
    app(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::OK));
    assert_eq!(*log.lock(), vec!["logger", "logger", "terminal"]);
}

#[tokio::test]
async fn test_auth_header_from_extra_argument() {
    let log = Log::default();
    let builder = builder_with_terminal(&log)
        .register(auth(), vec![Arg::new(String::from("Api-Key"))])
        .unwrap();
    assert_eq!(builder.entries()[0].kind(), MiddlewareKind::InitInvoke);
    let app = builder.build_app().unwrap();

    let env = Environment::new();
    env.set_request_header("X", "wrong header");
    app(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::UNAUTHORIZED));

    env.set_request_header("api-key", "k");
    app(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::OK));
}

/// Produces a stage that stamps a response header.
struct Stamp;

impl Generate<AppFunc, (&'static str,)> for Stamp {
    type Output = AppFunc;

    fn generate(&self, next: AppFunc, (value,): (&'static str,)) -> AppFunc {
        app_func(move |env: Environment| {
            env.set_response_header("X-Stamp", value);
            next(env)
        })
    }
}

/// A stage shape that is not the terminal contract.
type Handler = Arc<dyn Fn(Environment) -> StatusCode + Send + Sync>;

fn handler_to_app(handler: Handler) -> AppFunc {
    app_func(move |env: Environment| {
        let status = handler(env.clone());
        env.set_response_status(status);
        Box::pin(async {})
    })
}

/// Answers 503 once shutdown has been requested.
struct Gate {
    next: AppFunc,
    shutdown: ShutdownSignal,
}

impl Construct<AppFunc, (ShutdownSignal,)> for Gate {
    fn construct(next: AppFunc, (shutdown,): (ShutdownSignal,)) -> Self {
        Self { next, shutdown }
    }
}

impl Invoke for Gate {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        if self.shutdown.is_triggered() {
            env.set_response_status(StatusCode::SERVICE_UNAVAILABLE);
            return Box::pin(async {});
        }
        (self.next)(env)
    }
}

fn get(uri: &str) -> weft_middleware::host::Request {
    http::Request::builder()
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn test_mixed_styles_over_http() {
    let (shutdown, trigger) = ShutdownSignal::channel();
    let builder = PipelineBuilder::new(shutdown).add_conversion_fn(handler_to_app);

    let handler: Handler = Arc::new(|env: Environment| {
        env.write_response_body("hello");
        StatusCode::ACCEPTED
    });
    builder
        .properties()
        .write()
        .set_default_terminal(Some(Value::new(handler)));

    let stamp = Component::builder(Arc::new(Stamp)).generator::<AppFunc, (&'static str,)>();
    let gate = TypeDescriptor::builder::<Gate>()
        .constructor::<AppFunc, (ShutdownSignal,)>()
        .exposing::<AppFunc>();
    let signal = builder.shutdown();

    let builder = builder
        .register(stamp, vec![Arg::new("v1")])
        .unwrap()
        .register(gate, vec![Arg::new(signal)])
        .unwrap();
    let kinds: Vec<MiddlewareKind> = builder.entries().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![MiddlewareKind::Generator, MiddlewareKind::Constructible]);
    let app = builder.build_app().unwrap();

    let response = serve_request(&app, get("/hello")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-stamp"], "v1");

    trigger.trigger();
    let response = serve_request(&app, get("/hello")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["x-stamp"], "v1");
}

struct Mounted(AppFunc);

/// Registers the conversion to [`Mounted`] through the registry it receives
/// as an extra argument.
#[derive(Default)]
struct Mount {
    next: RwLock<Option<AppFunc>>,
}

impl Initialize<AppFunc, (ConversionRegistry,)> for Mount {
    fn initialize(&self, next: AppFunc, (conversions,): (ConversionRegistry,)) {
        *self.next.write() = Some(next);
        conversions.add(|app: AppFunc| Arc::new(Mounted(app)));
    }
}

impl Invoke for Mount {
    fn invoke(self: Arc<Self>, env: Environment) -> BoxFuture<'static, ()> {
        let next = self.next.read().clone();
        Box::pin(async move {
            if let Some(next) = next {
                next(env).await;
            }
        })
    }
}

#[tokio::test]
async fn test_conversion_registered_during_composition_is_used() {
    let builder = PipelineBuilder::default();
    assert!(matches!(
        builder.build::<Arc<Mounted>>(),
        Err(PipelineError::NoConversionPath { .. })
    ));

    let conversions = Arg::new(builder.conversions());
    let builder = builder
        .register(
            Component::builder(Arc::new(Mount::default()))
                .initializer::<AppFunc, (ConversionRegistry,)>()
                .exposing::<AppFunc>(),
            vec![conversions],
        )
        .unwrap();
    assert!(builder.conversions().is_empty());

    let mounted = builder.build::<Arc<Mounted>>().unwrap();
    assert_eq!(builder.conversions().len(), 1);

    let env = Environment::new();
    (mounted.0)(env.clone()).await;
    assert_eq!(env.response_status(), Some(StatusCode::NOT_FOUND));
}

/// A constructible stage with no declared entry point.
struct Relay {
    next: AppFunc,
}

impl Construct<AppFunc> for Relay {
    fn construct(next: AppFunc, (): ()) -> Self {
        Self { next }
    }
}

#[tokio::test]
async fn test_constructed_instance_reaches_arc_conversion() {
    let builder = PipelineBuilder::default()
        .register(
            TypeDescriptor::builder::<Relay>().constructor::<AppFunc, ()>(),
            Vec::new(),
        )
        .unwrap()
        .add_conversion_fn(|relay: Arc<Relay>| -> AppFunc {
            app_func(move |env: Environment| {
                env.set_response_header("X-Relay", "arc");
                (relay.next)(env)
            })
        });

    let app = builder.build_app().unwrap();
    let env = Environment::new();
    app(env.clone()).await;
    assert_eq!(env.response_header("x-relay").as_deref(), Some("arc"));
    assert_eq!(env.response_status(), Some(StatusCode::NOT_FOUND));
}
