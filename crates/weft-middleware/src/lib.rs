//! # weft-middleware
//!
//! Signature adaptation and pipeline composition for weft.
//!
//! Middleware may be authored in any of four styles. This crate classifies
//! each registration, reconciles the shapes stages produce and consume, and
//! folds everything into one callable a host can serve requests with.
//!
//! ```text
//! register(mw, args) ──▶ resolver ──▶ MiddlewareEntry ─┐
//!                                                       │ build()
//!        terminal ◀── convert ◀── adapter ◀── convert ◀─┘  (last → first)
//! ```
//!
//! ## Authoring Styles
//!
//! | Style | Priority | Declared with |
//! |-------|----------|---------------|
//! | Plain callable | 1 | [`Component::from_fn`] |
//! | Init/invoke | 2 | [`Initialize`] + [`exposing`](ComponentBuilder::exposing) |
//! | Generator | 3 | [`Generate`] |
//! | Constructible | 4 | [`Construct`] on a [`TypeDescriptor`] |
//!
//! ## Conversions
//!
//! When a stage produces a value of a different shape than the stage before it
//! needs, the [`Converter`] tries, in order: the value itself, a declared entry
//! point, one registered conversion, then a registered conversion through one
//! intermediate shape.
//!
//! ## Example
//!
//! ```
//! use http::StatusCode;
//! use weft_core::{app_func, AppFunc, Environment};
//! use weft_middleware::{PipelineBuilder, ShutdownSignal};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), weft_core::PipelineError> {
//! let app = PipelineBuilder::new(ShutdownSignal::never())
//!     .use_fn(|_next: AppFunc| -> AppFunc {
//!         app_func(|env: Environment| {
//!             env.set_response_status(StatusCode::NO_CONTENT);
//!             Box::pin(async {})
//!         })
//!     })?
//!     .build_app()?;
//!
//! let env = Environment::new();
//! app(env.clone()).await;
//! assert_eq!(env.response_status(), Some(StatusCode::NO_CONTENT));
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/weft-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod component;
pub mod conversion;
pub mod convert;
pub mod host;
pub mod properties;
pub mod resolver;

// Re-export main types at crate root
pub use builder::PipelineBuilder;
pub use component::{
    Component, ComponentBuilder, Construct, Generate, Initialize, Middleware, TypeDescriptor,
    TypeDescriptorBuilder,
};
pub use conversion::{Conversion, ConversionRegistry};
pub use convert::Converter;
pub use host::serve_request;
pub use properties::{Properties, SharedProperties, ShutdownSignal, ShutdownTrigger};
pub use resolver::{resolve, MiddlewareEntry, MiddlewareKind};
