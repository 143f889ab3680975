//! # weft-core
//!
//! Core types for the weft pipeline builder.
//!
//! weft composes independently authored middleware into a single application
//! function. Middleware may be written in several styles (a plain function,
//! an object with an initializer, a generator, or a constructible type), so
//! the builder needs a common vocabulary to describe and move values around
//! before their concrete types are known. That vocabulary lives here:
//!
//! - [`Shape`]: the runtime descriptor of a type
//! - [`Value`]: a type-erased value tagged with its shape
//! - [`Arg`], [`Param`], [`Argument`], [`Args`]: construction arguments and
//!   the matching rule between arguments and parameters
//! - [`Operation`]: a named, dynamically invocable function
//! - [`PipelineError`]: the error taxonomy
//!
//! It also defines the terminal contract most hosts build against:
//! [`Environment`], [`AppFunc`], and the default [`not_found`] terminal.
//!
//! ## Example
//!
//! ```
//! use weft_core::{Arg, Argument, Shape, Value};
//!
//! let arg = Arg::new(String::from("admin"));
//! assert!(String::param().accepts(&arg));
//! assert_eq!(String::extract(&arg).as_deref(), Some("admin"));
//! assert!(Shape::any().accepts(Value::new(1_u8).shape()));
//! ```

#![doc(html_root_url = "https://docs.rs/weft-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod args;
mod environment;
mod error;
mod operation;
mod shape;
mod value;

pub use args::{params_accept, Arg, Args, Argument, Param};
pub use environment::{app_func, keys, not_found, AppFunc, BoxFuture, Environment, Invoke};
pub use error::{PipelineError, PipelineResult};
pub use operation::Operation;
pub use shape::Shape;
pub use value::{Binding, EntryPoint, Value};
