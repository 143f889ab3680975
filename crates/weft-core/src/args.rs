//! Construction arguments and parameter matching.
//!
//! Middleware registration accepts trailing arguments that are forwarded to
//! the middleware's initializer, generator, or constructor. Each argument is an
//! [`Arg`]; each declared parameter is a [`Param`]. The [`Argument`] and
//! [`Args`] traits connect both to ordinary Rust types so that capability
//! traits can be written with typed signatures.
//!
//! # Matching rule
//!
//! An argument matches a parameter if it is present and its shape is accepted
//! by the parameter's shape, or if it is absent and the parameter is nullable.
//! Only `Option<T>` parameters are nullable.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::shape::Shape;
use crate::value::Value;

/// A single construction argument.
#[derive(Clone, Debug)]
pub enum Arg {
    /// No value was supplied.
    Absent,
    /// A supplied value.
    Present(Value),
}

impl Arg {
    /// Wraps `value` as a present argument.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::Present(Value::new(value))
    }

    /// Returns an absent argument.
    #[must_use]
    pub const fn absent() -> Self {
        Self::Absent
    }

    /// Returns `true` if no value was supplied.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the supplied value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }

    /// Consumes the argument, returning the supplied value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Present(value)
    }
}

impl From<Option<Value>> for Arg {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

/// A declared parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    shape: Shape,
    nullable: bool,
}

impl Param {
    /// A parameter that requires a value of `shape`.
    #[must_use]
    pub const fn required(shape: Shape) -> Self {
        Self {
            shape,
            nullable: false,
        }
    }

    /// A parameter that accepts a value of `shape` or absence.
    #[must_use]
    pub const fn nullable(shape: Shape) -> Self {
        Self {
            shape,
            nullable: true,
        }
    }

    /// The declared shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Whether absence is accepted.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns `true` if `arg` can be passed for this parameter.
    #[must_use]
    pub fn accepts(&self, arg: &Arg) -> bool {
        match arg {
            Arg::Absent => self.nullable,
            Arg::Present(value) => value.satisfies(self.shape),
        }
    }
}

/// Returns `true` if `args` match `params` one to one, in order.
#[must_use]
pub fn params_accept(params: &[Param], args: &[Arg]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| param.accepts(arg))
}

/// A Rust type that can be received as a single argument.
///
/// Implemented for the common scalar types, `String`, `&'static str`,
/// [`Duration`], [`StatusCode`], [`Value`] (accepts anything), every `Arc<T>`,
/// and `Option<T>` (nullable). Wrap other types in an `Arc`, or implement this
/// trait directly.
pub trait Argument: Sized + 'static {
    /// The parameter this type declares.
    fn param() -> Param;

    /// Extracts the typed value, or `None` if `arg` does not hold one.
    fn extract(arg: &Arg) -> Option<Self>;
}

macro_rules! impl_argument {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Argument for $ty {
                fn param() -> Param {
                    Param::required(Shape::of::<$ty>())
                }

                fn extract(arg: &Arg) -> Option<Self> {
                    arg.value()?.downcast_ref::<$ty>().cloned()
                }
            }
        )*
    };
}

impl_argument!(
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    String,
    &'static str,
    Duration,
    StatusCode,
);

impl<T: ?Sized + Send + Sync + 'static> Argument for Arc<T> {
    fn param() -> Param {
        Param::required(Shape::of::<Arc<T>>())
    }

    fn extract(arg: &Arg) -> Option<Self> {
        arg.value()?
            .view(Self::param().shape())?
            .downcast_ref::<Arc<T>>()
            .cloned()
    }
}

impl<T: Argument> Argument for Option<T> {
    fn param() -> Param {
        Param::nullable(T::param().shape())
    }

    fn extract(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Absent => Some(None),
            Arg::Present(_) => T::extract(arg).map(Some),
        }
    }
}

impl Argument for Value {
    fn param() -> Param {
        Param::required(Shape::any())
    }

    fn extract(arg: &Arg) -> Option<Self> {
        arg.value().cloned()
    }
}

/// A typed argument list.
///
/// Implemented for `()` and for tuples of up to six [`Argument`]s.
pub trait Args: Sized + 'static {
    /// The declared parameters, in order.
    fn params() -> Vec<Param>;

    /// Extracts the typed list, or `None` if the arity or any element
    /// does not match.
    fn extract(args: &[Arg]) -> Option<Self>;
}

impl Args for () {
    fn params() -> Vec<Param> {
        Vec::new()
    }

    fn extract(args: &[Arg]) -> Option<Self> {
        args.is_empty().then_some(())
    }
}

macro_rules! impl_args {
    ($($name:ident),+) => {
        impl<$($name: Argument),+> Args for ($($name,)+) {
            fn params() -> Vec<Param> {
                vec![$($name::param()),+]
            }

            fn extract(args: &[Arg]) -> Option<Self> {
                let mut iter = args.iter();
                let extracted = ($($name::extract(iter.next()?)?,)+);
                iter.next().is_none().then_some(extracted)
            }
        }
    };
}

impl_args!(A);
impl_args!(A, B);
impl_args!(A, B, C);
impl_args!(A, B, C, D);
impl_args!(A, B, C, D, E);
impl_args!(A, B, C, D, E, F);
