//! Builder properties.
//!
//! Every [`PipelineBuilder`](crate::PipelineBuilder) carries a set of
//! [`Properties`]: the default terminal used when the entry list is exhausted,
//! the ambient shutdown signal, and free-form host extensions. Properties are
//! shared by reference between a builder and every builder derived from it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use weft_core::{Arg, Argument, Param, Shape, Value};

/// Receiving half of the ambient shutdown signal.
///
/// The pipeline builder never observes the signal; it only hands it to
/// middleware that asks for it.
///
/// # Example
///
/// ```
/// use weft_middleware::ShutdownSignal;
///
/// let (signal, trigger) = ShutdownSignal::channel();
/// assert!(!signal.is_triggered());
/// trigger.trigger();
/// assert!(signal.is_triggered());
/// ```
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Sending half of the ambient shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    /// Creates a connected signal and trigger.
    #[must_use]
    pub fn channel() -> (Self, ShutdownTrigger) {
        let (tx, rx) = watch::channel(false);
        (Self { rx }, ShutdownTrigger { tx })
    }

    /// Creates a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::channel().0
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Never completes if the trigger was dropped without firing.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl ShutdownTrigger {
    /// Requests shutdown.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Argument for ShutdownSignal {
    fn param() -> Param {
        Param::required(Shape::of::<Self>())
    }

    fn extract(arg: &Arg) -> Option<Self> {
        arg.value()?.downcast_ref::<Self>().cloned()
    }
}

/// Ambient configuration of a pipeline builder.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    default_terminal: Option<Value>,
    shutdown: ShutdownSignal,
    extensions: HashMap<String, JsonValue>,
}

impl Properties {
    /// Creates properties carrying `shutdown`.
    #[must_use]
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            default_terminal: None,
            shutdown,
            extensions: HashMap::new(),
        }
    }

    /// Sets the default terminal.
    #[must_use]
    pub fn with_default_terminal(mut self, terminal: Value) -> Self {
        self.default_terminal = Some(terminal);
        self
    }

    /// Sets a host extension.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// The overriding default terminal, if one was set.
    #[must_use]
    pub fn default_terminal(&self) -> Option<&Value> {
        self.default_terminal.as_ref()
    }

    /// Replaces the default terminal. `None` restores the not-found terminal.
    pub fn set_default_terminal(&mut self, terminal: Option<Value>) {
        self.default_terminal = terminal;
    }

    /// The ambient shutdown signal.
    #[must_use]
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Returns a host extension.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&JsonValue> {
        self.extensions.get(key)
    }

    /// Sets a host extension, returning the previous value.
    pub fn set_extension(
        &mut self,
        key: impl Into<String>,
        value: impl Into<JsonValue>,
    ) -> Option<JsonValue> {
        self.extensions.insert(key.into(), value.into())
    }
}

/// A handle to properties shared between a builder and its derived builders.
#[derive(Clone, Debug, Default)]
pub struct SharedProperties {
    inner: Arc<RwLock<Properties>>,
}

impl SharedProperties {
    /// Wraps `properties`.
    #[must_use]
    pub fn new(properties: Properties) -> Self {
        Self {
            inner: Arc::new(RwLock::new(properties)),
        }
    }

    /// Locks the properties for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Properties> {
        self.inner.read()
    }

    /// Locks the properties for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Properties> {
        self.inner.write()
    }

    /// Returns a clone of the ambient shutdown signal.
    #[must_use]
    pub fn shutdown(&self) -> ShutdownSignal {
        self.inner.read().shutdown.clone()
    }

    /// Returns a clone of the overriding default terminal.
    #[must_use]
    pub fn default_terminal(&self) -> Option<Value> {
        self.inner.read().default_terminal.clone()
    }

    /// Returns `true` if both handles share the same properties.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Properties> for SharedProperties {
    fn from(properties: Properties) -> Self {
        Self::new(properties)
    }
}
