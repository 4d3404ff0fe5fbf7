// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared services every chain depends on.
//!
//! A [`Runtime`] owns the dispatcher, the uncaught-rejection hook and the in-flight
//! registry. [`Runtime::global`] is the process-wide instance used by
//! [`Chain::new`](crate::chain::Chain::new); independent runtimes can be created for
//! isolation, typically in tests.
//!
//! The dispatcher is created lazily on first use from the runtime's configuration.
//! [`Runtime::init`] swaps in a freshly configured pool and shuts the old one down.

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::chain::{Chain, ChainParts, Settler};
use crate::config::{Config, DispatcherConfig};
use crate::dispatcher::Dispatcher;
use crate::engine::registry::InflightRegistry;
use crate::engine::walker::ChainTask;
use crate::errors::{ChainError, ConfigError};

/// Callback for rejections that reach `finish` without any `fail` continuation.
pub struct UncaughtHandler(Box<dyn Fn(&ChainError) + Send + Sync>);

impl UncaughtHandler {
    pub(crate) fn call(&self, error: &ChainError) {
        (self.0)(error)
    }
}

struct RuntimeInner {
    config: RwLock<DispatcherConfig>,
    dispatcher: RwLock<Option<Arc<Dispatcher>>>,
    uncaught: ArcSwapOption<UncaughtHandler>,
    inflight: InflightRegistry,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

static GLOBAL: Lazy<Runtime> = Lazy::new(|| Runtime::build(DispatcherConfig::default()));

impl Runtime {
    /// A runtime with its own dispatcher, uncaught hook and registry.
    pub fn new(config: DispatcherConfig) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self::build(config))
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.dispatcher.clone())
    }

    fn build(config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config: RwLock::new(config),
                dispatcher: RwLock::new(None),
                uncaught: ArcSwapOption::empty(),
                inflight: InflightRegistry::default(),
            }),
        }
    }

    /// The process-wide runtime, created with default settings on first use.
    pub fn global() -> &'static Runtime {
        &GLOBAL
    }

    /// Replace the dispatcher with one built from `config`.
    ///
    /// Chains already running keep their worker; chains still queued on the old pool
    /// settle `Rejected` with [`ChainError::WorkerRejected`].
    pub fn init(&self, config: DispatcherConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let replacement = Arc::new(Dispatcher::new(config.clone()));

        let previous = {
            let mut dispatcher = self.inner.dispatcher.write();
            *self.inner.config.write() = config;
            dispatcher.replace(replacement)
        };
        if let Some(previous) = previous {
            previous.shutdown();
        }
        Ok(())
    }

    /// Shut the dispatcher down. The next dispatch starts a new one.
    pub fn shutdown(&self) {
        let previous = self.inner.dispatcher.write().take();
        if let Some(previous) = previous {
            previous.shutdown();
        }
    }

    pub fn config(&self) -> DispatcherConfig {
        self.inner.config.read().clone()
    }

    pub fn inflight(&self) -> &InflightRegistry {
        &self.inner.inflight
    }

    /// Start a chain bound to this runtime.
    pub fn chain<T, F>(&self, entry: F) -> Chain<T>
    where
        T: Send + 'static,
        F: FnOnce(Settler<T>) + Send + 'static,
    {
        Chain::with_runtime(self, entry)
    }

    pub fn set_uncaught_exception_handler<F>(&self, handler: F)
    where
        F: Fn(&ChainError) + Send + Sync + 'static,
    {
        self.inner
            .uncaught
            .store(Some(Arc::new(UncaughtHandler(Box::new(handler)))));
    }

    pub fn clear_uncaught_exception_handler(&self) {
        self.inner.uncaught.store(None);
    }

    pub(crate) fn uncaught_handler(&self) -> Option<Arc<UncaughtHandler>> {
        self.inner.uncaught.load_full()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        if let Some(dispatcher) = self.inner.dispatcher.read().as_ref() {
            return Arc::clone(dispatcher);
        }

        let mut slot = self.inner.dispatcher.write();
        let dispatcher = slot
            .get_or_insert_with(|| Arc::new(Dispatcher::new(self.inner.config.read().clone())));
        Arc::clone(dispatcher)
    }

    pub(crate) fn dispatch(&self, parts: ChainParts) -> Result<(), ChainError> {
        let task = Box::new(ChainTask::new(parts, self.clone()));
        self.dispatcher().submit(task)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &*self.inner.config.read())
            .field("inflight", &self.inner.inflight.len())
            .field("uncaught_handler", &self.inner.uncaught.load().is_some())
            .finish()
    }
}

/// Install the uncaught-rejection hook on the global runtime.
pub fn set_uncaught_exception_handler<F>(handler: F)
where
    F: Fn(&ChainError) + Send + Sync + 'static,
{
    Runtime::global().set_uncaught_exception_handler(handler);
}

/// Remove the global runtime's uncaught-rejection hook.
pub fn clear_uncaught_exception_handler() {
    Runtime::global().clear_uncaught_exception_handler();
}
