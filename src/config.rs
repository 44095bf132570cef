// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration normalization
//!
//! A universal module is described either *statically* (a loader plus
//! fixed identifier fields, merged with option defaults) or
//! *dynamically* (a full config, possibly derived from the current
//! props). `resolve_config` normalizes both shapes into one concrete
//! [`ModuleConfig`] for a given set of props.

use crate::error::LoadError;
use crate::module::Module;
use crate::registry::LoadCache;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Default async settlement window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// A configuration field that is either a literal string or derived
/// from the current props.
pub enum Field<P> {
    /// A fixed string
    Literal(String),
    /// A function of the current props
    Derived(Arc<dyn Fn(&P) -> String + Send + Sync>),
}

impl<P> Field<P> {
    /// Create a derived field from a function of props
    pub fn derived(f: impl Fn(&P) -> String + Send + Sync + 'static) -> Self {
        Self::Derived(Arc::new(f))
    }

    /// Evaluate the field against the current props
    pub fn eval(&self, props: &P) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Derived(f) => f(props),
        }
    }

    /// Whether the field is the empty literal, i.e. unconfigured
    pub fn is_empty_literal(&self) -> bool {
        matches!(self, Self::Literal(s) if s.is_empty())
    }
}

impl<P> Clone for Field<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(s) => Self::Literal(s.clone()),
            Self::Derived(f) => Self::Derived(Arc::clone(f)),
        }
    }
}

impl<P> Default for Field<P> {
    fn default() -> Self {
        Self::Literal(String::new())
    }
}

impl<P> fmt::Debug for Field<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Derived(_) => f.debug_tuple("Derived").field(&"<fn>").finish(),
        }
    }
}

impl<P> From<&str> for Field<P> {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl<P> From<String> for Field<P> {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

/// Outcome a loader settles with.
pub(crate) type Settlement = std::result::Result<Arc<Module>, anyhow::Error>;

/// Handle through which a loader settles a pending load.
///
/// First settlement wins; later calls — including late ones arriving
/// after the timeout window closed — are no-ops.
#[derive(Clone)]
pub struct Settle {
    tx: Arc<Mutex<Option<oneshot::Sender<Settlement>>>>,
}

impl Settle {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Fulfil the load with a resolved module
    pub fn resolve(&self, module: Arc<Module>) {
        self.settle(Ok(module));
    }

    /// Fail the load with the loader's own error
    pub fn reject(&self, error: anyhow::Error) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Settlement) {
        let Some(tx) = self.tx.lock().take() else {
            tracing::debug!("late settlement ignored");
            return;
        };
        if tx.send(outcome).is_err() {
            tracing::debug!("settlement after timeout ignored");
        }
    }
}

/// A user-supplied loader.
///
/// The loader may settle through the handle itself, or return an
/// awaitable whose outcome is attached to the handle on its behalf.
pub type Loader<P> = Arc<
    dyn Fn(&P, Settle) -> Option<BoxFuture<'static, anyhow::Result<Arc<Module>>>> + Send + Sync,
>;

/// Descriptor passed to the `on_load` lifecycle callback.
#[derive(Debug, Clone, Copy)]
pub struct LoadInfo {
    /// Resolution happened on the synchronous path
    pub is_sync: bool,
    /// The process is in a server-side pass
    pub is_server: bool,
}

/// Descriptor passed to the `on_error` hook.
#[derive(Debug, Clone, Copy)]
pub struct ErrorInfo {
    /// The process is in a server-side pass
    pub is_server: bool,
}

/// Lifecycle callback fired at most once per resolved module object.
pub type OnLoad<P, C> = Arc<dyn Fn(&Arc<Module>, LoadInfo, &P, &C) + Send + Sync>;

/// Observability hook invoked with a failure before the future fails.
pub type OnError = Arc<dyn Fn(&LoadError, ErrorInfo) + Send + Sync>;

/// Concrete configuration tuple for a given props shape.
pub struct ModuleConfig<P> {
    /// Stable identifier of the module
    pub id: Field<P>,
    /// Chunk name; its evaluation against props is the cache key
    pub chunk_name: Field<P>,
    /// Module path for native synchronous lookup
    pub path: Field<P>,
    /// Weak identifier for bundle-table lookup
    pub resolve: Field<P>,
    /// The asynchronous loader
    pub load: Loader<P>,
}

impl<P> Clone for ModuleConfig<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            chunk_name: self.chunk_name.clone(),
            path: self.path.clone(),
            resolve: self.resolve.clone(),
            load: Arc::clone(&self.load),
        }
    }
}

/// Where a universal module's configuration comes from.
pub enum ConfigSource<P> {
    /// Dynamic: a full config, used as-is
    Config(ModuleConfig<P>),
    /// Dynamic: a factory evaluated against the current props
    Factory(Arc<dyn Fn(&P) -> ModuleConfig<P> + Send + Sync>),
    /// Static: a loader function; identifier fields come from options
    Loader(Loader<P>),
    /// Static: a constant module, wrapped in a trivial loader
    Value(Arc<Module>),
}

impl<P> ConfigSource<P> {
    /// Create a dynamic factory source
    pub fn factory(f: impl Fn(&P) -> ModuleConfig<P> + Send + Sync + 'static) -> Self {
        Self::Factory(Arc::new(f))
    }
}

impl<P> Clone for ConfigSource<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Config(config) => Self::Config(config.clone()),
            Self::Factory(f) => Self::Factory(Arc::clone(f)),
            Self::Loader(load) => Self::Loader(Arc::clone(load)),
            Self::Value(module) => Self::Value(Arc::clone(module)),
        }
    }
}

/// Options accepted at coordinator construction.
pub struct ModuleOptions<P, C = ()> {
    /// Static id; defaults to `"default"`
    pub id: Option<Field<P>>,
    /// Static chunk name; defaults to `"default"`
    pub chunk_name: Option<Field<P>>,
    /// Static module path for native synchronous lookup
    pub path: Option<Field<P>>,
    /// Static weak identifier for bundle-table lookup
    pub resolve: Option<Field<P>>,
    /// Export key to extract; absent means the default export
    pub key: Option<String>,
    /// Async settlement window; `Duration::ZERO` disables the timer
    pub timeout: Duration,
    /// Lifecycle callback fired once per resolved module object
    pub on_load: Option<OnLoad<P, C>>,
    /// Observability hook invoked before the async future fails
    pub on_error: Option<OnError>,
    /// Pluggable dedup cache of in-flight loads
    pub prom_cache: Option<Arc<dyn LoadCache>>,
}

impl<P, C> Default for ModuleOptions<P, C> {
    fn default() -> Self {
        Self {
            id: None,
            chunk_name: None,
            path: None,
            resolve: None,
            key: None,
            timeout: DEFAULT_TIMEOUT,
            on_load: None,
            on_error: None,
            prom_cache: None,
        }
    }
}

/// Normalize a static-or-dynamic configuration source into a concrete
/// config for the given props. Missing optional fields fall back to
/// defaults; this operation has no failure modes.
pub fn resolve_config<P, C>(
    source: &ConfigSource<P>,
    options: &ModuleOptions<P, C>,
    props: &P,
) -> ModuleConfig<P> {
    match source {
        ConfigSource::Config(config) => config.clone(),
        ConfigSource::Factory(factory) => factory(props),
        ConfigSource::Loader(load) => static_config(Arc::clone(load), options),
        ConfigSource::Value(module) => {
            let module = Arc::clone(module);
            let load: Loader<P> = Arc::new(move |_props, _settle| {
                let module = Arc::clone(&module);
                let fut: BoxFuture<'static, anyhow::Result<Arc<Module>>> =
                    Box::pin(async move { Ok(module) });
                Some(fut)
            });
            static_config(load, options)
        }
    }
}

fn static_config<P, C>(load: Loader<P>, options: &ModuleOptions<P, C>) -> ModuleConfig<P> {
    ModuleConfig {
        id: options
            .id
            .clone()
            .unwrap_or_else(|| Field::Literal("default".to_string())),
        chunk_name: options
            .chunk_name
            .clone()
            .unwrap_or_else(|| Field::Literal("default".to_string())),
        path: options.path.clone().unwrap_or_default(),
        resolve: options.resolve.clone().unwrap_or_default(),
        load,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Props {
        id: u32,
    }

    fn noop_loader() -> Loader<Props> {
        Arc::new(|_props, _settle| None)
    }

    #[test]
    fn test_field_eval() {
        let literal: Field<Props> = Field::from("chunk-a");
        assert_eq!(literal.eval(&Props { id: 1 }), "chunk-a");

        let derived = Field::derived(|props: &Props| format!("chunk-{}", props.id));
        assert_eq!(derived.eval(&Props { id: 3 }), "chunk-3");
        assert!(!derived.is_empty_literal());

        let empty = Field::<Props>::default();
        assert!(empty.is_empty_literal());
    }

    #[test]
    fn test_static_config_defaults() {
        let options = ModuleOptions::<Props>::default();
        let config = resolve_config(&ConfigSource::Loader(noop_loader()), &options, &Props { id: 1 });

        assert_eq!(config.id.eval(&Props { id: 1 }), "default");
        assert_eq!(config.chunk_name.eval(&Props { id: 1 }), "default");
        assert!(config.path.is_empty_literal());
        assert!(config.resolve.is_empty_literal());
    }

    #[test]
    fn test_static_config_merges_options() {
        let options = ModuleOptions::<Props> {
            chunk_name: Some(Field::from("widgets")),
            path: Some(Field::from("widgets/index")),
            ..Default::default()
        };
        let config = resolve_config(&ConfigSource::Loader(noop_loader()), &options, &Props { id: 1 });

        assert_eq!(config.chunk_name.eval(&Props { id: 1 }), "widgets");
        assert_eq!(config.path.eval(&Props { id: 1 }), "widgets/index");
    }

    #[test]
    fn test_factory_evaluated_per_props() {
        let source = ConfigSource::factory(|props: &Props| ModuleConfig {
            id: Field::from("default"),
            chunk_name: Field::Literal(format!("chunk-{}", props.id)),
            path: Field::default(),
            resolve: Field::default(),
            load: Arc::new(|_props, _settle| None),
        });
        let options = ModuleOptions::<Props>::default();

        let config = resolve_config(&source, &options, &Props { id: 9 });
        assert_eq!(config.chunk_name.eval(&Props { id: 9 }), "chunk-9");
    }

    #[tokio::test]
    async fn test_value_source_wraps_constant_module() {
        let module = crate::module::Module::of("payload");
        let options = ModuleOptions::<Props>::default();
        let config = resolve_config(&ConfigSource::Value(module), &options, &Props { id: 1 });

        let (settle, _rx) = Settle::new();
        let request = (config.load)(&Props { id: 1 }, settle).expect("trivial loader is awaitable");
        let loaded = request.await.unwrap();
        assert!(loaded.has_export(crate::module::DEFAULT_EXPORT));
    }

    #[test]
    fn test_settle_first_wins() {
        let (settle, mut rx) = Settle::new();
        settle.resolve(crate::module::Module::of(1_i32));
        settle.reject(anyhow::anyhow!("too late"));

        let outcome = rx.try_recv().unwrap();
        assert!(outcome.is_ok());
    }
}
