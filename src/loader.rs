// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The universal module coordinator
//!
//! [`UniversalModule`] resolves one logical module reference through
//! two paths: a synchronous path that never suspends and never fails,
//! and an asynchronous path that deduplicates concurrent loads per
//! cache key, enforces a settlement timeout, and surfaces failures
//! through its returned future.

use crate::config::{
    ConfigSource, ErrorInfo, LoadInfo, ModuleConfig, ModuleOptions, OnError, Settle, Settlement,
    resolve_config,
};
use crate::env;
use crate::error::{LoadError, Result};
use crate::host::HostStrategy;
use crate::module::{DEFAULT_EXPORT, Export, find_export};
use crate::registry::{self, LoadCache, ProcessLoads};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;

/// A deduplicated in-flight load: a cloneable, shareable future of an
/// export. Every caller joined on the same cache key during the
/// in-flight window observes the identical outcome.
pub type LoadFuture = Shared<BoxFuture<'static, Result<Export>>>;

/// Coordinator for one universal module reference.
///
/// Built per render from a configuration source, options, and the
/// current props; all heavyweight state (resolved modules, in-flight
/// loads, server-pass bookkeeping) lives in process-wide registries
/// shared by every instance.
pub struct UniversalModule<P, C = ()> {
    source: ConfigSource<P>,
    options: ModuleOptions<P, C>,
    config: ModuleConfig<P>,
    strategy: HostStrategy,
    cache: Arc<dyn LoadCache>,
    async_only: bool,
    props: P,
    prev_props: Option<P>,
}

impl<P, C> UniversalModule<P, C>
where
    P: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Build a coordinator, normalizing the configuration source
    /// against `props` and probing the host environment.
    pub fn new(
        source: ConfigSource<P>,
        options: ModuleOptions<P, C>,
        props: P,
        prev_props: Option<P>,
    ) -> Self {
        Self::with_host(source, options, props, prev_props, HostStrategy::detect())
    }

    /// Build a coordinator with an explicit host strategy.
    pub fn with_host(
        source: ConfigSource<P>,
        options: ModuleOptions<P, C>,
        props: P,
        prev_props: Option<P>,
        strategy: HostStrategy,
    ) -> Self {
        let config = resolve_config(&source, &options, &props);
        let async_only = config.path.is_empty_literal() && config.resolve.is_empty_literal();
        let cache = options
            .prom_cache
            .clone()
            .unwrap_or_else(|| Arc::new(ProcessLoads));

        Self {
            source,
            options,
            config,
            strategy,
            cache,
            async_only,
            props,
            prev_props,
        }
    }

    /// True iff no static path/resolve was configured: the module can
    /// only be reached through the asynchronous path.
    pub fn async_only(&self) -> bool {
        self.async_only
    }

    fn cache_key(&self, props: &P) -> String {
        self.config.chunk_name.eval(props)
    }

    fn load_info(is_sync: bool) -> LoadInfo {
        LoadInfo {
            is_sync,
            is_server: env::is_server(),
        }
    }

    /// Attempt zero-latency, in-environment resolution.
    ///
    /// `None` means "not available synchronously" — this path never
    /// fails. A registry hit still re-runs the export resolver so a
    /// newly supplied `on_load` fires on cache hits too.
    pub fn require_sync(&self, props: &P, context: &C) -> Option<Export> {
        let key = self.cache_key(props);

        let module = registry::module_for(&key).or_else(|| match &self.strategy {
            HostStrategy::Native(host) => {
                if self.config.path.is_empty_literal() {
                    return None;
                }
                host.try_require(&self.config.path.eval(props))
            }
            HostStrategy::Bundled(table) => {
                if self.config.resolve.is_empty_literal() {
                    return None;
                }
                let weak_id = self.config.resolve.eval(props);
                if table.is_materialized(&weak_id) {
                    table.require(&weak_id)
                } else {
                    None
                }
            }
        })?;

        let canonical = registry::resolve_export(
            &module,
            &key,
            self.options.on_load.as_ref(),
            Self::load_info(true),
            props,
            context,
        );
        find_export(&canonical, self.options.key.as_deref())
    }

    /// Resolve asynchronously, deduplicating concurrent loads per
    /// cache key.
    ///
    /// At most one loader invocation is in flight per uncached key;
    /// concurrent callers share the returned future. A registered
    /// module short-circuits to an already-settled future (re-running
    /// the export resolver for late-bound `on_load` support).
    pub fn require_async(&self, props: &P, context: &C) -> LoadFuture {
        let key = self.cache_key(props);

        if let Some(cached) = registry::module_for(&key) {
            let canonical = registry::resolve_export(
                &cached,
                &key,
                self.options.on_load.as_ref(),
                Self::load_info(false),
                props,
                context,
            );
            let settled = find_export(&canonical, self.options.key.as_deref()).ok_or_else(|| {
                LoadError::export_not_found(self.options.key.as_deref().unwrap_or(DEFAULT_EXPORT))
            });
            return futures::future::ready(settled).boxed().shared();
        }

        if let Some(pending) = self.cache.get(&key) {
            tracing::debug!(key = %key, "joining in-flight load");
            return pending;
        }

        let load = self.start_load(key.clone(), props.clone(), context.clone());
        self.cache.set(&key, load.clone());
        load
    }

    fn start_load(&self, key: String, props: P, context: C) -> LoadFuture {
        let load = Arc::clone(&self.config.load);
        let on_load = self.options.on_load.clone();
        let on_error = self.options.on_error.clone();
        let export_key = self.options.key.clone();
        let timeout = self.options.timeout;

        let fut = async move {
            tracing::debug!(key = %key, "starting load");

            let (settle, settled) = Settle::new();
            if let Some(request) = load(&props, settle.clone()) {
                // drive the loader's awaitable from its own task so the
                // timeout below does not cancel the underlying fetch
                let settle = settle.clone();
                tokio::task::spawn(async move {
                    match request.await {
                        Ok(module) => settle.resolve(module),
                        Err(error) => settle.reject(error),
                    }
                });
            }

            let wait = async {
                match settled.await {
                    Ok(settlement) => settlement,
                    // the loader dropped its handle without settling;
                    // indistinguishable from a loader that never settles
                    Err(_) => futures::future::pending::<Settlement>().await,
                }
            };

            let settlement = if timeout.is_zero() {
                Some(wait.await)
            } else {
                tokio::time::timeout(timeout, wait).await.ok()
            };

            match settlement {
                None => {
                    tracing::warn!(key = %key, ?timeout, "load timed out");
                    Err(report(&on_error, LoadError::Timeout))
                }
                Some(Err(error)) => {
                    tracing::warn!(key = %key, %error, "loader rejected");
                    Err(report(&on_error, LoadError::loader(error)))
                }
                Some(Ok(module)) => {
                    let canonical = registry::resolve_export(
                        &module,
                        &key,
                        on_load.as_ref(),
                        Self::load_info(false),
                        &props,
                        &context,
                    );
                    match find_export(&canonical, export_key.as_deref()) {
                        Some(export) => {
                            tracing::debug!(key = %key, "load resolved");
                            Ok(export)
                        }
                        None => Err(report(
                            &on_error,
                            LoadError::export_not_found(
                                export_key.as_deref().unwrap_or(DEFAULT_EXPORT),
                            ),
                        )),
                    }
                }
            }
        };

        fut.boxed().shared()
    }

    /// Record the chunk name (or environment-specific module
    /// identifier) this reference touched, so the hosting request can
    /// preload it before client hydration. Server passes only.
    pub fn add_module(&self, props: &P) {
        if !env::is_server() {
            return;
        }

        if !self.config.chunk_name.is_empty_literal() {
            registry::record_chunk_name(self.config.chunk_name.eval(props));
            if !env::is_test() {
                // production passes stop here; the module-id walk below
                // is redundant once the chunk name is known
                return;
            }
        }

        let id = match &self.strategy {
            HostStrategy::Bundled(_) => self.config.resolve.eval(props),
            HostStrategy::Native(_) => self.config.path.eval(props),
        };
        registry::record_module_id(id);
    }

    /// Whether `next` props imply a different module identity than
    /// `prev` — a reload is warranted only when the cache key changes.
    pub fn should_update(&self, next: &P, prev: &P) -> bool {
        if self.async_only {
            let cache_key = self.config.chunk_name.eval(next);
            let prev_config = resolve_config(&self.source, &self.options, prev);
            return cache_key != prev_config.chunk_name.eval(prev);
        }

        // sync-capable configs compare against the construction-time
        // baseline; without one there is nothing to reload from
        let Some(prev_props) = &self.prev_props else {
            return false;
        };
        let cache_key = self.config.chunk_name.eval(&self.props);
        let prev_config = resolve_config(&self.source, &self.options, prev_props);
        cache_key != prev_config.chunk_name.eval(prev_props)
    }
}

fn report(on_error: &Option<OnError>, error: LoadError) -> LoadError {
    if let Some(on_error) = on_error {
        on_error(
            &error,
            ErrorInfo {
                is_server: env::is_server(),
            },
        );
    }
    error
}
