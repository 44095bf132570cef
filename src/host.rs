// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host-environment strategies for synchronous resolution
//!
//! Two environments can satisfy a module reference without suspending:
//! a native host that can tolerantly require by path, and a bundled
//! host that exposes its live module table keyed by weak ids. The
//! strategy is probed once at coordinator construction, not re-branched
//! on every call.

use crate::module::Module;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, LazyLock};

/// Tolerant synchronous require by module path.
pub trait PathRequire: Send + Sync {
    /// Return the resident module at `path`, or `None` when it is not
    /// synchronously available. Never an error.
    fn try_require(&self, path: &str) -> Option<Arc<Module>>;
}

/// Introspection over a bundle's live module table.
pub trait BundleTable: Send + Sync {
    /// Whether `weak_id` is currently materialized, without forcing a load
    fn is_materialized(&self, weak_id: &str) -> bool;

    /// Synchronously require a materialized module by weak id
    fn require(&self, weak_id: &str) -> Option<Arc<Module>>;
}

/// The synchronous-resolution capability of the current host, one of
/// two variants selected once at construction.
#[derive(Clone)]
pub enum HostStrategy {
    /// Path-based environment require (non-bundled host)
    Native(Arc<dyn PathRequire>),
    /// Weak-id lookup against the bundle's live module table
    Bundled(Arc<dyn BundleTable>),
}

impl HostStrategy {
    /// Probe the process environment: the installed bundle table if the
    /// host registered one, else an installed path-require host, else
    /// the built-in resident-module table.
    pub fn detect() -> Self {
        if let Some(table) = BUNDLE_TABLE.read().clone() {
            return Self::Bundled(table);
        }
        if let Some(host) = PATH_REQUIRE.read().clone() {
            return Self::Native(host);
        }
        Self::resident()
    }

    /// The built-in native strategy backed by the process resident table
    pub fn resident() -> Self {
        Self::Native(Arc::new(ResidentModules))
    }

    /// Whether this host resolves through a bundle table
    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Bundled(_))
    }
}

static BUNDLE_TABLE: LazyLock<RwLock<Option<Arc<dyn BundleTable>>>> =
    LazyLock::new(|| RwLock::new(None));
static PATH_REQUIRE: LazyLock<RwLock<Option<Arc<dyn PathRequire>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Install the host's bundle table. Coordinators constructed afterwards
/// resolve synchronously through it.
pub fn install_bundle_table(table: Arc<dyn BundleTable>) {
    *BUNDLE_TABLE.write() = Some(table);
}

/// Install the host's path-require primitive for non-bundled
/// environments.
pub fn install_path_require(host: Arc<dyn PathRequire>) {
    *PATH_REQUIRE.write() = Some(host);
}

/// Modules the host has already made synchronously resident, keyed by
/// path. Backs the default native strategy.
static RESIDENT: LazyLock<DashMap<String, Arc<Module>>> = LazyLock::new(DashMap::new);

/// Register a module as synchronously resident at `path`.
pub fn register_resident(path: impl Into<String>, module: Arc<Module>) {
    RESIDENT.insert(path.into(), module);
}

struct ResidentModules;

impl PathRequire for ResidentModules {
    fn try_require(&self, path: &str) -> Option<Arc<Module>> {
        RESIDENT.get(path).map(|entry| Arc::clone(entry.value()))
    }
}

/// In-memory bundle table, for hosts and tests that materialize modules
/// by weak id up front.
pub struct InMemoryBundle {
    table: DashMap<String, Arc<Module>>,
}

impl InMemoryBundle {
    /// Create an empty bundle table
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Materialize `module` under `weak_id`
    pub fn insert(&self, weak_id: impl Into<String>, module: Arc<Module>) {
        self.table.insert(weak_id.into(), module);
    }
}

impl Default for InMemoryBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleTable for InMemoryBundle {
    fn is_materialized(&self, weak_id: &str) -> bool {
        self.table.contains_key(weak_id)
    }

    fn require(&self, weak_id: &str) -> Option<Arc<Module>> {
        self.table.get(weak_id).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resident_lookup() {
        register_resident("host/widget", Module::of("widget"));

        let strategy = HostStrategy::resident();
        let HostStrategy::Native(host) = strategy else {
            panic!("resident strategy is native");
        };
        assert!(host.try_require("host/widget").is_some());
        assert!(host.try_require("host/absent").is_none());
    }

    #[test]
    fn test_in_memory_bundle() {
        let bundle = InMemoryBundle::new();
        bundle.insert("w1", Module::of(1_i32));

        assert!(bundle.is_materialized("w1"));
        assert!(!bundle.is_materialized("w2"));
        assert!(bundle.require("w1").is_some());
        assert!(bundle.require("w2").is_none());
    }

    #[test]
    fn test_install_bundle_table_changes_probe() {
        let _guard = crate::registry::test_guard();

        assert!(!HostStrategy::detect().is_bundled());
        install_bundle_table(Arc::new(InMemoryBundle::new()));
        assert!(HostStrategy::detect().is_bundled());

        *BUNDLE_TABLE.write() = None;
        assert!(!HostStrategy::detect().is_bundled());
    }
}
