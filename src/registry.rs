// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide registries and the export resolver
//!
//! All of this state has an explicit lifecycle: empty at startup,
//! mutated by any live coordinator, drained by the hosting request
//! cycle through the flush operations. Everything is guarded for
//! multi-threaded hosts.

use crate::config::{LoadInfo, OnLoad};
use crate::loader::LoadFuture;
use crate::module::Module;
use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Resolved modules keyed by cache key. First write wins.
static MODULES: LazyLock<DashMap<String, Arc<Module>>> = LazyLock::new(DashMap::new);

/// Chunk names touched during the current server pass, in insertion order.
static CHUNK_NAMES: LazyLock<Mutex<IndexSet<String>>> =
    LazyLock::new(|| Mutex::new(IndexSet::new()));

/// Module identifiers touched during the current server pass.
static MODULE_IDS: LazyLock<Mutex<IndexSet<String>>> =
    LazyLock::new(|| Mutex::new(IndexSet::new()));

/// Per module identity, the callback identities already fired for it.
static ON_LOAD_CALLBACKS: LazyLock<DashMap<usize, HashSet<usize>>> =
    LazyLock::new(DashMap::new);

/// In-flight loads keyed by cache key; the process-default dedup cache.
static LOADS: LazyLock<DashMap<String, LoadFuture>> = LazyLock::new(DashMap::new);

/// Pluggable dedup cache of in-flight loads.
///
/// The default is an in-process map; a host may substitute its own
/// store through `ModuleOptions::prom_cache`.
pub trait LoadCache: Send + Sync {
    /// Look up the in-flight load for `key`
    fn get(&self, key: &str) -> Option<LoadFuture>;

    /// Store the in-flight load for `key`
    fn set(&self, key: &str, load: LoadFuture);
}

/// The process-default [`LoadCache`].
pub(crate) struct ProcessLoads;

impl LoadCache for ProcessLoads {
    fn get(&self, key: &str) -> Option<LoadFuture> {
        LOADS.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, load: LoadFuture) {
        LOADS.insert(key.to_string(), load);
    }
}

/// Canonical module for `key`, if one has been registered.
pub(crate) fn module_for(key: &str) -> Option<Arc<Module>> {
    MODULES.get(key).map(|entry| Arc::clone(entry.value()))
}

/// Record a chunk name for the current server pass. Empty names are
/// not recorded.
pub(crate) fn record_chunk_name(name: String) {
    if !name.is_empty() {
        CHUNK_NAMES.lock().insert(name);
    }
}

/// Record an environment-specific module identifier for the current
/// server pass. Empty ids are not recorded.
pub(crate) fn record_module_id(id: String) {
    if !id.is_empty() {
        MODULE_IDS.lock().insert(id);
    }
}

fn module_identity(module: &Arc<Module>) -> usize {
    Arc::as_ptr(module) as *const () as usize
}

fn callback_identity<P, C>(on_load: &OnLoad<P, C>) -> usize {
    Arc::as_ptr(on_load) as *const () as usize
}

/// Register `module` under `key` (first write wins), fire `on_load` at
/// most once per (module, callback) pair, and return the canonical
/// record for the key.
///
/// When a second writer races an already-registered key, its value is
/// discarded but the callback/extraction step still runs against the
/// canonical record.
pub(crate) fn resolve_export<P, C>(
    module: &Arc<Module>,
    key: &str,
    on_load: Option<&OnLoad<P, C>>,
    info: LoadInfo,
    props: &P,
    context: &C,
) -> Arc<Module> {
    let canonical: Arc<Module> = MODULES
        .entry(key.to_string())
        .or_insert_with(|| Arc::clone(module))
        .clone();

    if let Some(on_load) = on_load {
        let newly_fired = ON_LOAD_CALLBACKS
            .entry(module_identity(&canonical))
            .or_default()
            .insert(callback_identity(on_load));
        if newly_fired {
            on_load(&canonical, info, props, context);
        }
    }

    canonical
}

/// Drain the chunk names recorded during the current server pass, in
/// insertion order.
///
/// Also clears callback-invocation tracking so `on_load` may fire again
/// for already-resolved modules on the next pass; resolved modules
/// themselves stay cached.
pub fn flush_chunk_names() -> Vec<String> {
    let names: Vec<String> = CHUNK_NAMES.lock().drain(..).collect();
    ON_LOAD_CALLBACKS.clear();
    names
}

/// Drain the module identifiers recorded during the current server
/// pass, in insertion order. Clears callback-invocation tracking like
/// [`flush_chunk_names`].
pub fn flush_module_ids() -> Vec<String> {
    let ids: Vec<String> = MODULE_IDS.lock().drain(..).collect();
    ON_LOAD_CALLBACKS.clear();
    ids
}

/// Drop every cached module record. Test-only.
pub fn clear_modules_cache() {
    MODULES.clear();
}

#[cfg(test)]
static TEST_GUARD: Mutex<()> = Mutex::new(());

/// Serializes tests that mutate the process-wide sets or flags.
#[cfg(test)]
pub(crate) fn test_guard() -> parking_lot::MutexGuard<'static, ()> {
    TEST_GUARD.lock()
}
