// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module values and export extraction

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An opaque export value extracted from a resolved module.
pub type Export = Arc<dyn Any + Send + Sync>;

/// Name of the export used when no export key is requested.
pub const DEFAULT_EXPORT: &str = "default";

/// A resolved module: a table of named exports.
///
/// Modules are handled as `Arc<Module>` throughout; the pointer identity
/// of that `Arc` is what the once-per-module callback tracking keys on.
pub struct Module {
    exports: HashMap<String, Export>,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self {
            exports: HashMap::new(),
        }
    }

    /// Create a module whose default export wraps `value`
    pub fn of<T: Any + Send + Sync>(value: T) -> Arc<Self> {
        Arc::new(Self::new().with_export(DEFAULT_EXPORT, value))
    }

    /// Add a named export, builder-style
    pub fn with_export<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.exports.insert(name.into(), Arc::new(value));
        self
    }

    /// Get a named export
    pub fn export(&self, name: &str) -> Option<Export> {
        self.exports.get(name).cloned()
    }

    /// Get the default export
    pub fn default_export(&self) -> Option<Export> {
        self.export(DEFAULT_EXPORT)
    }

    /// Whether the module has a named export
    pub fn has_export(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether the module has no exports
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Extract the requested export from a resolved module.
///
/// An unset key yields the default export if present, else the module
/// itself. A set key yields that export, or nothing when absent — the
/// caller decides whether "nothing" is a miss (sync) or a failure
/// (async).
pub fn find_export(module: &Arc<Module>, key: Option<&str>) -> Option<Export> {
    match key {
        Some(key) => module.export(key),
        None => module
            .default_export()
            .or_else(|| Some(Arc::clone(module) as Export)),
    }
}
