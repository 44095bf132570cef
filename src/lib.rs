// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # unimod
//!
//! A dual-mode module-loading coordinator.
//!
//! Given a logical "universal module" reference, `unimod` resolves it
//! to a concrete export either synchronously (when the module is
//! already resident in the current execution environment) or
//! asynchronously (fetched on demand), while:
//!
//! - deduplicating concurrent loads per cache key
//! - caching resolved modules process-wide, first write wins
//! - firing `on_load` lifecycle callbacks exactly once per loaded module
//! - tracking the chunks / module ids touched during a server-side
//!   pass so they can be preloaded before client hydration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use unimod::{ConfigSource, Field, Module, ModuleOptions, UniversalModule};
//!
//! #[derive(Clone)]
//! struct Props { page: String }
//!
//! let load: unimod::Loader<Props> = Arc::new(|props, _settle| {
//!     let page = props.page.clone();
//!     Some(Box::pin(async move { Ok(fetch_page_module(&page).await?) }))
//! });
//!
//! let universal = UniversalModule::new(
//!     ConfigSource::Loader(load),
//!     ModuleOptions {
//!         chunk_name: Some(Field::derived(|props: &Props| props.page.clone())),
//!         ..Default::default()
//!     },
//!     Props { page: "home".into() },
//!     None,
//! );
//!
//! // zero-latency path first, async fallback
//! if universal.require_sync(&props, &ctx).is_none() {
//!     let export = universal.require_async(&props, &ctx).await?;
//! }
//! ```
//!
//! ## Server passes
//!
//! During a server render, call `add_module` for every reference that
//! rendered, then drain the bookkeeping once per request with
//! [`flush_chunk_names`] / [`flush_module_ids`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod env;
pub mod error;
pub mod host;
pub mod loader;
pub mod module;
pub mod registry;

// Re-exports
pub use config::{
    ConfigSource, DEFAULT_TIMEOUT, ErrorInfo, Field, LoadInfo, Loader, ModuleConfig,
    ModuleOptions, OnError, OnLoad, Settle, resolve_config,
};
pub use error::{LoadError, Result};
pub use host::{
    BundleTable, HostStrategy, InMemoryBundle, PathRequire, install_bundle_table,
    install_path_require, register_resident,
};
pub use loader::{LoadFuture, UniversalModule};
pub use module::{DEFAULT_EXPORT, Export, Module, find_export};
pub use registry::{LoadCache, clear_modules_cache, flush_chunk_names, flush_module_ids};

/// Version of the unimod crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
