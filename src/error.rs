// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the loading coordinator

use std::sync::Arc;
use thiserror::Error;

/// Result type for asynchronous loading operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors surfaced by the asynchronous loading path.
///
/// The synchronous path never raises; absence of a result is its only
/// outward signal. `LoadError` is `Clone` because every caller joined on
/// a deduplicated in-flight load observes the identical outcome.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Loader neither resolved nor rejected within the timeout window
    #[error("timeout exceeded")]
    Timeout,

    /// Module resolved but the requested export key is absent
    #[error("export not found: '{key}'")]
    ExportNotFound {
        /// The requested export key
        key: String,
    },

    /// The loader's own rejection reason, passed through unmodified
    #[error("{0}")]
    Loader(Arc<anyhow::Error>),
}

impl LoadError {
    /// Wrap a loader rejection
    pub fn loader(err: anyhow::Error) -> Self {
        Self::Loader(Arc::new(err))
    }

    /// Create an export-not-found error
    pub fn export_not_found(key: impl Into<String>) -> Self {
        Self::ExportNotFound { key: key.into() }
    }

    /// Whether this failure came from the timeout window
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
