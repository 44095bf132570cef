// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide execution-environment flags
//!
//! Server-pass tracking (`add_module`, the flush operations) is only
//! meaningful during a server-side render; the host tells the
//! coordinator which side it is on once, at startup.

use std::sync::atomic::{AtomicBool, Ordering};

static IS_SERVER: AtomicBool = AtomicBool::new(true);
static IS_TEST: AtomicBool = AtomicBool::new(false);

/// Whether the process is currently in a server-side pass.
///
/// Defaults to `true`; a client-side host clears it at startup.
pub fn is_server() -> bool {
    IS_SERVER.load(Ordering::Relaxed)
}

/// Set the server-side flag.
pub fn set_server(on: bool) {
    IS_SERVER.store(on, Ordering::Relaxed);
}

/// Whether the process runs under a test harness.
///
/// In test mode `add_module` records both chunk names and module ids in
/// a single call instead of stopping after the chunk name.
pub fn is_test() -> bool {
    IS_TEST.load(Ordering::Relaxed)
}

/// Set the test-harness flag.
pub fn set_test(on: bool) {
    IS_TEST.store(on, Ordering::Relaxed);
}
