// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Steady-State Logging
//!
//! Installs the global `tracing` subscriber once the bootstrap phase
//! (which uses [`semantic_memory_bootstrap::logger::BootstrapLogger`]
//! instead, since no subscriber exists yet that early) hands off to the
//! application proper. Verbosity follows `RUST_LOG` when set, falling
//! back to the CLI's `--verbose` flag, matching the teacher's
//! `FmtSubscriber` setup in its own `main.rs`.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Safe to call at most once per
/// process; a second call returns an error rather than panicking.
pub fn init(verbose: bool) -> Result<(), String> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().map_err(|e| e.to_string())
}
