// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the enterprise application layers
//! (domain, application, infrastructure) and provides:
//!
//! - **Entry point** - CLI parsing and exit-code mapping for the `memory`
//!   binary in `semantic-memory-core`
//! - **Platform abstraction** - OS-specific operations (POSIX vs Windows)
//! - **Graceful shutdown** - cancellation-token propagation for the
//!   orchestrator's queue polling and dispatch loops (§5)
//! - **Security** - input validation for every path and string argument
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (This Module)            │
//! │  - Entry Point                              │
//! │  - Platform Abstraction                     │
//! │  - Shutdown Coordination                    │
//! │  - Secure Arg Parsing                       │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │     semantic-memory-core (application,      │
//! │     infrastructure, presentation layers)    │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │          semantic-memory-domain             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - `platform` - OS abstraction (Unix/Windows)
//! - `cli` - Secure argument parsing for the `memory` binary
//! - `exit_code` - process exit code mapping
//! - `logger` - bootstrap-phase logging (before the full `tracing`
//!   subscriber is installed)
//! - `shutdown` - `CancellationToken` / `ShutdownCoordinator` for graceful
//!   shutdown of queue polling and dispatch loops

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;

pub use cli::{parse_and_validate, ParseError, ValidatedCli, ValidatedCommand};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Bootstrap and parse CLI arguments.
///
/// This is the main entry point for the bootstrap layer: parse with
/// `clap`, run every argument through [`cli::SecureArgParser`], and
/// return a [`ValidatedCli`] the caller can match on. The caller is
/// responsible for running the application logic and mapping its result
/// to an exit code with [`result_to_exit_code`].
///
/// # Errors
///
/// Returns [`ParseError`] if CLI parsing or validation fails. `clap`
/// handles `--help` and `--version` itself and exits the process before
/// this function would return.
pub fn bootstrap_cli() -> Result<ValidatedCli, ParseError> {
    cli::parse_and_validate()
}
