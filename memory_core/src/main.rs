// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `memory` binary entry point. Bootstrap parses and validates `argv`
//! before any application code runs; everything past that point is
//! `semantic_memory_core::presentation::cli::run`.

use semantic_memory_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use semantic_memory_bootstrap::{bootstrap_cli, map_error_to_exit_code, ExitCode};
use semantic_memory_core::presentation::cli;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let bootstrap_logger = ConsoleLogger::with_prefix("memory");

    let cli_args = match bootstrap_cli() {
        Ok(cli_args) => cli_args,
        Err(err) => {
            bootstrap_logger.error(&err.to_string());
            return ExitCode::Usage.into();
        }
    };

    bootstrap_logger.debug("cli arguments parsed and validated");

    match cli::run(cli_args).await {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            eprintln!("error: {err}");
            map_error_to_exit_code(&err.category().to_string()).into()
        }
    }
}
