// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Exit Codes
//!
//! Maps CLI outcomes to BSD `sysexits.h`-style codes (§6: "0 success,
//! non-zero on user error or internal failure"). A first run against a
//! not-yet-created persistent store (queue directory, artifact volume,
//! operations database) is success (`0`), never a usage or I/O error -
//! the CLI surface creates what it needs on first touch.

use std::fmt;

/// A process exit code. `Success` is the only code that maps to `0`;
/// every other variant is a distinct non-zero failure category so
/// operators can distinguish "bad input" from "the service is broken"
/// from a shell script without parsing stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    /// Malformed CLI usage: missing/conflicting arguments.
    Usage,
    /// The input itself was invalid (bad `documentId`, reserved tag,
    /// malformed index name - §7 "Validation" errors).
    DataError,
    /// The target document, index, or pipeline does not exist.
    NotFound,
    /// A dependency (queue storage, artifact volume, operations
    /// database) could not be reached.
    Unavailable,
    /// An internal/orchestration fault not attributable to the caller.
    Software,
    /// The operation was cancelled (graceful shutdown mid-command).
    Cancelled,
}

impl ExitCode {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Usage => 64,
            Self::DataError => 65,
            Self::NotFound => 66,
            Self::Unavailable => 69,
            Self::Software => 70,
            Self::Cancelled => 130,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

/// Maps a coarse error-category string (e.g.
/// `MemoryError::category().to_string()` from `semantic-memory-domain`)
/// to an [`ExitCode`]. Kept as a string boundary rather than depending on
/// `semantic-memory-domain` directly, since bootstrap must stay
/// independent of the application/domain layers.
pub fn map_error_to_exit_code(category: &str) -> ExitCode {
    match category {
        "validation" => ExitCode::DataError,
        "not_found" => ExitCode::NotFound,
        "transient" => ExitCode::Unavailable,
        "cancelled" => ExitCode::Cancelled,
        "orchestration" | "handler" | "internal" => ExitCode::Software,
        _ => ExitCode::Software,
    }
}

/// Converts any `Result` into a process exit code, printing the error to
/// stderr first. Commands that need a finer-grained mapping than
/// "anything failed" should match on their error themselves and call
/// [`map_error_to_exit_code`] with the category string.
pub fn result_to_exit_code<T, E: fmt::Display>(result: Result<T, E>) -> std::process::ExitCode {
    match result {
        Ok(_) => ExitCode::Success.into(),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::Software.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert_eq!(ExitCode::Success.code(), 0);
    }

    #[test]
    fn categories_map_to_distinct_codes() {
        assert_eq!(map_error_to_exit_code("validation"), ExitCode::DataError);
        assert_eq!(map_error_to_exit_code("not_found"), ExitCode::NotFound);
        assert_eq!(map_error_to_exit_code("transient"), ExitCode::Unavailable);
        assert_eq!(map_error_to_exit_code("cancelled"), ExitCode::Cancelled);
        assert_ne!(map_error_to_exit_code("orchestration"), ExitCode::Success);
    }

    #[test]
    fn ok_result_is_success() {
        let result: Result<(), String> = Ok(());
        assert_eq!(result_to_exit_code(result), ExitCode::Success.into());
    }
}
