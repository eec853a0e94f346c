// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse_cli()             │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `parser` - CLI structure and clap parsing
//! - `validator` - Security validation layer

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli, Commands};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

/// Validated CLI configuration
///
/// This structure holds all CLI arguments after security validation.
/// All paths are canonicalized and all values are range-checked.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub cpu_threads: Option<usize>,
    pub io_threads: Option<usize>,
    pub storage_type: Option<String>,
    pub channel_depth: usize,
}

/// Validated command variants
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Upload {
        input: PathBuf,
        index: String,
        document_id: Option<String>,
        tags: Vec<(String, Vec<String>)>,
    },
    Status {
        index: String,
        document_id: String,
    },
    DeleteDocument {
        index: String,
        document_id: String,
    },
    DeleteIndex {
        index: String,
        force: bool,
    },
    Search {
        index: String,
        query: String,
        limit: usize,
    },
    Ask {
        index: String,
        question: String,
    },
    QueueInspect {
        queue: String,
    },
}

/// Parse and validate CLI arguments
///
/// This function combines parsing and validation:
/// 1. Parse CLI with clap
/// 2. Validate all paths with SecureArgParser
/// 3. Validate all numeric values
/// 4. Return ValidatedCli on success
///
/// # Errors
///
/// Returns `ParseError` if any validation fails
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

/// Validate parsed CLI arguments
///
/// Applies security validation to all CLI arguments:
/// - Path canonicalization and security checks
/// - Numeric range validation
/// - String pattern validation
///
/// # Errors
///
/// Returns `ParseError` if any validation fails
fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = if let Some(ref path) = cli.config {
        // Config files may not exist yet on first run; validate the string only.
        SecureArgParser::validate_argument(&path.to_string_lossy())?;
        Some(path.clone())
    } else {
        None
    };

    if cli.channel_depth == 0 {
        return Err(ParseError::InvalidValue {
            arg: "channel-depth".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    if let Some(threads) = cli.cpu_threads {
        if threads == 0 || threads > 128 {
            return Err(ParseError::InvalidValue {
                arg: "cpu-threads".to_string(),
                reason: "must be between 1 and 128".to_string(),
            });
        }
    }

    if let Some(threads) = cli.io_threads {
        if threads == 0 || threads > 256 {
            return Err(ParseError::InvalidValue {
                arg: "io-threads".to_string(),
                reason: "must be between 1 and 256".to_string(),
            });
        }
    }

    let command = match cli.command {
        Commands::Upload {
            input,
            index,
            document_id,
            tag,
        } => {
            let validated_input = SecureArgParser::validate_path(&input.to_string_lossy())?;
            SecureArgParser::validate_argument(&index)?;

            if let Some(ref id) = document_id {
                SecureArgParser::validate_argument(id)?;
            }

            let mut tags = Vec::with_capacity(tag.len());
            for raw in &tag {
                tags.push(SecureArgParser::validate_tag_argument(raw)?);
            }

            ValidatedCommand::Upload {
                input: validated_input,
                index,
                document_id,
                tags,
            }
        }
        Commands::Status { index, document_id } => {
            SecureArgParser::validate_argument(&index)?;
            SecureArgParser::validate_argument(&document_id)?;
            ValidatedCommand::Status { index, document_id }
        }
        Commands::DeleteDocument { index, document_id } => {
            SecureArgParser::validate_argument(&index)?;
            SecureArgParser::validate_argument(&document_id)?;
            ValidatedCommand::DeleteDocument { index, document_id }
        }
        Commands::DeleteIndex { index, force } => {
            SecureArgParser::validate_argument(&index)?;
            ValidatedCommand::DeleteIndex { index, force }
        }
        Commands::Search { index, query, limit } => {
            SecureArgParser::validate_argument(&index)?;
            SecureArgParser::validate_argument(&query)?;

            if limit == 0 || limit > 1000 {
                return Err(ParseError::InvalidValue {
                    arg: "limit".to_string(),
                    reason: "must be between 1 and 1000".to_string(),
                });
            }

            ValidatedCommand::Search { index, query, limit }
        }
        Commands::Ask { index, question } => {
            SecureArgParser::validate_argument(&index)?;
            SecureArgParser::validate_argument(&question)?;
            ValidatedCommand::Ask { index, question }
        }
        Commands::QueueInspect { queue } => {
            SecureArgParser::validate_argument(&queue)?;
            ValidatedCommand::QueueInspect { queue }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        config,
        cpu_threads: cli.cpu_threads,
        io_threads: cli.io_threads,
        storage_type: cli.storage_type,
        channel_depth: cli.channel_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli(command: Commands) -> Cli {
        Cli {
            command,
            verbose: false,
            config: None,
            cpu_threads: None,
            io_threads: None,
            storage_type: None,
            channel_depth: 10,
        }
    }

    #[test]
    fn rejects_zero_channel_depth() {
        let mut cli = base_cli(Commands::QueueInspect {
            queue: "ingest".to_string(),
        });
        cli.channel_depth = 0;
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn rejects_reserved_tag_prefix_on_upload() {
        let cli = base_cli(Commands::Upload {
            input: PathBuf::from("/tmp/does-not-exist-for-test"),
            index: "docs".to_string(),
            document_id: None,
            tag: vec!["__reserved=x".to_string()],
        });
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn accepts_well_formed_status_command() {
        let cli = base_cli(Commands::Status {
            index: "docs".to_string(),
            document_id: "doc-1".to_string(),
        });
        let validated = validate_cli(cli).expect("status command should validate");
        assert!(matches!(validated.command, ValidatedCommand::Status { .. }));
    }

    #[test]
    fn rejects_out_of_range_search_limit() {
        let cli = base_cli(Commands::Search {
            index: "docs".to_string(),
            query: "rust ownership".to_string(),
            limit: 0,
        });
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidValue { .. })));
    }
}
