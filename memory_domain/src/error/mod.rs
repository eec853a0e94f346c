// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Handling
//!
//! Flat, categorized error type for the whole semantic memory system.

mod memory_error;

pub use memory_error::{ErrorCategory, MemoryError};
