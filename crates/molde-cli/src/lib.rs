// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI support library for the `molde` binary.

/// Subcommand implementations.
pub mod commands;
/// Terminal prompter for interactive generation.
pub mod prompter;
