// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command-line interface: argument definitions and prompt input parsing.

pub mod args;
pub mod input;

pub use args::Cli;
pub use input::{help_text, parse_input, Command, Input};
