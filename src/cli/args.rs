// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::Parser;
use std::path::PathBuf;

/// Parley - multi-provider AI chat for your terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about = "Multi-provider AI chat for your terminal")]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Provider to use for this session
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use for this session
    #[arg(short, long)]
    pub model: Option<String>,

    /// Chat to open on startup
    #[arg(short, long)]
    pub chat: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
