// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider abstraction for Parley
//!
//! The orchestrator consumes AI providers through the `ChatProvider`
//! trait; construction, credential preflight, and caching live in the
//! factory.

pub mod factory;
pub mod mock;
pub mod provider;

pub use factory::{ProviderContext, ProviderFactory};
pub use mock::MockProvider;
pub use provider::*;
