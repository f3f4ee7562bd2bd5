// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Driftbottle integration tests.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted classification provider (text, refusal, failure)
//! - [`TestHarness`] - Registry, manual clock, and dispatcher wired together

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockProvider, MockReply};
