//! Shared test utilities for registratura integration tests.
//!
//! This module provides:
//! - `TestHarness` with an in-memory database and a temp-dir blob store
//! - Fake `Mailbox` and `PushDelivery` implementations
//! - Builders for messages and PDF/PNG/JPEG/DOCX fixtures

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeMailbox, ScriptedDelivery, TestHarness};
