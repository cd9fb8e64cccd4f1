//! Shared test utilities for voiceforge integration tests.
//!
//! This module provides:
//! - `FakeGateway`, a scripted synthesis service with load instrumentation
//! - `CountingSink`, a notification sink that records every call
//! - Builders for configurations, submissions and services

pub mod builders;
pub mod gateway;
pub mod sink;

pub use builders::*;
pub use gateway::FakeGateway;
pub use sink::CountingSink;
