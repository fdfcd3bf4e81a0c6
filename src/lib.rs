//! Library entrypoint for update-pyproject.
//!
//! The primary interface is the `update-pyproject` binary. This lib target
//! exposes the rewrite pipeline to integration tests.

pub mod channel;
pub mod config;
pub mod env;
pub mod error;
pub mod output;
pub mod prepare;
pub mod rewrite;
pub mod version;
