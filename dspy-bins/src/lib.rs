//! Shared wiring for the `dspy-engine` binary.
//!
//! A thin library sitting alongside the `[[bin]]` targets that factors out
//! CLI parsing, logging setup, and post-run reporting so the binaries
//! themselves stay short.

pub mod common;
pub mod synthetic_feed;
