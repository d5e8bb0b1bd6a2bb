//! reva - autonomous repository agent.
//!
//! The agent orchestrator sequences read, LLM-transform, safety-check,
//! write, and commit operations over four capabilities:
//!
//! ```text
//! ┌─────────────┐
//! │     CLI     │
//! └──────┬──────┘
//!        │
//! ┌──────┴──────┐
//! │    Agent    │
//! └──────┬──────┘
//!        │
//!  files · git · runner · llm
//! ```
//!
//! Writes pass through a protected-pattern gate and are simulated under
//! dry run; reads and command execution are never gated.

pub mod cli;
pub mod config;
pub mod core;

pub use config::Config;
pub use core::agent::Agent;
pub use core::error::{Error, Result};
