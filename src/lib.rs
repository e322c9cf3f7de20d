//! Withdrawal Approval - multi-party approval orchestration
//!
//! Two automated decision providers and one manual operator each render a
//! verdict on a withdrawal; the verdicts are folded under an override rule
//! and the payout runs exactly once, only after approval.
//!
//! # Modules
//!
//! - [`withdrawal`] - Record, state machine, store, record service
//! - [`runtime`] - Step retry/backoff, concurrent branches, suspend/resume
//! - [`callback`] - Continuation token per withdrawal, resume on decision
//! - [`providers`] - Automated (HTTP) and manual decision clients
//! - [`workflow`] - Approval aggregator and the workflow driving it
//! - [`server`] - HTTP surface of the record service
//! - [`decider`] - Decision provider simulator

// Record service
pub mod withdrawal;

// Orchestration
pub mod callback;
pub mod providers;
pub mod runtime;
pub mod workflow;

// Outer surfaces
pub mod decider;
pub mod server;

// Ambient
pub mod config;
pub mod logging;
