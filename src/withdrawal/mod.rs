//! Withdrawal Record Service
//!
//! Owns the withdrawal records and their state machine.
//!
//! # State Machine
//!
//! ```text
//!            approve (override rule)          payout
//! PENDING ───────────────────────▶ APPROVED ─────────▶ COMPLETED
//!    │                                 │
//!    └── reject(manual) ──▶ REJECTED ◀─┘ reject(manual)
//! ```
//!
//! COMPLETED and REJECTED are terminal. COMPLETED ignores a manual reject.
//!
//! Global state is derived from the per-domain verdicts: APPROVED iff
//! `(sports && casino approved && manual != rejected) || manual approved`.
//! A rejection from an automated domain is recorded on the domain only.
//!
//! # Concurrency
//!
//! Every mutation is a read-modify-write under the store's compare-and-swap,
//! so concurrent decisions on one id never lose an update.

pub mod error;
pub mod record;
pub mod service;
pub mod state;
pub mod store;

pub use error::WithdrawalError;
pub use record::{Transition, Withdrawal};
pub use service::WithdrawalService;
pub use state::{Domain, DomainState, DomainStates, WithdrawalAction, WithdrawalState};
pub use store::{InMemoryWithdrawalStore, WithdrawalStore, WithdrawalStoreBox};
