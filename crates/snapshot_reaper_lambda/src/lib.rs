//! AWS-oriented adapters and handlers for orphan snapshot reconciliation.
//!
//! This crate owns runtime integration details (the EC2 provider adapter, the
//! Lambda handler, and tracing setup). The reconciliation algorithm itself
//! lives in `snapshot_reaper_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;
