//! # Engine Module
//!
//! Stateful machinery behind the growth workflows.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - The immutable `GrowthConfig` value object and its builder
//! - **Run State** ([`state`]) - Atomically persisted progress record and the sentinel migration shim
//! - **External Collaborators** ([`external`]) - Preparer, interpolator, configurer, runner and
//!   selector contracts, their shipped implementations, and the cancellable process wrapper
//! - **Progress Monitoring** ([`progress`]) - Phase and iteration events for front ends
//! - **Error Handling** ([`error`]) - `EngineError` and the failure taxonomy of a run

pub mod config;
pub mod error;
pub mod external;
pub mod progress;
pub mod state;
