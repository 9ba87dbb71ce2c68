//! # FragGrow Core Library
//!
//! Restart-safe orchestration of simulation-driven fragment growing: an initial
//! ligand template is morphed into a target template over `N` steps, each step
//! simulated externally, with the best structures of one step seeding the next.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout.
//!
//! - **[`core`]: The Foundation.** Stateless models (`GrowthRun`, candidate pools),
//!   the closed-form overlap schedule, the on-disk layout of a run and the plain-text
//!   formats exchanged with external tools.
//!
//! - **[`engine`]: The Machinery.** Configuration, persisted run state, progress events,
//!   and the contracts and implementations of the external collaborators (template
//!   builder, control-file renderer, simulation launcher, structure selector).
//!
//! - **[`workflows`]: The Public API.** The growth state machine and the series runner,
//!   which sequence the engine's collaborators and recover from partial completion.

pub mod core;
pub mod engine;
pub mod workflows;
