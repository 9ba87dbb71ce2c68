//! # Core Module
//!
//! Stateless building blocks of fragment growing: the description of a growth
//! run, the overlap schedule, the filesystem layout a run owns, and the file
//! formats exchanged with external tools.
//!
//! ## Architecture
//!
//! - **Models** ([`models`]) - `GrowthRun`, candidate pools and per-iteration state
//! - **Schedule** ([`schedule`]) - Closed-form overlap-factor interpolation
//! - **Layout** ([`layout`]) - Folder and file naming for one run identifier
//! - **File I/O** ([`io`]) - Reports, trajectories, control templates and input lists
//!
//! Nothing in this module keeps state between calls; everything a run needs to
//! resume is re-derived from its inputs and the files on disk.

pub mod io;
pub mod layout;
pub mod models;
pub mod schedule;
