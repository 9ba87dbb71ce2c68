//! Readers and writers for the plain-text files exchanged with the simulator
//! and supplied by the user.
//!
//! Reports and trajectories are produced by the external simulation, control
//! files are rendered for it, and instruction and transformation lists are
//! written by hand.

pub mod control;
pub mod instructions;
pub mod pdb;
pub mod report;
pub mod transform;
