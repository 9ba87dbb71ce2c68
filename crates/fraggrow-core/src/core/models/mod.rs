//! Data models for growth runs and their iterations.

pub mod iteration;
pub mod run;
