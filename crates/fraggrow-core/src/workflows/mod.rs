//! # Workflows Module
//!
//! High-level entry points that sequence the external collaborators into
//! complete growth procedures.
//!
//! - **Growth Workflow** ([`grow`]) - One restart-safe growth run: preparation,
//!   `N + 1` growing iterations and the equilibration pass.
//! - **Series Workflow** ([`series`]) - Chains of growth runs read from an
//!   instruction file, each chained run seeded by its predecessor's selection.

pub mod grow;
pub mod series;
