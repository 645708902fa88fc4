//! dispatch-planner core
//!
//! Assigns a fleet of capacity-constrained drivers to grouped
//! transportation requests, combining two groups onto one run when
//! geography and timing allow. Exact branch-and-bound first, heuristic
//! cascade when the clock runs out, coverage completion last.

pub mod bnb;
pub mod candidates;
pub mod cost;
pub mod coverage;
pub mod error;
pub mod geo;
pub mod heuristic;
pub mod milp;
pub mod model;
pub mod solver;
pub mod timeline;
