//! Error taxonomy for the dispatch planner.
//!
//! Only structurally invalid input aborts a solve. Everything else
//! (missing coordinates, non-optimal engine outcomes, residual uncovered
//! demand) is absorbed into the fallback cascade and reported in the
//! result instead of raised.

use thiserror::Error;

use crate::model::{DriverId, GroupId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("demand group {0} has zero required capacity")]
    InvalidGroupCapacity(GroupId),

    #[error("driver {0} has zero seat capacity")]
    InvalidDriverCapacity(DriverId),

    #[error("duplicate demand group id {0}")]
    DuplicateGroup(GroupId),

    #[error("duplicate driver id {0}")]
    DuplicateDriver(DriverId),
}
