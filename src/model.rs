//! Core domain types for the dispatch planner.
//!
//! Inputs are snapshots prepared by the upstream grouping and
//! availability collaborators; they are immutable during a solve. The
//! output `DispatchResult` is consumed verbatim by persistence and
//! reporting downstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::Point;

pub type GroupId = u64;
pub type DriverId = u64;
pub type ComboId = u64;

/// A batched transportation request: a set of passengers sharing a
/// pickup, a dropoff, and a requested pickup time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandGroup {
    pub id: GroupId,
    /// Passengers to move. Must be positive.
    pub required_capacity: u32,
    /// Pickup coordinates; `None` when the address could not be resolved.
    /// Unresolved groups never enter a candidate set.
    pub pickup: Option<Point>,
    /// Dropoff coordinates; `None` when the address could not be resolved.
    pub dropoff: Option<Point>,
    /// Requested pickup time in minutes from "now" at solve time.
    /// Signed: past-due requests are negative. Recomputed by the caller
    /// on every invocation, never stored as relative.
    pub pickup_offset_min: i64,
    /// Driving time pickup -> dropoff for this group alone, in minutes.
    pub base_trip_duration_min: f64,
}

/// A driver available for the requested window, with the vehicle seat
/// count and home base. Availability filtering happens upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    /// Vehicle seat count. Must be positive.
    pub seat_capacity: u32,
    /// Home coordinates; `None` when the address could not be resolved.
    pub home: Option<Point>,
}

/// How a driver serves a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    /// One continuous run serving this group only.
    Solo,
    /// One continuous run shared with a second group; each group is
    /// credited half the vehicle capacity.
    Combo,
}

/// One driver's contribution to a group's coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub driver_id: DriverId,
    pub kind: RouteKind,
    /// Shared by both records of a combined run; unique per solve call.
    pub combo_id: Option<ComboId>,
    /// The other group(s) on the same run, mirrored on both records.
    pub paired_with: Vec<GroupId>,
}

impl Assignment {
    pub(crate) fn solo(driver_id: DriverId) -> Self {
        Self {
            driver_id,
            kind: RouteKind::Solo,
            combo_id: None,
            paired_with: Vec::new(),
        }
    }

    pub(crate) fn combo(driver_id: DriverId, combo_id: ComboId, paired_with: GroupId) -> Self {
        Self {
            driver_id,
            kind: RouteKind::Combo,
            combo_id: Some(combo_id),
            paired_with: vec![paired_with],
        }
    }
}

/// Final assignment per group. Ordered so iteration and extraction are
/// deterministic across runs.
pub type AssignmentMap = BTreeMap<GroupId, Vec<Assignment>>;

/// Outcome of a solve: the assignment map plus the groups whose covered
/// capacity still falls short of their requirement. A non-empty
/// `uncovered` list is an expected terminal state when fleet capacity is
/// insufficient, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub assignments: AssignmentMap,
    pub uncovered: Vec<GroupId>,
}

/// Call-scoped combo id allocator. Passed explicitly through assignment
/// extraction so ids stay unique within one solve without process-wide
/// state.
#[derive(Debug)]
pub struct ComboIdAllocator {
    next: ComboId,
}

impl ComboIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> ComboId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for ComboIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
