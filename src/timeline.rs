//! Derived driver timelines for non-overlap and mission accounting.
//!
//! A timeline is never stored: it is rebuilt from the current assignment
//! map whenever a constraint set is needed, so every pass sees the same
//! intervals the assignments imply.

use std::collections::HashMap;

use crate::candidates::CandidateSet;
use crate::model::{AssignmentMap, DemandGroup, DriverId, RouteKind};

/// Half-open `[start, finish)` mission interval, minutes from "now".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub finish: f64,
}

impl Interval {
    pub fn new(start: f64, finish: f64) -> Self {
        Self { start, finish }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.finish && other.start < self.finish
    }
}

#[derive(Debug, Clone, Default)]
struct DriverLoad {
    intervals: Vec<Interval>,
    missions: u32,
}

/// Per-driver mission intervals and counts.
#[derive(Debug, Clone, Default)]
pub struct DriverSchedules {
    loads: HashMap<DriverId, DriverLoad>,
}

impl DriverSchedules {
    /// Number of missions the driver is already committed to. A combined
    /// run counts as one mission.
    pub fn missions(&self, driver: DriverId) -> u32 {
        self.loads.get(&driver).map_or(0, |load| load.missions)
    }

    /// Whether the candidate interval avoids every existing mission of
    /// the driver.
    pub fn admits(&self, driver: DriverId, candidate: &Interval) -> bool {
        self.loads.get(&driver).is_none_or(|load| {
            load.intervals
                .iter()
                .all(|existing| !existing.overlaps(candidate))
        })
    }

    pub fn record(&mut self, driver: DriverId, interval: Interval) {
        let load = self.loads.entry(driver).or_default();
        load.intervals.push(interval);
        load.missions += 1;
    }

    /// Rebuild a schedule from an assignment map. Combo records appear on
    /// both paired groups; the run is booked once, from the record on the
    /// smaller group id.
    pub fn from_assignments(
        map: &AssignmentMap,
        groups: &[DemandGroup],
        candidates: &CandidateSet,
    ) -> Self {
        let mut schedules = Self::default();
        schedules.extend_from_assignments(map, groups, candidates);
        schedules
    }

    pub fn extend_from_assignments(
        &mut self,
        map: &AssignmentMap,
        groups: &[DemandGroup],
        candidates: &CandidateSet,
    ) {
        let by_id: HashMap<_, _> = groups.iter().map(|g| (g.id, g)).collect();

        for (&group_id, assignments) in map {
            let Some(group) = by_id.get(&group_id) else {
                continue;
            };
            for assignment in assignments {
                match assignment.kind {
                    RouteKind::Solo => {
                        let Some(&cost) = candidates.solo.get(&(group_id, assignment.driver_id))
                        else {
                            continue;
                        };
                        let start = group.pickup_offset_min as f64;
                        self.record(assignment.driver_id, Interval::new(start, start + cost));
                    }
                    RouteKind::Combo => {
                        let Some(&partner_id) = assignment.paired_with.first() else {
                            continue;
                        };
                        if group_id > partner_id {
                            continue; // booked from the partner's record
                        }
                        let Some(partner) = by_id.get(&partner_id) else {
                            continue;
                        };
                        let key = (group_id, partner_id, assignment.driver_id);
                        let Some(&cost) = candidates.combo.get(&key) else {
                            continue;
                        };
                        let start = group.pickup_offset_min.min(partner.pickup_offset_min) as f64;
                        self.record(assignment.driver_id, Interval::new(start, start + cost));
                    }
                }
            }
        }
    }
}
