//! Coverage audit and completion pass.
//!
//! After the primary solve, each group's covered capacity is the sum of
//! full seat counts from solo assignments and half seat counts from
//! combined ones. Groups below their requirement go through a residual
//! re-solve and, last, a best-effort greedy top-up. Whatever is still
//! short is reported, not raised.

use std::collections::HashMap;

use tracing::debug;

use crate::candidates::{solo_size_mismatch, CandidateSet};
use crate::model::{Assignment, AssignmentMap, DemandGroup, Driver, DriverId, RouteKind};
use crate::timeline::{DriverSchedules, Interval};

const EPS: f64 = 1e-9;

/// Seat capacity credited to one group by its assignments: solo at full
/// weight, combo at half weight.
pub fn covered_capacity(
    assignments: &[Assignment],
    drivers_by_id: &HashMap<DriverId, &Driver>,
) -> f64 {
    assignments
        .iter()
        .map(|assignment| {
            let seats = drivers_by_id
                .get(&assignment.driver_id)
                .map_or(0.0, |d| d.seat_capacity as f64);
            match assignment.kind {
                RouteKind::Solo => seats,
                RouteKind::Combo => 0.5 * seats,
            }
        })
        .sum()
}

/// Groups whose covered capacity falls short of their requirement.
pub fn uncovered_groups<'a>(
    groups: &'a [DemandGroup],
    map: &AssignmentMap,
    drivers: &[Driver],
) -> Vec<&'a DemandGroup> {
    let drivers_by_id: HashMap<DriverId, &Driver> = drivers.iter().map(|d| (d.id, d)).collect();

    groups
        .iter()
        .filter(|group| {
            let covered = map
                .get(&group.id)
                .map_or(0.0, |assignments| covered_capacity(assignments, &drivers_by_id));
            covered + EPS < group.required_capacity as f64
        })
        .collect()
}

/// Final best-effort pass: for each still-under-covered group, append
/// solo assignments from the candidate map in descending-capacity driver
/// order until the group is covered or drivers run out. Appended runs
/// still honor the size rule, the mission cap, and the timeline, so the
/// merged result keeps its scheduling invariants.
pub fn greedy_top_up(
    groups: &[DemandGroup],
    drivers: &[Driver],
    candidates: &CandidateSet,
    map: &mut AssignmentMap,
    max_missions: u32,
) {
    let drivers_by_id: HashMap<DriverId, &Driver> = drivers.iter().map(|d| (d.id, d)).collect();
    let mut by_capacity: Vec<&Driver> = drivers.iter().collect();
    by_capacity.sort_by(|a, b| {
        b.seat_capacity
            .cmp(&a.seat_capacity)
            .then(a.id.cmp(&b.id))
    });

    let mut schedules = DriverSchedules::from_assignments(map, groups, candidates);

    for group in groups {
        let mut covered = map
            .get(&group.id)
            .map_or(0.0, |assignments| covered_capacity(assignments, &drivers_by_id));
        if covered + EPS >= group.required_capacity as f64 {
            continue;
        }

        for driver in &by_capacity {
            if covered + EPS >= group.required_capacity as f64 {
                break;
            }
            let Some(&cost) = candidates.solo.get(&(group.id, driver.id)) else {
                continue;
            };
            if solo_size_mismatch(group, driver) {
                continue;
            }
            if schedules.missions(driver.id) >= max_missions {
                continue;
            }
            let start = group.pickup_offset_min as f64;
            let interval = Interval::new(start, start + cost);
            if !schedules.admits(driver.id, &interval) {
                continue;
            }

            debug!(group = group.id, driver = driver.id, "top-up assignment");
            map.entry(group.id).or_default().push(Assignment::solo(driver.id));
            schedules.record(driver.id, interval);
            covered += driver.seat_capacity as f64;
        }
    }
}
