//! Driver-group assignment orchestration.
//!
//! End-to-end pipeline: candidate generation, exact solve, heuristic
//! fallback when the engine does not prove optimality, residual re-solve
//! for under-covered groups, and a final greedy top-up. The solver is a
//! pure computation over its input snapshot; concurrent calls with
//! independent inputs are safe.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{info, warn};

use crate::bnb::{self, SolveStatus};
use crate::candidates::CandidateSet;
use crate::cost::CostParams;
use crate::coverage;
use crate::error::SolveError;
use crate::heuristic::{Annealing, FallbackStrategy, Greedy};
use crate::milp::{build_program, extract_assignments, ProgramParams};
use crate::model::{
    AssignmentMap, ComboIdAllocator, DemandGroup, DispatchResult, Driver, GroupId,
};
use crate::timeline::DriverSchedules;

static GREEDY: Greedy = Greedy;

/// Which construction strategy backs the fallback cascade.
#[derive(Debug, Clone)]
pub enum FallbackKind {
    Greedy,
    Annealing(Annealing),
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Hard wall-clock budget for each exact solve.
    pub milp_time_limit: Duration,
    /// Big-M constant for the minimality cap. Must stay large relative
    /// to the biggest plausible seat totals.
    pub big_m: f64,
    pub max_missions_per_driver: u32,
    pub cost_params: CostParams,
    pub fallback: FallbackKind,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            milp_time_limit: Duration::from_secs(300),
            big_m: 1e4,
            max_missions_per_driver: 4,
            cost_params: CostParams::default(),
            fallback: FallbackKind::Greedy,
        }
    }
}

/// Compute a minimum-cost feasible assignment of drivers to demand
/// groups.
///
/// Never fails on expected shortfalls: groups that cannot be covered are
/// listed in the result. Only structurally invalid input is an error.
pub fn solve(
    groups: &[DemandGroup],
    drivers: &[Driver],
    options: &SolveOptions,
) -> Result<DispatchResult, SolveError> {
    validate(groups, drivers)?;

    if groups.is_empty() || drivers.is_empty() {
        info!(
            groups = groups.len(),
            drivers = drivers.len(),
            "nothing to dispatch"
        );
        return Ok(DispatchResult::default());
    }

    info!(
        groups = groups.len(),
        drivers = drivers.len(),
        "dispatch solve started"
    );
    let candidates = CandidateSet::build(groups, drivers, &options.cost_params);
    let program_params = ProgramParams {
        big_m: options.big_m,
        max_missions: options.max_missions_per_driver,
    };
    let fallback: &dyn FallbackStrategy = match &options.fallback {
        FallbackKind::Greedy => &GREEDY,
        FallbackKind::Annealing(annealing) => annealing,
    };
    let mut combo_ids = ComboIdAllocator::new();

    // Groups with no candidate at all (unresolved coordinates) cannot be
    // served by any decision; they skip the exact model and surface in
    // the uncovered set.
    let with_candidates = candidates.groups_with_candidates();
    let primary: Vec<DemandGroup> = groups
        .iter()
        .filter(|g| with_candidates.contains(&g.id))
        .cloned()
        .collect();

    let built = build_program(
        &primary,
        drivers,
        &candidates,
        &DriverSchedules::default(),
        &HashMap::new(),
        &program_params,
    );
    let solution = bnb::solve(&built.program, options.milp_time_limit);
    info!(
        status = ?solution.status,
        objective = solution.objective,
        "exact solve finished"
    );

    let mut map = if solution.status == SolveStatus::Optimal {
        extract_assignments(&solution, &built.decisions, &mut combo_ids)
    } else {
        warn!(status = ?solution.status, "exact solve not optimal, running fallback");
        fallback.construct(
            groups,
            drivers,
            &candidates,
            &DriverSchedules::default(),
            &HashMap::new(),
            options.max_missions_per_driver,
        )
    };

    // Residual pass over the under-covered subset, honoring the
    // commitments already made.
    let uncovered = coverage::uncovered_groups(groups, &map, drivers);
    if !uncovered.is_empty() {
        warn!(
            count = uncovered.len(),
            "groups under-covered after primary pass, re-solving residual"
        );
        let residual: Vec<DemandGroup> = uncovered.into_iter().cloned().collect();
        let overrides = remaining_demand(&residual, &map, drivers);
        let prior = DriverSchedules::from_assignments(&map, groups, &candidates);

        let residual_ip: Vec<DemandGroup> = residual
            .iter()
            .filter(|g| with_candidates.contains(&g.id))
            .cloned()
            .collect();
        let built = build_program(
            &residual_ip,
            drivers,
            &candidates,
            &prior,
            &overrides,
            &program_params,
        );
        let solution = bnb::solve(&built.program, options.milp_time_limit);

        let additions = if solution.status == SolveStatus::Optimal {
            extract_assignments(&solution, &built.decisions, &mut combo_ids)
        } else {
            warn!(status = ?solution.status, "residual exact solve not optimal, running fallback");
            fallback.construct(
                &residual,
                drivers,
                &candidates,
                &prior,
                &overrides,
                options.max_missions_per_driver,
            )
        };
        for (group_id, mut assignments) in additions {
            map.entry(group_id).or_default().append(&mut assignments);
        }
    }

    coverage::greedy_top_up(
        groups,
        drivers,
        &candidates,
        &mut map,
        options.max_missions_per_driver,
    );

    let uncovered: Vec<GroupId> = coverage::uncovered_groups(groups, &map, drivers)
        .iter()
        .map(|g| g.id)
        .collect();
    for &group_id in &uncovered {
        warn!(group = group_id, "group remains under-covered");
    }
    info!(
        assigned_groups = map.len(),
        uncovered = uncovered.len(),
        "dispatch solve finished"
    );

    Ok(DispatchResult {
        assignments: map,
        uncovered,
    })
}

/// Remaining coverage deficit per residual group.
fn remaining_demand(
    residual: &[DemandGroup],
    map: &AssignmentMap,
    drivers: &[Driver],
) -> HashMap<GroupId, f64> {
    let drivers_by_id: HashMap<_, _> = drivers.iter().map(|d| (d.id, d)).collect();
    residual
        .iter()
        .map(|group| {
            let covered = map
                .get(&group.id)
                .map_or(0.0, |a| coverage::covered_capacity(a, &drivers_by_id));
            (
                group.id,
                (group.required_capacity as f64 - covered).max(0.0),
            )
        })
        .collect()
}

fn validate(groups: &[DemandGroup], drivers: &[Driver]) -> Result<(), SolveError> {
    let mut seen_groups = HashSet::new();
    for group in groups {
        if group.required_capacity == 0 {
            return Err(SolveError::InvalidGroupCapacity(group.id));
        }
        if !seen_groups.insert(group.id) {
            return Err(SolveError::DuplicateGroup(group.id));
        }
    }
    let mut seen_drivers = HashSet::new();
    for driver in drivers {
        if driver.seat_capacity == 0 {
            return Err(SolveError::InvalidDriverCapacity(driver.id));
        }
        if !seen_drivers.insert(driver.id) {
            return Err(SolveError::DuplicateDriver(driver.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;

    fn group(id: u64, capacity: u32) -> DemandGroup {
        DemandGroup {
            id,
            required_capacity: capacity,
            pickup: Some(Point::new(48.86, 2.36)),
            dropoff: Some(Point::new(48.95, 2.45)),
            pickup_offset_min: 0,
            base_trip_duration_min: 20.0,
        }
    }

    fn driver(id: u64, seats: u32) -> Driver {
        Driver {
            id,
            seat_capacity: seats,
            home: Some(Point::new(48.85, 2.35)),
        }
    }

    #[test]
    fn test_zero_group_capacity_is_an_error() {
        let result = solve(&[group(1, 0)], &[driver(10, 4)], &SolveOptions::default());
        assert_eq!(result, Err(SolveError::InvalidGroupCapacity(1)));
    }

    #[test]
    fn test_zero_seat_capacity_is_an_error() {
        let result = solve(&[group(1, 3)], &[driver(10, 0)], &SolveOptions::default());
        assert_eq!(result, Err(SolveError::InvalidDriverCapacity(10)));
    }

    #[test]
    fn test_duplicate_ids_are_errors() {
        let result = solve(
            &[group(1, 3), group(1, 2)],
            &[driver(10, 4)],
            &SolveOptions::default(),
        );
        assert_eq!(result, Err(SolveError::DuplicateGroup(1)));

        let result = solve(
            &[group(1, 3)],
            &[driver(10, 4), driver(10, 4)],
            &SolveOptions::default(),
        );
        assert_eq!(result, Err(SolveError::DuplicateDriver(10)));
    }

    #[test]
    fn test_empty_input_is_a_noop() {
        let result = solve(&[], &[], &SolveOptions::default()).unwrap();
        assert!(result.assignments.is_empty());
        assert!(result.uncovered.is_empty());

        let result = solve(&[group(1, 3)], &[], &SolveOptions::default()).unwrap();
        assert!(result.assignments.is_empty());
    }
}
