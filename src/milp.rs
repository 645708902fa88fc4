//! Binary integer program for driver-group assignment.
//!
//! Encodes the candidate universe as binary decisions and the scheduling
//! rules as linear rows, then hands the program to the branch-and-bound
//! engine. Variable creation order follows the ordered candidate maps,
//! so identical inputs always produce the identical program.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::bnb::{IntegerProgram, Row, Solution};
use crate::candidates::{combo_size_mismatch, solo_size_mismatch, CandidateSet};
use crate::model::{
    Assignment, AssignmentMap, ComboIdAllocator, DemandGroup, Driver, DriverId, GroupId,
};
use crate::timeline::{DriverSchedules, Interval};

/// What a variable means when it is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Driver solo-serves the group.
    Solo { group: GroupId, driver: DriverId },
    /// Driver serves both groups on one combined run.
    Combo {
        first: GroupId,
        second: GroupId,
        driver: DriverId,
    },
    /// Auxiliary "driver touches group" indicator.
    Touch { group: GroupId, driver: DriverId },
}

#[derive(Debug, Clone)]
pub struct AssignmentProgram {
    pub program: IntegerProgram,
    pub decisions: Vec<Decision>,
}

#[derive(Debug, Clone)]
pub struct ProgramParams {
    /// Big-M constant deactivating the minimality cap for untouched
    /// pairs. Must dominate the largest plausible seat total.
    pub big_m: f64,
    pub max_missions: u32,
}

/// Build the assignment program for `groups`.
///
/// `prior` carries commitments from an earlier pass: candidate missions
/// that collide with an existing interval are forced to zero and the
/// per-driver mission budget shrinks accordingly. `demand_overrides`
/// replaces a group's coverage requirement (used by the residual pass to
/// ask only for the remaining deficit).
pub fn build_program(
    groups: &[DemandGroup],
    drivers: &[Driver],
    candidates: &CandidateSet,
    prior: &DriverSchedules,
    demand_overrides: &HashMap<GroupId, f64>,
    params: &ProgramParams,
) -> AssignmentProgram {
    let group_ids: BTreeSet<GroupId> = groups.iter().map(|g| g.id).collect();
    let groups_by_id: HashMap<GroupId, &DemandGroup> = groups.iter().map(|g| (g.id, g)).collect();
    let drivers_by_id: HashMap<DriverId, &Driver> = drivers.iter().map(|d| (d.id, d)).collect();
    let seats = |driver: DriverId| -> f64 {
        drivers_by_id
            .get(&driver)
            .map_or(0.0, |d| d.seat_capacity as f64)
    };

    let mut costs = Vec::new();
    let mut decisions = Vec::new();

    let mut solo_vars: BTreeMap<(GroupId, DriverId), usize> = BTreeMap::new();
    for (&(group, driver), &cost) in &candidates.solo {
        if !group_ids.contains(&group) || !drivers_by_id.contains_key(&driver) {
            continue;
        }
        solo_vars.insert((group, driver), costs.len());
        costs.push(cost);
        decisions.push(Decision::Solo { group, driver });
    }

    let mut combo_vars: BTreeMap<(GroupId, GroupId, DriverId), usize> = BTreeMap::new();
    for (&(first, second, driver), &cost) in &candidates.combo {
        if !group_ids.contains(&first)
            || !group_ids.contains(&second)
            || !drivers_by_id.contains_key(&driver)
        {
            continue;
        }
        combo_vars.insert((first, second, driver), costs.len());
        costs.push(cost);
        decisions.push(Decision::Combo { first, second, driver });
    }

    // Every (group, driver) pair appearing in some x or y gets an
    // indicator variable.
    let mut touched: BTreeMap<(GroupId, DriverId), (Option<usize>, Vec<usize>)> = BTreeMap::new();
    for (&(group, driver), &var) in &solo_vars {
        touched.entry((group, driver)).or_default().0 = Some(var);
    }
    for (&(first, second, driver), &var) in &combo_vars {
        touched.entry((first, driver)).or_default().1.push(var);
        touched.entry((second, driver)).or_default().1.push(var);
    }

    let mut touch_vars: BTreeMap<(GroupId, DriverId), usize> = BTreeMap::new();
    for &(group, driver) in touched.keys() {
        touch_vars.insert((group, driver), costs.len());
        costs.push(0.0);
        decisions.push(Decision::Touch { group, driver });
    }

    let mut rows = Vec::new();

    // Coverage: solo contributions at full seat weight, combo
    // contributions at half weight.
    for group in groups {
        let mut coeffs = Vec::new();
        for (&(g, driver), &var) in &solo_vars {
            if g == group.id {
                coeffs.push((var, seats(driver)));
            }
        }
        for (&(first, second, driver), &var) in &combo_vars {
            if first == group.id || second == group.id {
                coeffs.push((var, 0.5 * seats(driver)));
            }
        }
        let demand = demand_overrides
            .get(&group.id)
            .copied()
            .unwrap_or(group.required_capacity as f64);
        rows.push(Row::ge(coeffs, demand));
    }

    // Indicator links: z rises with any activity on the pair and falls
    // to zero without it.
    for (&(group, driver), &(solo_var, ref combo_list)) in &touched {
        let z = touch_vars[&(group, driver)];
        if let Some(x) = solo_var {
            rows.push(Row::le(vec![(x, 1.0), (z, -1.0)], 0.0));
        }
        if !combo_list.is_empty() {
            let mut coeffs: Vec<(usize, f64)> =
                combo_list.iter().map(|&var| (var, 1.0)).collect();
            coeffs.push((z, -1.0));
            rows.push(Row::le(coeffs, 0.0));
        }
        let mut upper: Vec<(usize, f64)> = vec![(z, 1.0)];
        if let Some(x) = solo_var {
            upper.push((x, -1.0));
        }
        for &var in combo_list {
            upper.push((var, -1.0));
        }
        rows.push(Row::le(upper, 0.0));

        // Minimality cap: once this pair is active, the other drivers
        // together may not bring more than required - 1 seats.
        let group_data = groups_by_id[&group];
        let mut cap_coeffs = Vec::new();
        for (&(g, other), &var) in &solo_vars {
            if g == group && other != driver {
                cap_coeffs.push((var, seats(other)));
            }
        }
        for (&(first, second, other), &var) in &combo_vars {
            if other != driver && (first == group || second == group) {
                cap_coeffs.push((var, seats(other)));
            }
        }
        cap_coeffs.push((z, params.big_m));
        rows.push(Row::le(
            cap_coeffs,
            group_data.required_capacity as f64 - 1.0 + params.big_m,
        ));
    }

    // Per-driver scheduling: candidate missions with implied intervals,
    // pairwise exclusion of overlaps, and the mission budget.
    for driver in drivers {
        let mut missions: Vec<(usize, Interval)> = Vec::new();
        for (&(group, d), &var) in &solo_vars {
            if d != driver.id {
                continue;
            }
            let group_data = groups_by_id[&group];
            let start = group_data.pickup_offset_min as f64;
            let cost = candidates.solo[&(group, d)];
            missions.push((var, Interval::new(start, start + cost)));
        }
        for (&(first, second, d), &var) in &combo_vars {
            if d != driver.id {
                continue;
            }
            let start = groups_by_id[&first]
                .pickup_offset_min
                .min(groups_by_id[&second].pickup_offset_min) as f64;
            let cost = candidates.combo[&(first, second, d)];
            missions.push((var, Interval::new(start, start + cost)));
        }

        for &(var, ref interval) in &missions {
            if !prior.admits(driver.id, interval) {
                rows.push(Row::le(vec![(var, 1.0)], 0.0));
            }
        }
        for i in 0..missions.len() {
            for j in i + 1..missions.len() {
                if missions[i].1.overlaps(&missions[j].1) {
                    rows.push(Row::le(vec![(missions[i].0, 1.0), (missions[j].0, 1.0)], 1.0));
                }
            }
        }
        if !missions.is_empty() {
            let budget = params.max_missions.saturating_sub(prior.missions(driver.id));
            let coeffs = missions.iter().map(|&(var, _)| (var, 1.0)).collect();
            rows.push(Row::le(coeffs, budget as f64));
        }
    }

    // Capacity-size matching: small groups never ride oversized
    // vehicles.
    for (&(group, driver), &var) in &solo_vars {
        if solo_size_mismatch(groups_by_id[&group], drivers_by_id[&driver]) {
            rows.push(Row::le(vec![(var, 1.0)], 0.0));
        }
    }
    for (&(first, second, driver), &var) in &combo_vars {
        if combo_size_mismatch(
            groups_by_id[&first],
            groups_by_id[&second],
            drivers_by_id[&driver],
        ) {
            rows.push(Row::le(vec![(var, 1.0)], 0.0));
        }
    }

    debug!(
        variables = costs.len(),
        rows = rows.len(),
        groups = groups.len(),
        "assignment program built"
    );

    AssignmentProgram {
        program: IntegerProgram { costs, rows },
        decisions,
    }
}

/// Turn an engine solution into assignment records. Activated combos get
/// a fresh id from the call-scoped allocator, mirrored on both paired
/// groups.
pub fn extract_assignments(
    solution: &Solution,
    decisions: &[Decision],
    combo_ids: &mut ComboIdAllocator,
) -> AssignmentMap {
    let mut map = AssignmentMap::new();
    for (var, &active) in solution.values.iter().enumerate() {
        if !active {
            continue;
        }
        match decisions[var] {
            Decision::Solo { group, driver } => {
                map.entry(group).or_default().push(Assignment::solo(driver));
            }
            Decision::Combo { first, second, driver } => {
                let combo_id = combo_ids.allocate();
                map.entry(first)
                    .or_default()
                    .push(Assignment::combo(driver, combo_id, second));
                map.entry(second)
                    .or_default()
                    .push(Assignment::combo(driver, combo_id, first));
            }
            Decision::Touch { .. } => {}
        }
    }
    map
}
