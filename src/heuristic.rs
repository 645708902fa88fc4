//! Fallback construction for when the exact solve does not reach
//! optimality.
//!
//! The deterministic greedy constructor is the canonical fallback; the
//! simulated-annealing refiner is an opt-in alternative behind the same
//! interface. Both produce solo assignments only; combined runs come
//! exclusively from the exact path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::candidates::{solo_size_mismatch, CandidateSet};
use crate::model::{Assignment, AssignmentMap, DemandGroup, Driver, DriverId, GroupId, RouteKind};
use crate::timeline::{DriverSchedules, Interval};

const EPS: f64 = 1e-9;

/// A construction strategy for groups the exact solve left behind.
///
/// `prior` holds commitments from earlier passes and must be respected;
/// `demand_overrides` replaces a group's coverage requirement (the
/// residual pass asks only for the remaining deficit).
pub trait FallbackStrategy {
    fn construct(
        &self,
        groups: &[DemandGroup],
        drivers: &[Driver],
        candidates: &CandidateSet,
        prior: &DriverSchedules,
        demand_overrides: &HashMap<GroupId, f64>,
        max_missions: u32,
    ) -> AssignmentMap;
}

/// Deterministic greedy constructor: groups in pickup-time order, drivers
/// in descending-capacity order, first feasible wins, partial coverage
/// accumulates across drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl FallbackStrategy for Greedy {
    fn construct(
        &self,
        groups: &[DemandGroup],
        drivers: &[Driver],
        candidates: &CandidateSet,
        prior: &DriverSchedules,
        demand_overrides: &HashMap<GroupId, f64>,
        max_missions: u32,
    ) -> AssignmentMap {
        info!(groups = groups.len(), drivers = drivers.len(), "greedy construction");

        let mut sorted_groups: Vec<&DemandGroup> = groups.iter().collect();
        sorted_groups.sort_by_key(|g| (g.pickup_offset_min, g.id));
        let mut sorted_drivers: Vec<&Driver> = drivers.iter().collect();
        sorted_drivers.sort_by(|a, b| {
            b.seat_capacity
                .cmp(&a.seat_capacity)
                .then(a.id.cmp(&b.id))
        });

        let mut schedules = prior.clone();
        let mut map = AssignmentMap::new();

        for group in sorted_groups {
            let mut remaining = demand_overrides
                .get(&group.id)
                .copied()
                .unwrap_or(group.required_capacity as f64);

            for driver in &sorted_drivers {
                if remaining <= EPS {
                    break;
                }
                if schedules.missions(driver.id) >= max_missions {
                    continue;
                }
                if solo_size_mismatch(group, driver) {
                    continue;
                }
                let Some(&cost) = candidates.solo.get(&(group.id, driver.id)) else {
                    continue;
                };
                let start = group.pickup_offset_min as f64;
                let interval = Interval::new(start, start + cost);
                if !schedules.admits(driver.id, &interval) {
                    continue;
                }

                map.entry(group.id).or_default().push(Assignment::solo(driver.id));
                schedules.record(driver.id, interval);
                remaining -= driver.seat_capacity as f64;
            }

            if remaining > EPS {
                debug!(group = group.id, "greedy pass left group under-covered");
            }
        }

        map
    }
}

/// Simulated-annealing refiner over the greedy seed.
///
/// Perturbs one group's solo driver at a time and accepts by a cooling
/// temperature schedule under a wall-clock budget. Perturbations keep
/// the solution schedulable, so the refinement never trades coverage or
/// feasibility for cost.
#[derive(Debug, Clone)]
pub struct Annealing {
    pub budget: Duration,
    pub initial_temperature: f64,
    pub min_temperature: f64,
    pub cooling: f64,
    pub seed: u64,
}

impl Default for Annealing {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(600),
            initial_temperature: 100.0,
            min_temperature: 1e-3,
            cooling: 0.995,
            seed: 0,
        }
    }
}

impl FallbackStrategy for Annealing {
    fn construct(
        &self,
        groups: &[DemandGroup],
        drivers: &[Driver],
        candidates: &CandidateSet,
        prior: &DriverSchedules,
        demand_overrides: &HashMap<GroupId, f64>,
        max_missions: u32,
    ) -> AssignmentMap {
        let started = Instant::now();
        let seed_map =
            Greedy.construct(groups, drivers, candidates, prior, demand_overrides, max_missions);
        info!(groups = groups.len(), "annealing refinement over greedy seed");

        let total_cost = |map: &AssignmentMap| -> f64 {
            map.iter()
                .flat_map(|(&group, assignments)| {
                    assignments.iter().map(move |a| {
                        candidates
                            .solo
                            .get(&(group, a.driver_id))
                            .copied()
                            .unwrap_or(0.0)
                    })
                })
                .sum()
        };

        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut current = seed_map;
        let mut current_cost = total_cost(&current);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut temperature = self.initial_temperature;

        while temperature > self.min_temperature && started.elapsed() < self.budget {
            temperature *= self.cooling;

            // Only singly-covered groups are perturbed; partial coverage
            // built from several drivers stays untouched.
            let eligible: Vec<&DemandGroup> = groups
                .iter()
                .filter(|g| {
                    current.get(&g.id).is_some_and(|assignments| {
                        assignments.len() == 1 && assignments[0].kind == RouteKind::Solo
                    })
                })
                .collect();
            if eligible.is_empty() {
                break;
            }

            let group = eligible[rng.gen_range(0..eligible.len())];
            let demand = demand_overrides
                .get(&group.id)
                .copied()
                .unwrap_or(group.required_capacity as f64);
            let incumbent_driver = current[&group.id][0].driver_id;

            let alternatives: Vec<DriverId> = drivers
                .iter()
                .filter(|d| {
                    d.id != incumbent_driver
                        && d.seat_capacity as f64 + EPS >= demand
                        && !solo_size_mismatch(group, d)
                        && candidates.solo.contains_key(&(group.id, d.id))
                })
                .map(|d| d.id)
                .collect();
            if alternatives.is_empty() {
                continue;
            }

            let replacement = alternatives[rng.gen_range(0..alternatives.len())];
            let mut trial = current.clone();
            trial.insert(group.id, vec![Assignment::solo(replacement)]);
            if !is_schedulable(&trial, groups, candidates, prior, max_missions) {
                continue;
            }

            let trial_cost = total_cost(&trial);
            let delta = trial_cost - current_cost;
            if delta < 0.0 || rng.gen_range(0.0..1.0) < (-delta / temperature).exp() {
                current = trial;
                current_cost = trial_cost;
                if current_cost < best_cost {
                    best = current.clone();
                    best_cost = current_cost;
                }
            }
        }

        debug!(
            cost = best_cost,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "annealing done"
        );
        best
    }
}

/// Whether a solo-only assignment map fits on top of the prior
/// commitments without overlaps or mission-cap violations.
fn is_schedulable(
    map: &AssignmentMap,
    groups: &[DemandGroup],
    candidates: &CandidateSet,
    prior: &DriverSchedules,
    max_missions: u32,
) -> bool {
    let by_id: HashMap<GroupId, &DemandGroup> = groups.iter().map(|g| (g.id, g)).collect();
    let mut schedules = prior.clone();

    for (&group_id, assignments) in map {
        let Some(group) = by_id.get(&group_id) else {
            continue;
        };
        for assignment in assignments {
            let Some(&cost) = candidates.solo.get(&(group_id, assignment.driver_id)) else {
                return false;
            };
            let start = group.pickup_offset_min as f64;
            let interval = Interval::new(start, start + cost);
            if schedules.missions(assignment.driver_id) >= max_missions {
                return false;
            }
            if !schedules.admits(assignment.driver_id, &interval) {
                return false;
            }
            schedules.record(assignment.driver_id, interval);
        }
    }
    true
}
