//! Candidate universe construction.
//!
//! Builds every priceable (group, driver) solo pair and every priceable
//! (group, group, driver) combo triple. Combo triples are pre-filtered by
//! pickup-time gap and combined capacity before the four-order cost
//! evaluation runs; the pairwise sweep is O(G^2 * D) and fans out over
//! rayon.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use crate::cost::{combo_cost, solo_cost, CostParams};
use crate::model::{DemandGroup, Driver, DriverId, GroupId};

/// Feasible solo pairs, keyed `(group, driver)`.
pub type SoloCostMap = BTreeMap<(GroupId, DriverId), f64>;

/// Feasible combo triples, keyed `(group1, group2, driver)` with
/// `group1 < group2` so each unordered pair is counted once.
pub type ComboCostMap = BTreeMap<(GroupId, GroupId, DriverId), f64>;

/// Small groups must not monopolize large vehicles: a solo run may not
/// put a group of this size or smaller on an oversized vehicle.
pub const SMALL_GROUP_SEATS: u32 = 4;
/// Same rule for combined runs, applied when either group is this small.
pub const SMALL_COMBO_GROUP_SEATS: u32 = 3;
/// Seat count above which a vehicle counts as oversized.
pub const OVERSIZED_VEHICLE_SEATS: u32 = 4;

/// Capacity-size matching rule for solo runs.
pub fn solo_size_mismatch(group: &DemandGroup, driver: &Driver) -> bool {
    group.required_capacity <= SMALL_GROUP_SEATS
        && driver.seat_capacity > OVERSIZED_VEHICLE_SEATS
}

/// Capacity-size matching rule for combined runs.
pub fn combo_size_mismatch(g1: &DemandGroup, g2: &DemandGroup, driver: &Driver) -> bool {
    (g1.required_capacity <= SMALL_COMBO_GROUP_SEATS
        || g2.required_capacity <= SMALL_COMBO_GROUP_SEATS)
        && driver.seat_capacity > OVERSIZED_VEHICLE_SEATS
}

#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub solo: SoloCostMap,
    pub combo: ComboCostMap,
}

impl CandidateSet {
    pub fn build(groups: &[DemandGroup], drivers: &[Driver], params: &CostParams) -> Self {
        let mut solo = SoloCostMap::new();
        for group in groups {
            for driver in drivers {
                if let Some(cost) = solo_cost(driver, group) {
                    solo.insert((group.id, driver.id), cost);
                }
            }
        }

        // Unordered pairs, normalized so the smaller id comes first.
        let mut pairs: Vec<(&DemandGroup, &DemandGroup)> = Vec::new();
        for (i, g1) in groups.iter().enumerate() {
            for g2 in &groups[i + 1..] {
                let (a, b) = if g1.id < g2.id { (g1, g2) } else { (g2, g1) };
                if (a.pickup_offset_min - b.pickup_offset_min).abs() > params.max_offset_gap_min {
                    continue;
                }
                pairs.push((a, b));
            }
        }

        let combos: Vec<((GroupId, GroupId, DriverId), f64)> = pairs
            .par_iter()
            .flat_map_iter(|&(g1, g2)| {
                let needed = g1.required_capacity + g2.required_capacity;
                drivers.iter().filter_map(move |driver| {
                    if driver.seat_capacity < needed {
                        return None;
                    }
                    combo_cost(params, driver, g1, g2)
                        .map(|cost| ((g1.id, g2.id, driver.id), cost))
                })
            })
            .collect();
        let combo: ComboCostMap = combos.into_iter().collect();

        debug!(
            solo_candidates = solo.len(),
            combo_candidates = combo.len(),
            "candidate universe built"
        );

        Self { solo, combo }
    }

    /// Ids of groups that appear in at least one candidate.
    pub fn groups_with_candidates(&self) -> BTreeSet<GroupId> {
        let mut ids = BTreeSet::new();
        for &(group, _) in self.solo.keys() {
            ids.insert(group);
        }
        for &(g1, g2, _) in self.combo.keys() {
            ids.insert(g1);
            ids.insert(g2);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;

    fn group(id: u64, capacity: u32, offset: i64) -> DemandGroup {
        DemandGroup {
            id,
            required_capacity: capacity,
            pickup: Some(Point::new(48.86, 2.36)),
            dropoff: Some(Point::new(48.95, 2.45)),
            pickup_offset_min: offset,
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
    fn test_solo_candidates_skip_unresolved_groups() {
        let mut groups = vec![group(1, 3, 0), group(2, 3, 5)];
        groups[1].pickup = None;
        let drivers = vec![driver(10, 4)];

        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        assert!(candidates.solo.contains_key(&(1, 10)));
        assert!(!candidates.solo.contains_key(&(2, 10)));
    }

    #[test]
    fn test_combo_prefilter_capacity() {
        let groups = vec![group(1, 4, 0), group(2, 4, 5)];
        // Seats below the combined requirement: no combo triple at all.
        let drivers = vec![driver(10, 7)];

        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        assert!(candidates.combo.is_empty());

        let drivers = vec![driver(10, 8)];
        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        assert!(candidates.combo.contains_key(&(1, 2, 10)));
    }

    #[test]
    fn test_combo_prefilter_offset_gap() {
        let groups = vec![group(1, 4, 0), group(2, 4, 50)];
        let drivers = vec![driver(10, 8)];

        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        assert!(candidates.combo.is_empty());
    }

    #[test]
    fn test_combo_keys_ordered() {
        let groups = vec![group(7, 4, 5), group(3, 4, 0)];
        let drivers = vec![driver(10, 8)];

        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        assert!(candidates.combo.contains_key(&(3, 7, 10)));
        assert!(!candidates.combo.contains_key(&(7, 3, 10)));
    }

    #[test]
    fn test_groups_with_candidates() {
        let mut groups = vec![group(1, 3, 0), group(2, 3, 5)];
        groups[1].pickup = None;
        let drivers = vec![driver(10, 4)];

        let candidates = CandidateSet::build(&groups, &drivers, &CostParams::default());
        let ids = candidates.groups_with_candidates();
        assert!(ids.contains(&1));
        assert!(!ids.contains(&2));
    }
}
