//! Solo and combined route cost model.
//!
//! Costs are total drive minutes for a driver's full run, home to home.
//! Cost computation never fails a solve: a pair that cannot be priced
//! (missing coordinates, no feasible visiting order) is simply absent
//! from the candidate universe.

use crate::geo::travel_minutes;
use crate::model::{DemandGroup, Driver};

/// Feasibility thresholds for combined routes.
#[derive(Debug, Clone)]
pub struct CostParams {
    /// Maximum requested-pickup gap between two combined groups (minutes).
    pub max_offset_gap_min: i64,
    /// Maximum extra wait at pickup versus riding solo (minutes).
    pub max_pickup_delay_min: f64,
    /// Maximum extra time to destination versus riding solo (minutes).
    pub max_arrival_delay_min: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            max_offset_gap_min: 45,
            max_pickup_delay_min: 40.0,
            max_arrival_delay_min: 60.0,
        }
    }
}

/// Round-trip cost of a driver serving one group alone:
/// home -> pickup travel, the group's own trip duration, dropoff -> home
/// travel. `None` when any coordinate is unresolved.
pub fn solo_cost(driver: &Driver, group: &DemandGroup) -> Option<f64> {
    let home = driver.home?;
    let pickup = group.pickup?;
    let dropoff = group.dropoff?;

    Some(
        travel_minutes(home, pickup)
            + group.base_trip_duration_min
            + travel_minutes(dropoff, home),
    )
}

/// Cost of one candidate visiting order for a combined run.
struct OrderEvaluation {
    total: f64,
    pickup_delay_g1: f64,
    pickup_delay_g2: f64,
    arrival_delay_g1: f64,
    arrival_delay_g2: f64,
}

/// Cheapest feasible combined run serving both groups, or `None`.
///
/// Rejects outright when the requested pickup times are more than
/// `max_offset_gap_min` apart. Otherwise evaluates the four visiting
/// orders (which group is picked up first, which is dropped off first)
/// and keeps an order only if both groups' pickup delays and arrival
/// delays, measured against their solo baselines, stay within the
/// thresholds.
pub fn combo_cost(
    params: &CostParams,
    driver: &Driver,
    g1: &DemandGroup,
    g2: &DemandGroup,
) -> Option<f64> {
    if (g1.pickup_offset_min - g2.pickup_offset_min).abs() > params.max_offset_gap_min {
        return None;
    }

    let home = driver.home?;
    let pickup1 = g1.pickup?;
    let pickup2 = g2.pickup?;
    let dropoff1 = g1.dropoff?;
    let dropoff2 = g2.dropoff?;

    // Delay accounting needs the solo baselines; without them the combo
    // cannot be judged.
    let solo1 = solo_cost(driver, g1)?;
    let solo2 = solo_cost(driver, g2)?;

    // Combined-route legs are rounded to whole minutes.
    let leg = |from, to| travel_minutes(from, to).round();

    let offset_gap_21 = (g2.pickup_offset_min - g1.pickup_offset_min) as f64;
    let offset_gap_12 = (g1.pickup_offset_min - g2.pickup_offset_min) as f64;

    let mut best: Option<f64> = None;
    for g1_picked_first in [true, false] {
        for g1_dropped_first in [true, false] {
            let (first_pickup, second_pickup) = if g1_picked_first {
                (pickup1, pickup2)
            } else {
                (pickup2, pickup1)
            };
            let (first_dropoff, second_dropoff) = if g1_dropped_first {
                (dropoff1, dropoff2)
            } else {
                (dropoff2, dropoff1)
            };

            let legs = [
                leg(home, first_pickup),
                leg(first_pickup, second_pickup),
                leg(second_pickup, first_dropoff),
                leg(first_dropoff, second_dropoff),
                leg(second_dropoff, home),
            ];
            let to_first_dropoff = legs[0] + legs[1] + legs[2];
            let to_second_dropoff = to_first_dropoff + legs[3];

            let (pickup_delay_g1, pickup_delay_g2) = if g1_picked_first {
                (legs[0], legs[0] + legs[1] - offset_gap_21)
            } else {
                (legs[0] + legs[1] - offset_gap_12, legs[0])
            };
            let (arrival_delay_g1, arrival_delay_g2) = if g1_dropped_first {
                (to_first_dropoff - solo1, to_second_dropoff - solo2)
            } else {
                (to_second_dropoff - solo1, to_first_dropoff - solo2)
            };

            let eval = OrderEvaluation {
                total: legs.iter().sum(),
                pickup_delay_g1,
                pickup_delay_g2,
                arrival_delay_g1,
                arrival_delay_g2,
            };

            if eval.pickup_delay_g1 <= params.max_pickup_delay_min
                && eval.pickup_delay_g2 <= params.max_pickup_delay_min
                && eval.arrival_delay_g1 <= params.max_arrival_delay_min
                && eval.arrival_delay_g2 <= params.max_arrival_delay_min
            {
                best = Some(match best {
                    Some(current) if current <= eval.total => current,
                    _ => eval.total,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;

    fn group(id: u64, offset: i64, pickup: (f64, f64), dropoff: (f64, f64)) -> DemandGroup {
        DemandGroup {
            id,
            required_capacity: 3,
            pickup: Some(Point::new(pickup.0, pickup.1)),
            dropoff: Some(Point::new(dropoff.0, dropoff.1)),
            pickup_offset_min: offset,
            base_trip_duration_min: 20.0,
        }
    }

    fn driver(id: u64, home: (f64, f64)) -> Driver {
        Driver {
            id,
            seat_capacity: 8,
            home: Some(Point::new(home.0, home.1)),
        }
    }

    #[test]
    fn test_solo_cost_sums_legs_and_trip() {
        let d = driver(1, (48.85, 2.35));
        let g = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        let cost = solo_cost(&d, &g).unwrap();
        // Both travel legs are short; the 20 minute trip dominates.
        assert!(cost > 20.0 && cost < 35.0, "unexpected solo cost {cost}");
    }

    #[test]
    fn test_solo_cost_missing_coordinates() {
        let mut d = driver(1, (48.85, 2.35));
        let g = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        d.home = None;
        assert_eq!(solo_cost(&d, &g), None);

        let d = driver(1, (48.85, 2.35));
        let mut g = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        g.dropoff = None;
        assert_eq!(solo_cost(&d, &g), None);
    }

    #[test]
    fn test_combo_rejects_wide_offset_gap() {
        let d = driver(1, (48.85, 2.35));
        let g1 = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        let g2 = group(2, 46, (48.86, 2.37), (48.90, 2.41));
        assert_eq!(combo_cost(&CostParams::default(), &d, &g1, &g2), None);
    }

    #[test]
    fn test_combo_close_groups_feasible() {
        let d = driver(1, (48.85, 2.35));
        let g1 = group(1, 0, (48.86, 2.36), (48.95, 2.45));
        let g2 = group(2, 10, (48.861, 2.361), (48.951, 2.451));
        let cost = combo_cost(&CostParams::default(), &d, &g1, &g2)
            .expect("nearby groups should combine");
        // The combined run must not be cheaper than the physical legs of a
        // single run and should stay well under two separate runs.
        let solo_total = solo_cost(&d, &g1).unwrap() + solo_cost(&d, &g2).unwrap();
        assert!(cost < solo_total, "combo {cost} should beat two solos {solo_total}");
    }

    #[test]
    fn test_combo_distant_groups_infeasible() {
        // Second group is ~100 km away: pickup delay blows the threshold.
        let d = driver(1, (48.85, 2.35));
        let g1 = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        let g2 = group(2, 10, (49.80, 2.36), (49.85, 2.40));
        assert_eq!(combo_cost(&CostParams::default(), &d, &g1, &g2), None);
    }

    #[test]
    fn test_combo_missing_coordinates() {
        let d = driver(1, (48.85, 2.35));
        let g1 = group(1, 0, (48.86, 2.36), (48.90, 2.40));
        let mut g2 = group(2, 10, (48.86, 2.37), (48.90, 2.41));
        g2.pickup = None;
        assert_eq!(combo_cost(&CostParams::default(), &d, &g1, &g2), None);
    }
}
