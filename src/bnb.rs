//! Time-bounded branch-and-bound over binary decision variables.
//!
//! A small exact engine for the assignment program: depth-first search in
//! ascending-cost variable order, row-activity propagation to cut
//! infeasible partial assignments, and a coverage-style lower bound for
//! objective pruning. The wall-clock deadline is a hard budget; when it
//! is hit the engine reports whatever it has.

use std::time::{Duration, Instant};

const EPS: f64 = 1e-6;

/// Deadline checks are amortized over this many nodes.
const DEADLINE_CHECK_MASK: u64 = 0x3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Ge,
    Le,
}

/// One linear constraint over binary variables.
#[derive(Debug, Clone)]
pub struct Row {
    pub coeffs: Vec<(usize, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Row {
    pub fn ge(coeffs: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self { coeffs, sense: Sense::Ge, rhs }
    }

    pub fn le(coeffs: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self { coeffs, sense: Sense::Le, rhs }
    }
}

/// Minimization program over binary variables.
#[derive(Debug, Clone, Default)]
pub struct IntegerProgram {
    /// Objective coefficient per variable.
    pub costs: Vec<f64>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Search ran to completion; the incumbent is a proven minimum.
    Optimal,
    /// Deadline hit with an incumbent in hand.
    FeasibleNonOptimal,
    /// Search ran to completion without finding any feasible point.
    Infeasible,
    /// Deadline hit before any feasible point was found.
    Timeout,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// Variable values of the incumbent; empty when there is none.
    pub values: Vec<bool>,
    pub objective: f64,
}

struct Search<'a> {
    program: &'a IntegerProgram,
    /// Per-variable list of (row, coefficient) memberships.
    columns: Vec<Vec<(usize, f64)>>,
    /// Variable indices in branching order (cost ascending).
    order: Vec<usize>,
    /// Rows usable for the objective lower bound: `>=` with all
    /// coefficients non-negative.
    bound_eligible: Vec<bool>,

    fixed: Vec<bool>,
    values: Vec<bool>,
    /// Least achievable row activity given the current partial fix.
    min_activity: Vec<f64>,
    /// Greatest achievable row activity given the current partial fix.
    max_activity: Vec<f64>,
    /// Activity contributed by variables fixed to one.
    fixed_activity: Vec<f64>,

    cost_so_far: f64,
    incumbent: Option<(f64, Vec<bool>)>,

    deadline: Instant,
    timed_out: bool,
    nodes: u64,
}

impl<'a> Search<'a> {
    fn new(program: &'a IntegerProgram, deadline: Instant) -> Self {
        let n = program.costs.len();

        let mut columns = vec![Vec::new(); n];
        let mut min_activity = Vec::with_capacity(program.rows.len());
        let mut max_activity = Vec::with_capacity(program.rows.len());
        let mut bound_eligible = Vec::with_capacity(program.rows.len());
        for (row_idx, row) in program.rows.iter().enumerate() {
            let mut lo = 0.0;
            let mut hi = 0.0;
            let mut non_negative = true;
            for &(var, coeff) in &row.coeffs {
                columns[var].push((row_idx, coeff));
                if coeff < 0.0 {
                    lo += coeff;
                    non_negative = false;
                } else {
                    hi += coeff;
                }
            }
            min_activity.push(lo);
            max_activity.push(hi);
            bound_eligible.push(row.sense == Sense::Ge && non_negative);
        }

        // Variables driving `>=` rows branch first, cheapest first; pure
        // indicator variables come last, where the link rows force their
        // value in a single step instead of doubling the tree.
        let mut drives_ge_row = vec![false; n];
        for row in &program.rows {
            if row.sense == Sense::Ge {
                for &(var, _) in &row.coeffs {
                    drives_ge_row[var] = true;
                }
            }
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            drives_ge_row[b]
                .cmp(&drives_ge_row[a])
                .then(program.costs[a].total_cmp(&program.costs[b]))
                .then(a.cmp(&b))
        });

        Self {
            program,
            columns,
            order,
            bound_eligible,
            fixed: vec![false; n],
            values: vec![false; n],
            min_activity,
            max_activity,
            fixed_activity: vec![0.0; program.rows.len()],
            cost_so_far: 0.0,
            incumbent: None,
            deadline,
            timed_out: false,
            nodes: 0,
        }
    }

    fn row_violated(&self, row_idx: usize) -> bool {
        let row = &self.program.rows[row_idx];
        match row.sense {
            Sense::Ge => self.max_activity[row_idx] < row.rhs - EPS,
            Sense::Le => self.min_activity[row_idx] > row.rhs + EPS,
        }
    }

    /// Apply a fix and report whether every row touching the variable is
    /// still satisfiable. The fix is applied either way; the caller
    /// unfixes.
    fn fix(&mut self, var: usize, value: bool) -> bool {
        self.fixed[var] = true;
        self.values[var] = value;

        let column = std::mem::take(&mut self.columns[var]);
        for &(row_idx, coeff) in &column {
            if value {
                if coeff > 0.0 {
                    self.min_activity[row_idx] += coeff;
                } else {
                    self.max_activity[row_idx] += coeff;
                }
                self.fixed_activity[row_idx] += coeff;
            } else if coeff > 0.0 {
                self.max_activity[row_idx] -= coeff;
            } else {
                self.min_activity[row_idx] -= coeff;
            }
        }
        let feasible = column.iter().all(|&(row_idx, _)| !self.row_violated(row_idx));
        self.columns[var] = column;
        feasible
    }

    fn unfix(&mut self, var: usize, value: bool) {
        self.fixed[var] = false;

        let column = std::mem::take(&mut self.columns[var]);
        for &(row_idx, coeff) in &column {
            if value {
                if coeff > 0.0 {
                    self.min_activity[row_idx] -= coeff;
                } else {
                    self.max_activity[row_idx] -= coeff;
                }
                self.fixed_activity[row_idx] -= coeff;
            } else if coeff > 0.0 {
                self.max_activity[row_idx] += coeff;
            } else {
                self.min_activity[row_idx] += coeff;
            }
        }
        self.columns[var] = column;
    }

    /// Lower bound on the cost still to be paid: every deficient
    /// coverage-style row needs at least one more free variable, costing
    /// at least the cheapest free contributor. The max across rows is a
    /// valid bound because one variable can serve several rows at once.
    /// Infinite when some row can no longer be satisfied at all.
    fn remaining_bound(&self) -> f64 {
        let mut bound: f64 = 0.0;
        for (row_idx, row) in self.program.rows.iter().enumerate() {
            if !self.bound_eligible[row_idx] {
                continue;
            }
            if self.fixed_activity[row_idx] >= row.rhs - EPS {
                continue;
            }
            let cheapest = row
                .coeffs
                .iter()
                .filter(|&&(var, coeff)| !self.fixed[var] && coeff > 0.0)
                .map(|&(var, _)| self.program.costs[var])
                .fold(f64::INFINITY, f64::min);
            if cheapest.is_infinite() {
                return f64::INFINITY;
            }
            bound = bound.max(cheapest);
        }
        bound
    }

    fn dfs(&mut self, pos: usize) {
        if self.timed_out {
            return;
        }
        self.nodes += 1;
        if self.nodes & DEADLINE_CHECK_MASK == 1 && Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }

        let bound = self.remaining_bound();
        if bound.is_infinite() {
            return;
        }
        if let Some((best_cost, _)) = &self.incumbent {
            if self.cost_so_far + bound >= best_cost - EPS {
                return;
            }
        }

        if pos == self.order.len() {
            self.incumbent = Some((self.cost_so_far, self.values.clone()));
            return;
        }

        let var = self.order[pos];
        for value in [true, false] {
            if value {
                self.cost_so_far += self.program.costs[var];
            }
            if self.fix(var, value) {
                self.dfs(pos + 1);
            }
            self.unfix(var, value);
            if value {
                self.cost_so_far -= self.program.costs[var];
            }
            if self.timed_out {
                return;
            }
        }
    }
}

/// Solve the program to proven optimality or until the deadline.
pub fn solve(program: &IntegerProgram, time_limit: Duration) -> Solution {
    let deadline = Instant::now() + time_limit;
    let mut search = Search::new(program, deadline);

    // Rows unsatisfiable before any branching (e.g. a coverage row with
    // no candidate variables) make the whole program infeasible.
    let root_feasible = (0..program.rows.len()).all(|row_idx| !search.row_violated(row_idx));
    if root_feasible {
        search.dfs(0);
    }

    let (status, values, objective) = match (&search.incumbent, search.timed_out) {
        (Some((cost, values)), false) => (SolveStatus::Optimal, values.clone(), *cost),
        (Some((cost, values)), true) => (SolveStatus::FeasibleNonOptimal, values.clone(), *cost),
        (None, false) => (SolveStatus::Infeasible, Vec::new(), 0.0),
        (None, true) => (SolveStatus::Timeout, Vec::new(), 0.0),
    };
    Solution { status, values, objective }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> Duration {
        Duration::from_secs(10)
    }

    #[test]
    fn test_picks_cheapest_cover() {
        // Two ways to cover one demand row; the cheaper must win.
        let program = IntegerProgram {
            costs: vec![10.0, 3.0],
            rows: vec![Row::ge(vec![(0, 1.0), (1, 1.0)], 1.0)],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(!solution.values[0]);
        assert!(solution.values[1]);
        assert!((solution.objective - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mutual_exclusion() {
        // Both variables needed for coverage but mutually exclusive.
        let program = IntegerProgram {
            costs: vec![1.0, 1.0],
            rows: vec![
                Row::ge(vec![(0, 1.0)], 1.0),
                Row::ge(vec![(1, 1.0)], 1.0),
                Row::le(vec![(0, 1.0), (1, 1.0)], 1.0),
            ],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_empty_coverage_row_is_infeasible() {
        let program = IntegerProgram {
            costs: vec![1.0],
            rows: vec![Row::ge(Vec::new(), 2.0)],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_no_variables_no_rows_is_trivially_optimal() {
        let program = IntegerProgram::default();
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(solution.values.is_empty());
        assert_eq!(solution.objective, 0.0);
    }

    #[test]
    fn test_forced_zero_row() {
        let program = IntegerProgram {
            costs: vec![1.0, 2.0],
            rows: vec![
                Row::ge(vec![(0, 1.0), (1, 1.0)], 1.0),
                Row::le(vec![(0, 1.0)], 0.0),
            ],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(!solution.values[0]);
        assert!(solution.values[1]);
    }

    #[test]
    fn test_negative_coefficient_link() {
        // z must rise with x: x - z <= 0. Minimizing leaves both at zero
        // unless coverage forces x up.
        let program = IntegerProgram {
            costs: vec![5.0, 1.0],
            rows: vec![
                Row::ge(vec![(0, 2.0)], 1.0),
                Row::le(vec![(0, 1.0), (1, -1.0)], 0.0),
            ],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(solution.values[0]);
        assert!(solution.values[1], "link row must pull the indicator up");
        assert!((solution.objective - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_deadline_times_out() {
        let program = IntegerProgram {
            costs: vec![1.0, 1.0, 1.0, 1.0],
            rows: vec![Row::ge(vec![(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)], 2.0)],
        };
        let solution = solve(&program, Duration::ZERO);
        assert!(matches!(
            solution.status,
            SolveStatus::Timeout | SolveStatus::FeasibleNonOptimal
        ));
    }

    #[test]
    fn test_coverage_with_weights() {
        // Capacity-weighted coverage: one 4-seat or two 2-seat vehicles.
        let program = IntegerProgram {
            costs: vec![9.0, 4.0, 4.0],
            rows: vec![Row::ge(vec![(0, 4.0), (1, 2.0), (2, 2.0)], 4.0)],
        };
        let solution = solve(&program, limit());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective - 8.0).abs() < 1e-9);
        assert!(!solution.values[0]);
        assert!(solution.values[1] && solution.values[2]);
    }
}
