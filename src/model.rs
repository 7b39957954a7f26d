//! Integer programming side of the engine.
//!
//! [`MipModel`] is a plain description of a covering problem over
//! non-negative integer variables, built from cutting patterns. Backends
//! implement [`MipSolver`] and only ever see that description, so switching
//! between the bundled pure-Rust solver and CBC does not touch modelling or
//! decoding.

use std::str::FromStr;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};
use serde::{Deserialize, Serialize};

use crate::error::OptimizerError;
use crate::types::{Pattern, Piece, SolveStatus};

/// `sum(terms[k].1 * x[terms[k].0]) >= min`
#[derive(Debug, Clone, PartialEq)]
pub struct CoverConstraint {
    pub terms: Vec<(usize, f64)>,
    pub min: f64,
}

impl CoverConstraint {
    /// True when no variable can ever satisfy a positive lower bound.
    pub fn is_unsatisfiable(&self) -> bool {
        self.terms.is_empty() && self.min > 0.0
    }
}

/// Minimise `objective . x` subject to `constraints`, with `x >= 0` and integral.
#[derive(Debug, Clone, PartialEq)]
pub struct MipModel {
    pub objective: Vec<f64>,
    pub constraints: Vec<CoverConstraint>,
}

impl MipModel {
    /// One variable per pattern (bars cut that way), one demand constraint per
    /// piece type across every pattern regardless of stock length.
    ///
    /// The cost of a variable is `weight * stock + waste`, which makes the
    /// objective lexicographic as long as `weight` exceeds any possible waste.
    pub fn cutting_stock(patterns: &[Pattern], pieces: &[Piece], weight: u64) -> Self {
        let objective = patterns
            .iter()
            .map(|p| weight as f64 * p.stock_mm as f64 + p.waste_mm() as f64)
            .collect();

        let constraints = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| CoverConstraint {
                terms: patterns
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.counts[i] > 0)
                    .map(|(j, p)| (j, p.counts[i] as f64))
                    .collect(),
                min: piece.quantity as f64,
            })
            .collect();

        Self {
            objective,
            constraints,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }
}

/// Weight on purchased length: one more than the longest market length.
///
/// Waste on a bar is always shorter than the bar, so one extra millimetre of
/// purchase always outweighs whatever waste it might save.
pub fn purchase_weight(stock_lengths_mm: &[u32]) -> u64 {
    stock_lengths_mm.iter().copied().max().unwrap_or(0) as u64 + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct MipOutcome {
    pub status: SolveStatus,
    pub values: Vec<f64>,
}

impl MipOutcome {
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
        }
    }
}

/// A mixed-integer backend. Each call must be independent of every other, so
/// one instance can serve concurrent diameter solves.
pub trait MipSolver: Send + Sync {
    fn name(&self) -> &str;
    fn solve(&self, model: &MipModel) -> MipOutcome;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Microlp,
    Cbc,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Microlp => "microlp",
            SolverKind::Cbc => "cbc",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SolverKind::Microlp => true,
            SolverKind::Cbc => cfg!(feature = "cbc"),
        }
    }
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "microlp" => Ok(SolverKind::Microlp),
            "cbc" => Ok(SolverKind::Cbc),
            _ => Err(format!("invalid solver '{s}', expected: microlp or cbc")),
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// [`MipSolver`] backed by `good_lp`.
#[derive(Debug, Clone, Copy)]
pub struct GoodLpSolver {
    kind: SolverKind,
}

impl GoodLpSolver {
    /// Fails when `kind` is not compiled into this build.
    pub fn new(kind: SolverKind) -> Result<Self, OptimizerError> {
        if !kind.is_available() {
            return Err(OptimizerError::SolverUnavailable(kind.name().to_string()));
        }
        Ok(Self { kind })
    }
}

impl MipSolver for GoodLpSolver {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn solve(&self, model: &MipModel) -> MipOutcome {
        let mut vars = ProblemVariables::new();
        let xs: Vec<Variable> = (0..model.variable_count())
            .map(|_| vars.add(variable().integer().min(0)))
            .collect();

        let mut objective = Expression::with_capacity(xs.len());
        for (&x, &cost) in xs.iter().zip(&model.objective) {
            objective.add_mul(cost, x);
        }
        let problem = vars.minimise(objective);

        match self.kind {
            SolverKind::Microlp => {
                run(problem.using(good_lp::solvers::microlp::microlp), &xs, model)
            }
            #[cfg(feature = "cbc")]
            SolverKind::Cbc => {
                let mut problem = problem.using(good_lp::solvers::coin_cbc::coin_cbc);
                problem.set_parameter("log", "0");
                run(problem, &xs, model)
            }
            #[cfg(not(feature = "cbc"))]
            SolverKind::Cbc => MipOutcome::failed(SolveStatus::Error(
                "cbc support is not compiled in".to_string(),
            )),
        }
    }
}

fn run<M>(mut problem: M, xs: &[Variable], model: &MipModel) -> MipOutcome
where
    M: SolverModel<Error = ResolutionError>,
{
    for cover in &model.constraints {
        let mut lhs = Expression::with_capacity(cover.terms.len());
        for &(var, coeff) in &cover.terms {
            lhs.add_mul(coeff, xs[var]);
        }
        problem = problem.with(constraint::geq(lhs, cover.min));
    }

    match problem.solve() {
        Ok(solution) => MipOutcome {
            status: SolveStatus::Optimal,
            values: xs.iter().map(|&x| solution.value(x)).collect(),
        },
        Err(ResolutionError::Infeasible) => MipOutcome::failed(SolveStatus::Infeasible),
        Err(ResolutionError::Unbounded) => MipOutcome::failed(SolveStatus::Unbounded),
        Err(e) => MipOutcome::failed(SolveStatus::Error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(stock_mm: u32, counts: Vec<u32>, used_mm: u32) -> Pattern {
        Pattern {
            stock_mm,
            counts,
            used_mm,
        }
    }

    #[test]
    fn test_weight_exceeds_longest_stock() {
        assert_eq!(purchase_weight(&[6000, 12000, 9000]), 12001);
        assert_eq!(purchase_weight(&[]), 1);
    }

    #[test]
    fn test_model_shape() {
        let pieces = [Piece::new(2000, 3), Piece::new(1000, 1)];
        let patterns = [
            pattern(4000, vec![2, 0], 4000),
            pattern(4000, vec![1, 1], 3000),
            pattern(6500, vec![3, 0], 6000),
        ];
        let model = MipModel::cutting_stock(&patterns, &pieces, purchase_weight(&[4000, 6500]));

        assert_eq!(model.variable_count(), 3);
        assert_eq!(model.objective[0], 6501.0 * 4000.0);
        assert_eq!(model.objective[1], 6501.0 * 4000.0 + 1000.0);
        assert_eq!(model.objective[2], 6501.0 * 6500.0 + 500.0);

        assert_eq!(model.constraints.len(), 2);
        assert_eq!(model.constraints[0].terms, vec![(0, 2.0), (1, 1.0), (2, 3.0)]);
        assert_eq!(model.constraints[0].min, 3.0);
        assert_eq!(model.constraints[1].terms, vec![(1, 1.0)]);
    }

    #[test]
    fn test_uncovered_piece_is_unsatisfiable() {
        let pieces = [Piece::new(2000, 1), Piece::new(9000, 1)];
        let patterns = [pattern(6000, vec![1, 0], 2000)];
        let model = MipModel::cutting_stock(&patterns, &pieces, 6001);
        assert!(!model.constraints[0].is_unsatisfiable());
        assert!(model.constraints[1].is_unsatisfiable());
    }

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!("microlp".parse::<SolverKind>(), Ok(SolverKind::Microlp));
        assert_eq!("CBC".parse::<SolverKind>(), Ok(SolverKind::Cbc));
        assert!("glpk".parse::<SolverKind>().is_err());
    }

    #[test]
    fn test_unavailable_solver_is_rejected() {
        assert!(GoodLpSolver::new(SolverKind::Microlp).is_ok());
        if !cfg!(feature = "cbc") {
            assert_eq!(
                GoodLpSolver::new(SolverKind::Cbc).unwrap_err(),
                OptimizerError::SolverUnavailable("cbc".to_string())
            );
        }
    }

    #[test]
    fn test_microlp_solves_small_cover() {
        // x0 covers 2 per unit at cost 3, x1 covers 1 per unit at cost 2.
        let model = MipModel {
            objective: vec![3.0, 2.0],
            constraints: vec![CoverConstraint {
                terms: vec![(0, 2.0), (1, 1.0)],
                min: 5.0,
            }],
        };
        let solver = GoodLpSolver::new(SolverKind::Microlp).unwrap();
        let outcome = solver.solve(&model);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let x: Vec<i64> = outcome.values.iter().map(|v| v.round() as i64).collect();
        assert_eq!(x, vec![2, 1]);
    }
}
