use crate::model::{MipModel, MipSolver, purchase_weight};
use crate::patterns::build_patterns;
use crate::types::{DiameterSolution, Pattern, Piece, Purchase, SolveStatus};

/// Solves the cutting-stock problem for a single diameter.
pub struct Solver {
    diameter: String,
    pieces: Vec<Piece>,
    stock_mm: Vec<u32>,
    kerf_mm: u32,
}

impl Solver {
    pub fn new(diameter: &str, pieces: Vec<Piece>, stock_mm: Vec<u32>, kerf_mm: u32) -> Self {
        Self {
            diameter: diameter.to_string(),
            pieces,
            stock_mm,
            kerf_mm,
        }
    }

    pub fn solve(&self, backend: &dyn MipSolver) -> DiameterSolution {
        if self.pieces.is_empty() {
            return DiameterSolution::empty(&self.diameter, Vec::new(), SolveStatus::Optimal);
        }
        if self.stock_mm.is_empty() {
            return self.fail(SolveStatus::NoStock);
        }

        let patterns: Vec<Pattern> = build_patterns(&self.pieces, &self.stock_mm, self.kerf_mm)
            .into_values()
            .flatten()
            .collect();
        if patterns.is_empty() {
            return self.fail(SolveStatus::NoPatterns);
        }

        let model = MipModel::cutting_stock(
            &patterns,
            &self.pieces,
            purchase_weight(&self.stock_mm),
        );
        // A piece no pattern can hold makes the model infeasible before any search.
        if model.constraints.iter().any(|c| c.is_unsatisfiable()) {
            return self.fail(SolveStatus::Infeasible);
        }

        tracing::debug!(
            diameter = %self.diameter,
            variables = model.variable_count(),
            constraints = model.constraints.len(),
            solver = backend.name(),
            "solving cutting-stock model"
        );

        let outcome = backend.solve(&model);
        if !outcome.status.is_optimal() {
            return self.fail(outcome.status);
        }
        if outcome.values.len() != patterns.len() {
            return self.fail(SolveStatus::Error(format!(
                "solver returned {} values for {} variables",
                outcome.values.len(),
                patterns.len()
            )));
        }

        let solution = match self.decode(&patterns, &outcome.values) {
            Some(solution) => solution,
            None => {
                return self.fail(SolveStatus::Error(
                    "solver values overflow the piece counts".to_string(),
                ));
            }
        };
        if !solution.demand_satisfied() {
            return self.fail(SolveStatus::Error(
                "rounded solver values do not meet demand".to_string(),
            ));
        }

        tracing::info!(
            diameter = %self.diameter,
            bars = solution.bar_count(),
            purchased_m = solution.total_purchased_m,
            waste_m = solution.total_waste_m,
            "diameter solved"
        );
        solution
    }

    fn fail(&self, status: SolveStatus) -> DiameterSolution {
        tracing::warn!(
            diameter = %self.diameter,
            status = %status,
            "could not find optimal solution: {}",
            status.message()
        );
        DiameterSolution::empty(&self.diameter, self.pieces.clone(), status)
    }

    /// Turns solved pattern multiplicities into purchases and totals.
    ///
    /// Returns `None` when the produced counts do not fit in a `u32`.
    fn decode(&self, patterns: &[Pattern], values: &[f64]) -> Option<DiameterSolution> {
        let mut solution =
            DiameterSolution::empty(&self.diameter, self.pieces.clone(), SolveStatus::Optimal);

        for (pattern, &value) in patterns.iter().zip(values) {
            // Integer variables come back as floats with relaxation noise.
            let quantity = value.round().max(0.0) as u32;
            if quantity == 0 {
                continue;
            }
            for (produced, &count) in solution.produced_counts.iter_mut().zip(&pattern.counts) {
                *produced = produced.checked_add(count.checked_mul(quantity)?)?;
            }
            solution.purchases.push(Purchase::new(pattern, quantity));
        }

        solution.set_totals();
        Some(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GoodLpSolver, MipOutcome, SolverKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn microlp() -> GoodLpSolver {
        GoodLpSolver::new(SolverKind::Microlp).unwrap()
    }

    /// Backend that never solves anything and counts how often it was asked.
    struct FixedStatus {
        status: SolveStatus,
        calls: AtomicUsize,
    }

    impl FixedStatus {
        fn new(status: SolveStatus) -> Self {
            Self {
                status,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MipSolver for FixedStatus {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&self, _model: &MipModel) -> MipOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            MipOutcome::failed(self.status.clone())
        }
    }

    /// Checks the invariants every optimal solution must hold:
    /// 1. Every purchased pattern fits in its stock length
    /// 2. Production covers demand for every piece type
    /// 3. Totals agree with the purchases
    fn assert_solution_valid(sol: &DiameterSolution) {
        assert!(sol.is_optimal(), "expected optimal, got {}", sol.status);

        let mut produced = vec![0u32; sol.pieces.len()];
        for p in &sol.purchases {
            assert!(p.quantity > 0);
            assert!(
                p.used_mm <= p.stock_mm,
                "pattern {:?} uses {} of {}",
                p.pattern_counts,
                p.used_mm,
                p.stock_mm
            );
            let raw: u32 = p
                .pattern_counts
                .iter()
                .zip(&sol.pieces)
                .map(|(c, piece)| c * piece.length_mm)
                .sum();
            assert!(raw <= p.used_mm);
            for (i, c) in p.pattern_counts.iter().enumerate() {
                produced[i] += c * p.quantity;
            }
        }
        assert_eq!(produced, sol.produced_counts);
        assert!(sol.demand_satisfied(), "{:?} < {:?}", produced, sol.demand_counts);

        let waste = sol.total_purchased_m - sol.total_used_m;
        assert!((waste - sol.total_waste_m).abs() < 1e-9);
    }

    #[test]
    fn test_single_piece() {
        let solver = Solver::new("#10", vec![Piece::new(5000, 1)], vec![6000], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.bar_count(), 1);
        assert_eq!(sol.total_waste_m, 1.0);
    }

    #[test]
    fn test_exact_fit() {
        let solver = Solver::new("#12", vec![Piece::new(3000, 4)], vec![6000], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.bar_count(), 2);
        assert_eq!(sol.total_waste_m, 0.0);
        assert_eq!(sol.purchases[0].pattern_counts, vec![2]);
    }

    #[test]
    fn test_picks_cheapest_stock_mix() {
        // 7 m pieces: one 7.5 m bar each beats 12 m bars.
        let solver = Solver::new("#16", vec![Piece::new(7000, 3)], vec![7500, 12000], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.total_purchased_mm(), 22_500);
        assert!(sol.purchases.iter().all(|p| p.stock_mm == 7500));
    }

    #[test]
    fn test_cost_beats_waste() {
        // 6.5 m holds all three pieces with 0.5 m waste; two 4 m bars waste
        // nothing but cost 1.5 m more.
        let solver = Solver::new("#10", vec![Piece::new(2000, 3)], vec![4000, 6500], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.total_purchased_mm(), 6500);
        assert_eq!(sol.total_waste_m, 0.5);
    }

    #[test]
    fn test_waste_breaks_cost_ties() {
        // Both answers buy 8 m; the one with a spare piece wastes nothing.
        let solver = Solver::new("#10", vec![Piece::new(2000, 3)], vec![4000], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.total_purchased_mm(), 8000);
        assert_eq!(sol.total_waste_m, 0.0);
        assert_eq!(sol.produced_counts, vec![4]);
    }

    #[test]
    fn test_kerf_forces_extra_bar() {
        let pieces = vec![Piece::new(3000, 2)];
        let sol = Solver::new("#10", pieces.clone(), vec![6000], 0).solve(&microlp());
        assert_eq!(sol.bar_count(), 1);

        let sol = Solver::new("#10", pieces, vec![6000], 4).solve(&microlp());
        assert_solution_valid(&sol);
        assert_eq!(sol.bar_count(), 2);
    }

    #[test]
    fn test_piece_longer_than_every_stock() {
        let backend = FixedStatus::new(SolveStatus::Optimal);
        let sol = Solver::new("#10", vec![Piece::new(13000, 2)], vec![6000, 12000], 0)
            .solve(&backend);
        assert_eq!(sol.status, SolveStatus::NoPatterns);
        assert!(sol.purchases.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_uncoverable_piece_is_infeasible() {
        let backend = FixedStatus::new(SolveStatus::Optimal);
        let pieces = vec![Piece::new(2000, 2), Piece::new(13000, 1)];
        let sol = Solver::new("#10", pieces, vec![12000], 0).solve(&backend);
        assert_eq!(sol.status, SolveStatus::Infeasible);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_stock() {
        let sol = Solver::new("#10", vec![Piece::new(1000, 1)], vec![], 0).solve(&microlp());
        assert_eq!(sol.status, SolveStatus::NoStock);
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let backend = FixedStatus::new(SolveStatus::Error("timed out".to_string()));
        let sol = Solver::new("#10", vec![Piece::new(1000, 1)], vec![6000], 0).solve(&backend);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sol.status, SolveStatus::Error("timed out".to_string()));
        assert!(sol.purchases.is_empty());
    }

    /// Backend that claims an optimum with the same value for every variable.
    struct Flooded(f64);

    impl MipSolver for Flooded {
        fn name(&self) -> &str {
            "flooded"
        }

        fn solve(&self, model: &MipModel) -> MipOutcome {
            MipOutcome {
                status: SolveStatus::Optimal,
                values: vec![self.0; model.variable_count()],
            }
        }
    }

    #[test]
    fn test_overflowing_counts_are_an_error() {
        // Patterns [1] and [2] each bought u32::MAX times produce more pieces
        // than a u32 holds.
        let solver = Solver::new("#10", vec![Piece::new(1000, 2)], vec![6000], 0);
        let sol = solver.solve(&Flooded(u32::MAX as f64));
        assert!(matches!(sol.status, SolveStatus::Error(_)), "got {}", sol.status);
        assert!(sol.purchases.is_empty());
        assert_eq!(sol.produced_counts, vec![0]);
    }

    #[test]
    fn test_no_pieces_is_empty_optimal() {
        let sol = Solver::new("#10", vec![], vec![6000], 0).solve(&microlp());
        assert!(sol.is_optimal());
        assert!(sol.purchases.is_empty());
        assert_eq!(sol.total_purchased_m, 0.0);
    }

    #[test]
    fn test_rebar_schedule() {
        let pieces = vec![Piece::new(2095, 16), Piece::new(1695, 12)];
        let solver = Solver::new("#10", pieces, vec![6000, 9000, 12000], 0);
        let sol = solver.solve(&microlp());
        assert_solution_valid(&sol);
        // 53.86 m of pieces; 54 m leaves too little slack for any mix of
        // patterns, 57 m is reachable.
        assert_eq!(sol.total_purchased_mm(), 57_000);
    }
}
