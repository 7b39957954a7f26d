//! Runs the per-diameter solver over a whole rebar schedule and turns the
//! results into a purchase list and a cutting plan.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::model::{GoodLpSolver, MipSolver};
use crate::solver::Solver;
use crate::types::{DiameterCode, DiameterSolution, Piece, PieceDemand};
use crate::units::{to_m, to_mm};

pub type Demands = BTreeMap<DiameterCode, Vec<PieceDemand>>;
pub type Stocks = BTreeMap<DiameterCode, Vec<f64>>;

/// Bars of one market length to buy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockCount {
    pub label: String,
    pub length_m: f64,
    pub quantity: u32,
}

/// Bars to buy for one diameter, one column per known market length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRow {
    pub diameter: DiameterCode,
    pub counts: Vec<StockCount>,
}

impl PurchaseRow {
    pub fn quantity_for(&self, length_m: f64) -> Option<u32> {
        let mm = to_mm(length_m);
        self.counts
            .iter()
            .find(|c| to_mm(c.length_m) == mm)
            .map(|c| c.quantity)
    }

    pub fn total_bars(&self) -> u32 {
        self.counts.iter().map(|c| c.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieceCut {
    pub count: u32,
    pub length_m: f64,
}

/// `quantity` bars of `length_m`, each cut into the same `pieces`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutRow {
    pub diameter: DiameterCode,
    pub quantity: u32,
    pub length_m: f64,
    /// Per-bar breakdown such as `"3x2.095m"`.
    pub cuts: Vec<String>,
    pub pieces: Vec<PieceCut>,
    pub waste_m: f64,
    #[serde(skip)]
    pub length_mm: u32,
}

/// A diameter that could not be planned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRow {
    pub error: String,
    pub diameter: DiameterCode,
    pub length: Option<f64>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CuttingPlanRow {
    Cut(CutRow),
    Error(ErrorRow),
}

impl CuttingPlanRow {
    pub fn diameter(&self) -> &str {
        match self {
            CuttingPlanRow::Cut(row) => &row.diameter,
            CuttingPlanRow::Error(row) => &row.diameter,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CuttingPlanRow::Error(_))
    }

    fn sort_key(&self) -> (&str, Option<u32>, Option<u32>) {
        match self {
            CuttingPlanRow::Cut(row) => (&row.diameter, Some(row.length_mm), Some(row.quantity)),
            CuttingPlanRow::Error(row) => (&row.diameter, None, None),
        }
    }
}

/// The two report tables for a whole schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub purchase_list: Vec<PurchaseRow>,
    pub cutting_plan: Vec<CuttingPlanRow>,
}

impl Plan {
    pub fn errors(&self) -> impl Iterator<Item = &ErrorRow> {
        self.cutting_plan.iter().filter_map(|row| match row {
            CuttingPlanRow::Error(e) => Some(e),
            CuttingPlanRow::Cut(_) => None,
        })
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

pub struct Optimizer {
    config: OptimizerConfig,
    backend: Box<dyn MipSolver>,
}

impl Optimizer {
    /// Builds an optimizer on the configured `good_lp` backend.
    ///
    /// Fails straight away if that backend is not part of this build.
    pub fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        let backend = GoodLpSolver::new(config.solver)?;
        Self::with_backend(config, Box::new(backend))
    }

    pub fn with_backend(
        config: OptimizerConfig,
        backend: Box<dyn MipSolver>,
    ) -> Result<Self, OptimizerError> {
        if !config.kerf_m.is_finite() || config.kerf_m < 0.0 {
            return Err(OptimizerError::InvalidKerf(config.kerf_m));
        }
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn kerf_mm(&self) -> u32 {
        to_mm(self.config.kerf_m)
    }

    /// Solves a single diameter and returns the full solution record.
    pub fn solve_diameter(
        &self,
        diameter: &str,
        demand: &[PieceDemand],
        stock: &[f64],
    ) -> Result<DiameterSolution, OptimizerError> {
        let pieces = normalize_demand(diameter, demand)?;
        let stock_mm = normalize_stock(diameter, stock)?;
        Ok(Solver::new(diameter, pieces, stock_mm, self.kerf_mm()).solve(self.backend.as_ref()))
    }

    /// Plans every diameter in `demands`.
    ///
    /// Input is validated for all diameters before any solving starts. A
    /// diameter that cannot be solved yields an error row and no purchase row;
    /// the others are unaffected.
    pub fn optimize(&self, demands: &Demands, stocks: &Stocks) -> Result<Plan, OptimizerError> {
        let mut jobs = Vec::with_capacity(demands.len());
        for (diameter, demand) in demands {
            let pieces = normalize_demand(diameter, demand)?;
            if pieces.is_empty() {
                continue;
            }
            let stock_mm = match stocks.get(diameter) {
                Some(lengths) => normalize_stock(diameter, lengths)?,
                None => Vec::new(),
            };
            jobs.push(Solver::new(diameter, pieces, stock_mm, self.kerf_mm()));
        }

        let mut columns = BTreeSet::new();
        for (diameter, lengths) in stocks {
            columns.extend(normalize_stock(diameter, lengths)?);
        }

        let backend = self.backend.as_ref();
        let solutions: Vec<DiameterSolution> = if self.config.parallel {
            jobs.par_iter().map(|job| job.solve(backend)).collect()
        } else {
            jobs.iter().map(|job| job.solve(backend)).collect()
        };

        Ok(build_plan(&solutions, &columns))
    }
}

/// Plans `demands` against `stocks` with the default solver.
pub fn find_optimized_cutting_plan(
    demands: &Demands,
    stocks: &Stocks,
    kerf_m: f64,
) -> Result<(Vec<PurchaseRow>, Vec<CuttingPlanRow>), OptimizerError> {
    let config = OptimizerConfig {
        kerf_m,
        ..OptimizerConfig::default()
    };
    let plan = Optimizer::new(config)?.optimize(demands, stocks)?;
    Ok((plan.purchase_list, plan.cutting_plan))
}

fn build_plan(solutions: &[DiameterSolution], columns: &BTreeSet<u32>) -> Plan {
    let mut purchase_list = Vec::new();
    let mut cutting_plan = Vec::new();

    for sol in solutions {
        if !sol.is_optimal() {
            cutting_plan.push(CuttingPlanRow::Error(ErrorRow {
                error: sol.status.message(),
                diameter: sol.diameter.clone(),
                length: None,
                quantity: None,
            }));
            continue;
        }
        if sol.purchases.is_empty() {
            continue;
        }

        let counts = columns
            .iter()
            .map(|&mm| StockCount {
                label: format!("{:.1}m", to_m(mm)),
                length_m: to_m(mm),
                quantity: sol
                    .purchases
                    .iter()
                    .filter(|p| p.stock_mm == mm)
                    .map(|p| p.quantity)
                    .sum(),
            })
            .collect();
        purchase_list.push(PurchaseRow {
            diameter: sol.diameter.clone(),
            counts,
        });

        for purchase in &sol.purchases {
            let pieces: Vec<PieceCut> = purchase
                .pattern_counts
                .iter()
                .zip(&sol.pieces)
                .filter(|(count, _)| **count > 0)
                .map(|(&count, piece)| PieceCut {
                    count,
                    length_m: piece.length_m(),
                })
                .collect();
            cutting_plan.push(CuttingPlanRow::Cut(CutRow {
                diameter: sol.diameter.clone(),
                quantity: purchase.quantity,
                length_m: purchase.stock_length_m,
                cuts: pieces
                    .iter()
                    .map(|p| format!("{}x{:.3}m", p.count, p.length_m))
                    .collect(),
                pieces,
                waste_m: purchase.waste_m,
                length_mm: purchase.stock_mm,
            }));
        }
    }

    purchase_list.sort_by(|a, b| a.diameter.cmp(&b.diameter));
    cutting_plan.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    Plan {
        purchase_list,
        cutting_plan,
    }
}

/// Validates demand rows and merges rows whose lengths round to the same
/// millimetre, keeping first-seen order.
pub fn normalize_demand(
    diameter: &str,
    demand: &[PieceDemand],
) -> Result<Vec<Piece>, OptimizerError> {
    let mut pieces: Vec<Piece> = Vec::with_capacity(demand.len());
    for (index, row) in demand.iter().enumerate() {
        if row.quantity == 0 {
            return Err(OptimizerError::InvalidQuantity {
                diameter: diameter.to_string(),
                index,
            });
        }
        let length_mm = positive_mm(row.length).ok_or_else(|| OptimizerError::InvalidLength {
            diameter: diameter.to_string(),
            length: row.length,
        })?;

        match pieces.iter_mut().find(|p| p.length_mm == length_mm) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(row.quantity).ok_or_else(|| {
                    OptimizerError::QuantityOverflow {
                        diameter: diameter.to_string(),
                        length: row.length,
                    }
                })?;
            }
            None => pieces.push(Piece::new(length_mm, row.quantity)),
        }
    }
    Ok(pieces)
}

/// Validates market lengths and converts them to millimetres.
pub fn normalize_stock(diameter: &str, lengths: &[f64]) -> Result<Vec<u32>, OptimizerError> {
    lengths
        .iter()
        .map(|&length| {
            positive_mm(length).ok_or_else(|| OptimizerError::InvalidStockLength {
                diameter: diameter.to_string(),
                length,
            })
        })
        .collect()
}

fn positive_mm(length_m: f64) -> Option<u32> {
    if !length_m.is_finite() || length_m <= 0.0 || length_m * 1000.0 >= u32::MAX as f64 {
        return None;
    }
    let mm = to_mm(length_m);
    (mm > 0).then_some(mm)
}
