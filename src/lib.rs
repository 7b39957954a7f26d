//! Rebar purchase optimizer.
//!
//! Given the cut lengths a schedule needs per bar diameter and the market
//! lengths on sale, decides which bars to buy and how to cut each one so that
//! the total length bought is as small as possible, with waste as the tie
//! breaker. Every pattern that fits a bar is enumerated and an integer program
//! picks how many bars to cut each way.

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod patterns;
pub mod plan;
pub mod render;
pub mod solver;
pub mod types;
pub mod units;

pub use config::OptimizerConfig;
pub use error::OptimizerError;
pub use model::{GoodLpSolver, MipSolver, SolverKind};
pub use plan::{
    CutRow, CuttingPlanRow, Demands, ErrorRow, Optimizer, Plan, PurchaseRow, Stocks,
    find_optimized_cutting_plan,
};
pub use types::{DiameterSolution, PieceDemand, SolveStatus};
