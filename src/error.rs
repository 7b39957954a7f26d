use thiserror::Error;

/// Errors that stop a whole optimization run.
///
/// Anything that only affects one diameter is reported through
/// [`SolveStatus`](crate::types::SolveStatus) and an error row instead.
#[derive(Debug, Error, PartialEq)]
pub enum OptimizerError {
    #[error("diameter {diameter}: demand row {index} has a quantity of zero")]
    InvalidQuantity { diameter: String, index: usize },

    #[error("diameter {diameter}: total quantity for cut length {length} does not fit in 32 bits")]
    QuantityOverflow { diameter: String, length: f64 },

    #[error("diameter {diameter}: cut length {length} must be a positive number of metres")]
    InvalidLength { diameter: String, length: f64 },

    #[error("diameter {diameter}: market length {length} must be a positive number of metres")]
    InvalidStockLength { diameter: String, length: f64 },

    #[error("kerf {0} must be a non-negative number of metres")]
    InvalidKerf(f64),

    #[error("solver '{0}' is not available in this build")]
    SolverUnavailable(String),
}
