use serde::{Deserialize, Serialize};

use crate::model::SolverKind;

/// Engine settings shared by the CLI and the HTTP service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Material lost per cut, in metres.
    pub kerf_m: f64,
    pub solver: SolverKind,
    /// Solve diameters on the rayon thread pool.
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kerf_m: 0.0,
            solver: SolverKind::default(),
            parallel: false,
        }
    }
}

impl OptimizerConfig {
    /// Defaults overridden by `REBAR_KERF`, `REBAR_SOLVER` and `REBAR_PARALLEL`.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(kerf) = lookup("REBAR_KERF") {
            config.kerf_m = kerf
                .trim()
                .parse()
                .map_err(|_| format!("invalid REBAR_KERF '{kerf}'"))?;
        }
        if let Some(solver) = lookup("REBAR_SOLVER") {
            config.solver = solver.trim().parse()?;
        }
        if let Some(parallel) = lookup("REBAR_PARALLEL") {
            config.parallel = match parallel.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => return Err(format!("invalid REBAR_PARALLEL '{parallel}'")),
            };
        }
        Ok(config)
    }
}
