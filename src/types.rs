use serde::{Deserialize, Deserializer, Serialize};

use crate::units::{to_m, to_m_u64};

/// Opaque diameter key such as `"#10"`. The engine only groups by it.
pub type DiameterCode = String;

/// One demand row as supplied by the caller: `quantity` pieces of `length` metres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PieceDemand {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub quantity: u32,
    #[serde(alias = "length_m")]
    pub length: f64,
}

impl PieceDemand {
    pub fn new(quantity: u32, length: f64) -> Self {
        Self { quantity, length }
    }
}

/// A normalized piece type for one diameter: integer length and total required count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub length_mm: u32,
    pub quantity: u32,
}

impl Piece {
    pub fn new(length_mm: u32, quantity: u32) -> Self {
        Self {
            length_mm,
            quantity,
        }
    }

    pub fn length_m(&self) -> f64 {
        to_m(self.length_mm)
    }
}

impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}m", self.length_m())
    }
}

/// One way of cutting a single stock bar.
///
/// `counts[i]` is how many pieces of piece type `i` come out of the bar and
/// `used_mm` already includes the kerf lost between those pieces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub stock_mm: u32,
    pub counts: Vec<u32>,
    pub used_mm: u32,
}

impl Pattern {
    pub fn piece_count(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn waste_mm(&self) -> u32 {
        self.stock_mm - self.used_mm
    }
}

/// Outcome of a single diameter solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Optimal,
    /// No bar in the catalog can hold any piece, so there was nothing to model.
    NoPatterns,
    /// The diameter has demand but no usable market lengths.
    NoStock,
    Infeasible,
    Unbounded,
    Error(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }

    /// Human-readable explanation used for error rows.
    pub fn message(&self) -> String {
        match self {
            SolveStatus::Optimal => "Optimal solution found.".to_string(),
            SolveStatus::NoPatterns => {
                "No feasible patterns found. Check piece sizes, stock lengths, or kerf.".to_string()
            }
            SolveStatus::NoStock => "No market lengths available for this diameter.".to_string(),
            SolveStatus::Infeasible | SolveStatus::Unbounded => {
                format!("Optimal solution not found ({self}).")
            }
            SolveStatus::Error(reason) => format!("Optimal solution not found: {reason}"),
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::NoPatterns => write!(f, "NoPatterns"),
            SolveStatus::NoStock => write!(f, "NoStock"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::Error(_) => write!(f, "Error"),
        }
    }
}

/// Bars bought with one stock length and one pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purchase {
    #[serde(skip)]
    pub stock_mm: u32,
    #[serde(skip)]
    pub used_mm: u32,
    pub stock_length_m: f64,
    pub pattern_counts: Vec<u32>,
    pub used_length_m: f64,
    pub waste_m: f64,
    pub quantity: u32,
}

impl Purchase {
    pub fn new(pattern: &Pattern, quantity: u32) -> Self {
        Self {
            stock_mm: pattern.stock_mm,
            used_mm: pattern.used_mm,
            stock_length_m: to_m(pattern.stock_mm),
            pattern_counts: pattern.counts.clone(),
            used_length_m: to_m(pattern.used_mm),
            waste_m: to_m(pattern.waste_mm()),
            quantity,
        }
    }
}

/// Everything known about one diameter after solving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiameterSolution {
    pub diameter: DiameterCode,
    pub status: SolveStatus,
    #[serde(skip)]
    pub pieces: Vec<Piece>,
    pub purchases: Vec<Purchase>,
    pub total_purchased_m: f64,
    pub total_used_m: f64,
    pub total_waste_m: f64,
    pub produced_counts: Vec<u32>,
    pub demand_counts: Vec<u32>,
}

impl DiameterSolution {
    /// A solution with nothing bought yet.
    pub fn empty(diameter: &str, pieces: Vec<Piece>, status: SolveStatus) -> Self {
        let demand_counts = pieces.iter().map(|p| p.quantity).collect();
        Self {
            diameter: diameter.to_string(),
            status,
            produced_counts: vec![0; pieces.len()],
            pieces,
            purchases: Vec::new(),
            total_purchased_m: 0.0,
            total_used_m: 0.0,
            total_waste_m: 0.0,
            demand_counts,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Every piece type is produced at least as many times as required.
    pub fn demand_satisfied(&self) -> bool {
        self.produced_counts
            .iter()
            .zip(&self.demand_counts)
            .all(|(produced, required)| produced >= required)
    }

    pub fn bar_count(&self) -> u32 {
        self.purchases.iter().map(|p| p.quantity).sum()
    }

    pub fn total_purchased_mm(&self) -> u64 {
        self.purchases
            .iter()
            .map(|p| p.stock_mm as u64 * p.quantity as u64)
            .sum()
    }

    pub(crate) fn set_totals(&mut self) {
        let purchased: u64 = self.total_purchased_mm();
        let used: u64 = self
            .purchases
            .iter()
            .map(|p| p.used_mm as u64 * p.quantity as u64)
            .sum();
        self.total_purchased_m = to_m_u64(purchased);
        self.total_used_m = to_m_u64(used);
        self.total_waste_m = to_m_u64(purchased - used);
    }
}

/// Accepts both `3` and `3.0` for counts, since spreadsheets and JS front-ends
/// tend to send whole numbers as floats.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).map_err(serde::de::Error::custom);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        ))),
    }
}
