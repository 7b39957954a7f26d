//! Stock data used when the caller does not provide its own catalog.

use std::collections::BTreeMap;

/// Bar size codes sold locally, thinnest first.
pub const BAR_DIAMETERS: [&str; 10] = [
    "#10", "#12", "#16", "#20", "#25", "#28", "#32", "#36", "#40", "#50",
];

/// Market lengths in metres.
pub const MARKET_LENGTHS_M: [f64; 7] = [6.0, 7.5, 9.0, 10.5, 12.0, 13.5, 15.0];

pub fn is_known_diameter(code: &str) -> bool {
    BAR_DIAMETERS.contains(&code)
}

/// Every market length for each of `diameters`.
pub fn default_stocks<'a>(
    diameters: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, Vec<f64>> {
    diameters
        .into_iter()
        .map(|d| (d.to_string(), MARKET_LENGTHS_M.to_vec()))
        .collect()
}
