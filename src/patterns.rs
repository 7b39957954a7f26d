use std::collections::BTreeMap;

use crate::types::{Piece, Pattern};

/// A count vector together with the length it uses, before kerf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPattern {
    pub counts: Vec<u32>,
    pub used_mm: u32,
}

/// Depth-first enumeration of every non-empty combination of piece counts
/// that fits in one stock bar, ignoring kerf.
struct Enumerator<'a> {
    stock_mm: u64,
    piece_lengths_mm: &'a [u32],
    upper_bounds: Vec<u32>,
    counts: Vec<u32>,
    out: Vec<RawPattern>,
}

impl Enumerator<'_> {
    fn recurse(&mut self, idx: usize, used: u64) {
        if idx == self.piece_lengths_mm.len() {
            if self.counts.iter().any(|&c| c > 0) {
                self.out.push(RawPattern {
                    counts: self.counts.clone(),
                    used_mm: used as u32,
                });
            }
            return;
        }

        let piece_len = self.piece_lengths_mm[idx] as u64;
        for count in 0..=self.upper_bounds[idx] {
            let new_used = used + count as u64 * piece_len;
            // Usage only grows with count, so nothing above this fits either.
            if new_used > self.stock_mm {
                break;
            }
            self.counts.push(count);
            self.recurse(idx + 1, new_used);
            self.counts.pop();
        }
    }
}

/// Lists every way of cutting `piece_lengths_mm` out of one `stock_mm` bar,
/// taking at most `max_counts[i]` copies of piece `i`.
///
/// Piece `i` is never tried more than `stock_mm / piece_lengths_mm[i]` times.
/// The all-zero vector is not returned.
pub fn enumerate_patterns(
    stock_mm: u32,
    piece_lengths_mm: &[u32],
    max_counts: &[u32],
) -> Vec<RawPattern> {
    debug_assert_eq!(piece_lengths_mm.len(), max_counts.len());

    let upper_bounds = piece_lengths_mm
        .iter()
        .zip(max_counts)
        .map(|(&len, &max)| max.min(stock_mm.checked_div(len).unwrap_or(0)))
        .collect();

    let mut enumerator = Enumerator {
        stock_mm: stock_mm as u64,
        piece_lengths_mm,
        upper_bounds,
        counts: Vec::with_capacity(piece_lengths_mm.len()),
        out: Vec::new(),
    };
    enumerator.recurse(0, 0);
    enumerator.out
}

/// Length used by a pattern once `kerf_mm` is lost between each pair of
/// neighbouring pieces.
pub fn used_with_kerf(used_mm: u32, piece_count: u32, kerf_mm: u32) -> u64 {
    used_mm as u64 + piece_count.saturating_sub(1) as u64 * kerf_mm as u64
}

/// Enumerates patterns for every distinct stock length, applies kerf and drops
/// patterns that no longer fit.
///
/// Demand quantities bound the per-pattern counts. Stock lengths without any
/// surviving pattern are left out of the map; keys iterate in ascending order.
pub fn build_patterns(
    pieces: &[Piece],
    stock_lengths_mm: &[u32],
    kerf_mm: u32,
) -> BTreeMap<u32, Vec<Pattern>> {
    let piece_lengths: Vec<u32> = pieces.iter().map(|p| p.length_mm).collect();
    let max_counts: Vec<u32> = pieces.iter().map(|p| p.quantity).collect();

    let mut stocks = stock_lengths_mm.to_vec();
    stocks.sort_unstable();
    stocks.dedup();

    let mut by_stock = BTreeMap::new();
    for stock_mm in stocks {
        let raw = enumerate_patterns(stock_mm, &piece_lengths, &max_counts);
        let enumerated = raw.len();

        let patterns: Vec<Pattern> = raw
            .into_iter()
            .filter_map(|p| {
                let piece_count: u32 = p.counts.iter().sum();
                let used = used_with_kerf(p.used_mm, piece_count, kerf_mm);
                (used <= stock_mm as u64).then(|| Pattern {
                    stock_mm,
                    counts: p.counts,
                    used_mm: used as u32,
                })
            })
            .collect();

        tracing::debug!(
            stock_mm,
            enumerated,
            kept = patterns.len(),
            "enumerated cutting patterns"
        );

        if !patterns.is_empty() {
            by_stock.insert(stock_mm, patterns);
        }
    }
    by_stock
}
