use crate::plan::{CutRow, CuttingPlanRow, PurchaseRow};

const MAX_WIDTH: f64 = 60.0;

/// ASCII drawing of one bar from a cutting-plan row, pieces left to right and
/// waste hatched at the end.
pub fn render_bar(row: &CutRow) -> String {
    if row.length_m <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / row.length_m;

    let mut line = String::from("|");
    for piece in &row.pieces {
        let width = ((piece.length_m * scale).round() as usize).max(1);
        let label = format!("{:.3}", piece.length_m);
        for _ in 0..piece.count {
            line.push_str(&segment(&label, width));
            line.push('|');
        }
    }

    let waste_width = (row.waste_m * scale).round() as usize;
    if waste_width > 0 {
        line.push_str(&"/".repeat(waste_width));
        line.push('|');
    }
    line.push('\n');
    line
}

fn segment(label: &str, width: usize) -> String {
    if label.len() + 2 > width {
        return "-".repeat(width);
    }
    let left = (width - label.len()) / 2;
    let right = width - label.len() - left;
    format!("{}{}{}", "-".repeat(left), label, "-".repeat(right))
}

pub fn render_purchase_list(rows: &[PurchaseRow]) -> String {
    let Some(first) = rows.first() else {
        return "Nothing to purchase.\n".to_string();
    };

    let mut out = format!("{:<10}", "Diameter");
    for c in &first.counts {
        out.push_str(&format!("{:>8}", c.label));
    }
    out.push('\n');

    for row in rows {
        out.push_str(&format!("{:<10}", row.diameter));
        for c in &row.counts {
            out.push_str(&format!("{:>8}", c.quantity));
        }
        out.push('\n');
    }
    out
}

pub fn render_cutting_plan(rows: &[CuttingPlanRow], layout: bool) -> String {
    let mut out = String::new();
    for row in rows {
        match row {
            CuttingPlanRow::Cut(cut) => {
                out.push_str(&format!(
                    "{:<6} {:>3} x {:>5.1}m  cut {}  (waste {:.3}m)\n",
                    cut.diameter,
                    cut.quantity,
                    cut.length_m,
                    cut.cuts.join(" + "),
                    cut.waste_m,
                ));
                if layout {
                    out.push_str(&render_bar(cut));
                }
            }
            CuttingPlanRow::Error(err) => {
                out.push_str(&format!("{:<6} ERROR: {}\n", err.diameter, err.error));
            }
        }
    }
    out
}
