//! Compact number and currency rendering (`1.5K`, `$2M`).

const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

/// Compact notation with at most one fractional digit.
pub fn format_number(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{}", compact_abs(value.abs()))
}

/// Compact US-dollar notation.
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${}", compact_abs(amount.abs()))
}

/// Human-readable budget span. Zero counts as "not given".
pub fn format_budget_range(min: Option<f64>, max: Option<f64>) -> String {
    let min = min.filter(|v| *v != 0.0);
    let max = max.filter(|v| *v != 0.0);
    match (min, max) {
        (None, None) => "Budget not specified".to_string(),
        (None, Some(max)) => format!("Up to {}", format_currency(max)),
        (Some(min), None) => format!("From {}", format_currency(min)),
        (Some(min), Some(max)) => format!("{} - {}", format_currency(min), format_currency(max)),
    }
}

fn compact_abs(value: f64) -> String {
    // Walk from the smallest unit up so that 999_950 rolls over to "1M".
    let mut chosen: Option<(f64, &str)> = None;
    for (scale, suffix) in UNITS.iter().rev() {
        if value >= *scale {
            chosen = Some((*scale, suffix));
        }
    }

    match chosen {
        None => {
            let rounded = round1(value);
            if rounded >= 1_000.0 {
                format!("{}K", trim(round1(rounded / 1e3)))
            } else {
                trim(rounded)
            }
        }
        Some((scale, suffix)) => {
            let scaled = round1(value / scale);
            if scaled >= 1_000.0 {
                if let Some((next_scale, next_suffix)) =
                    UNITS.iter().rev().find(|(s, _)| *s > scale)
                {
                    return format!("{}{next_suffix}", trim(round1(value / next_scale)));
                }
            }
            format!("{}{suffix}", trim(scaled))
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn trim(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}
