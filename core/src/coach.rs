//! Period analysis and daily alerts.

use serde::Serialize;

use crate::nutrients::{Nutrient, NutrientTotals};
use crate::targets::{DailyTargets, coverage};

const STRENGTH_PCT: f64 = 100.0;
const GAP_PCT: f64 = 80.0;
const MAX_ITEMS: usize = 3;
const MAX_ALERTS: usize = 4;

/// Nutrients where more is better, up to the target.
pub const TO_REACH: [Nutrient; 9] = [
    Nutrient::Protein,
    Nutrient::Fibre,
    Nutrient::Carbohydrates,
    Nutrient::Fat,
    Nutrient::AlphaLinolenicOmega3,
    Nutrient::Epa,
    Nutrient::Dha,
    Nutrient::LinoleicOmega6,
    Nutrient::OleicOmega9,
];

/// Nutrients whose target is a ceiling.
pub const TO_LIMIT: [Nutrient; 3] = [Nutrient::Sugars, Nutrient::SaturatedFat, Nutrient::Salt];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    pub nutrient: Nutrient,
    pub coverage_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Excess {
    pub nutrient: Nutrient,
    pub consumed: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodAnalysis {
    pub strengths: Vec<Coverage>,
    pub gaps: Vec<Coverage>,
    pub excesses: Vec<Excess>,
}

/// A day's intake well past a ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub nutrient: Nutrient,
    pub consumed: f64,
    pub target: f64,
    /// Multiple of the target that triggers the alert.
    pub threshold: f64,
}

/// Strengths, gaps and excesses over a period. `targets` must already be
/// scaled to the period length.
#[must_use]
pub fn analyze_period(totals: &NutrientTotals, targets: &DailyTargets) -> PeriodAnalysis {
    let mut strengths = Vec::new();
    let mut gaps = Vec::new();

    for nutrient in TO_REACH {
        let Some(pct) = targets
            .get(&nutrient)
            .and_then(|t| coverage(totals.get(&nutrient), t))
        else {
            continue;
        };
        if pct >= STRENGTH_PCT {
            strengths.push(Coverage {
                nutrient,
                coverage_pct: pct,
            });
        } else if pct < GAP_PCT {
            gaps.push(Coverage {
                nutrient,
                coverage_pct: pct,
            });
        }
    }

    strengths.truncate(MAX_ITEMS);
    gaps.sort_by(|a, b| a.coverage_pct.total_cmp(&b.coverage_pct));
    gaps.truncate(MAX_ITEMS);

    let excesses = TO_LIMIT
        .into_iter()
        .filter_map(|nutrient| {
            let limit = targets.get(&nutrient).filter(|t| *t > 0.0)?;
            let consumed = totals.get(&nutrient);
            (consumed > limit).then_some(Excess {
                nutrient,
                consumed,
                limit,
            })
        })
        .take(MAX_ITEMS)
        .collect();

    PeriodAnalysis {
        strengths,
        gaps,
        excesses,
    }
}

/// Alerts for a single day against daily targets.
#[must_use]
pub fn analyze_day(totals: &NutrientTotals, targets: &DailyTargets) -> Vec<Alert> {
    [
        (Nutrient::SaturatedFat, 1.1),
        (Nutrient::Salt, 1.1),
        (Nutrient::Fat, 1.2),
        (Nutrient::Sugars, 1.2),
    ]
    .into_iter()
    .filter_map(|(nutrient, threshold)| {
        let target = targets.get(&nutrient).filter(|t| *t > 0.0)?;
        let consumed = totals.get(&nutrient);
        (consumed >= threshold * target).then_some(Alert {
            nutrient,
            consumed,
            target,
            threshold,
        })
    })
    .take(MAX_ALERTS)
    .collect()
}
