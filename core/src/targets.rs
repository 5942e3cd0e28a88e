//! Daily nutrient targets derived from a profile.

use serde::Serialize;

use crate::models::{ActivityLevel, MicroKind, MicroProgress, NutrientProgress, Profile, Sex};
use crate::nutrients::{Nutrient, NutrientTotals, canon, label_unit};

const KCAL_PER_G_FAT: f64 = 9.0;
const KCAL_PER_G_CARB: f64 = 4.0;

/// Daily goal for a vitamin or mineral measured in µg.
pub const DEFAULT_MICROGRAM_GOAL: f64 = 400.0;
/// Daily goal for any other vitamin or mineral.
pub const DEFAULT_MILLIGRAM_GOAL: f64 = 1000.0;

/// Energy multiplier and upper protein allowance for an activity level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityFactors {
    pub energy_factor: f64,
    pub protein_max_g_per_kg: f64,
}

impl ActivityLevel {
    #[must_use]
    pub fn factors(self) -> ActivityFactors {
        let (energy_factor, protein_max_g_per_kg) = match self {
            Self::Sedentary => (1.2, 1.0),
            Self::Light => (1.375, 1.2),
            Self::Moderate => (1.55, 1.6),
            Self::Intense => (1.725, 2.0),
            Self::VeryIntense => (1.9, 2.5),
        };
        ActivityFactors {
            energy_factor,
            protein_max_g_per_kg,
        }
    }
}

/// Basal metabolic rate, revised Harris-Benedict, in kcal/day.
#[must_use]
pub fn bmr(profile: &Profile) -> f64 {
    let w = profile.weight_kg;
    let h = profile.height_cm;
    let age = f64::from(profile.age);
    match profile.sex {
        Sex::Male => 88.362 + 13.397 * w + 4.799 * h - 5.677 * age,
        Sex::Female => 447.593 + 9.247 * w + 3.098 * h - 4.330 * age,
    }
}

/// Total daily energy expenditure.
#[must_use]
pub fn tdee(profile: &Profile) -> f64 {
    bmr(profile) * profile.activity.factors().energy_factor
}

/// Percent of `target` reached by `value`; `None` when there is no target.
#[must_use]
pub fn coverage(value: f64, target: f64) -> Option<f64> {
    (target > 0.0).then(|| value / target * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTargets {
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub carbohydrates_g: f64,
    pub fat_g: f64,
    pub fibre_g: f64,
    pub saturated_fat_g: f64,
    pub omega9_g: f64,
    pub omega6_g: f64,
    pub ala_g: f64,
    pub epa_g: f64,
    pub dha_g: f64,
    pub sugars_g: f64,
    pub salt_g: f64,
}

impl DailyTargets {
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        let energy = tdee(profile);
        let fat_share = |pct: f64| energy * pct / KCAL_PER_G_FAT;
        let carb_share = |pct: f64| energy * pct / KCAL_PER_G_CARB;
        Self {
            energy_kcal: energy,
            protein_g: profile.weight_kg * profile.activity.factors().protein_max_g_per_kg,
            carbohydrates_g: carb_share(0.55),
            fat_g: fat_share(0.35),
            fibre_g: 30.0,
            saturated_fat_g: fat_share(0.10),
            omega9_g: fat_share(0.15),
            omega6_g: fat_share(0.04),
            ala_g: fat_share(0.01),
            epa_g: 0.25,
            dha_g: 0.25,
            sugars_g: carb_share(0.10),
            salt_g: 6.0,
        }
    }

    /// Target for a known nutrient; `None` for anything outside the table.
    #[must_use]
    pub fn get(&self, nutrient: &Nutrient) -> Option<f64> {
        let value = match nutrient {
            Nutrient::Energy => self.energy_kcal,
            Nutrient::Protein => self.protein_g,
            Nutrient::Carbohydrates => self.carbohydrates_g,
            Nutrient::Fat => self.fat_g,
            Nutrient::Fibre => self.fibre_g,
            Nutrient::SaturatedFat => self.saturated_fat_g,
            Nutrient::OleicOmega9 => self.omega9_g,
            Nutrient::LinoleicOmega6 => self.omega6_g,
            Nutrient::AlphaLinolenicOmega3 => self.ala_g,
            Nutrient::Epa => self.epa_g,
            Nutrient::Dha => self.dha_g,
            Nutrient::Sugars => self.sugars_g,
            Nutrient::Salt => self.salt_g,
            Nutrient::Other(_) => return None,
        };
        Some(value)
    }

    #[must_use]
    pub fn scaled(&self, days: f64) -> Self {
        Self {
            energy_kcal: self.energy_kcal * days,
            protein_g: self.protein_g * days,
            carbohydrates_g: self.carbohydrates_g * days,
            fat_g: self.fat_g * days,
            fibre_g: self.fibre_g * days,
            saturated_fat_g: self.saturated_fat_g * days,
            omega9_g: self.omega9_g * days,
            omega6_g: self.omega6_g * days,
            ala_g: self.ala_g * days,
            epa_g: self.epa_g * days,
            dha_g: self.dha_g * days,
            sugars_g: self.sugars_g * days,
            salt_g: self.salt_g * days,
        }
    }

    #[must_use]
    pub fn weekly(&self) -> Self {
        self.scaled(7.0)
    }

    /// One row per known nutrient, in report order.
    #[must_use]
    pub fn progress(&self, totals: &NutrientTotals) -> Vec<NutrientProgress> {
        Nutrient::KNOWN
            .into_iter()
            .filter_map(|nutrient| {
                let target = self.get(&nutrient)?;
                let consumed = totals.get(&nutrient);
                Some(NutrientProgress {
                    coverage_pct: coverage(consumed, target),
                    nutrient,
                    consumed,
                    target,
                })
            })
            .collect()
    }
}

/// Rows for the vitamins and minerals in `totals` that have no entry in
/// [`DailyTargets`]. A label naming a vitamin counts as one; otherwise a
/// `mg` or `µg` unit marks a mineral, and anything else is skipped. Goals
/// are the per-day defaults times `days`. Vitamins come first, each group
/// sorted by coverage, highest first.
#[must_use]
pub fn micro_progress(totals: &NutrientTotals, days: f64) -> Vec<MicroProgress> {
    let mut rows: Vec<MicroProgress> = totals
        .iter()
        .filter(|(nutrient, _, _)| matches!(nutrient, Nutrient::Other(_)))
        .filter_map(|(_, label, consumed)| {
            let unit = label_unit(label);
            let kind = if canon(label).contains("vit") {
                MicroKind::Vitamin
            } else if unit == "mg" || unit == "µg" {
                MicroKind::Mineral
            } else {
                return None;
            };
            let per_day = if unit == "µg" {
                DEFAULT_MICROGRAM_GOAL
            } else {
                DEFAULT_MILLIGRAM_GOAL
            };
            let goal = per_day * days;
            Some(MicroProgress {
                label: label.to_string(),
                kind,
                unit,
                consumed,
                goal,
                coverage_pct: coverage(consumed, goal).unwrap_or(0.0),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then(b.coverage_pct.total_cmp(&a.coverage_pct))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_bmr_male_default_profile() {
        assert!(approx(bmr(&Profile::default()), 1694.485));
    }

    #[test]
    fn test_bmr_female() {
        let profile = Profile {
            sex: Sex::Female,
            age: 30,
            height_cm: 165.0,
            weight_kg: 60.0,
            activity: ActivityLevel::Moderate,
        };
        assert!(approx(bmr(&profile), 1383.683));
        assert!(approx(tdee(&profile), 1383.683 * 1.55));
    }

    #[test]
    fn test_daily_targets_default_profile() {
        let t = DailyTargets::from_profile(&Profile::default());
        let energy = 1694.485 * 1.2;
        assert!(approx(t.energy_kcal, energy));
        assert!(approx(t.protein_g, 72.0));
        assert!(approx(t.fat_g, energy * 0.35 / 9.0));
        assert!(approx(t.saturated_fat_g, energy * 0.10 / 9.0));
        assert!(approx(t.carbohydrates_g, energy * 0.55 / 4.0));
        assert!(approx(t.sugars_g, energy * 0.10 / 4.0));
        assert!(approx(t.fibre_g, 30.0));
        assert!(approx(t.salt_g, 6.0));
    }

    #[test]
    fn test_protein_scales_with_activity() {
        let profile = Profile {
            activity: ActivityLevel::VeryIntense,
            ..Profile::default()
        };
        let t = DailyTargets::from_profile(&profile);
        assert!(approx(t.protein_g, 72.0 * 2.5));
    }

    #[test]
    fn test_weekly_is_seven_days() {
        let daily = DailyTargets::from_profile(&Profile::default());
        let weekly = daily.weekly();
        assert!(approx(weekly.salt_g, 42.0));
        assert!(approx(weekly.energy_kcal, daily.energy_kcal * 7.0));
    }

    #[test]
    fn test_get_known_and_other() {
        let t = DailyTargets::from_profile(&Profile::default());
        assert_eq!(t.get(&Nutrient::Epa), Some(0.25));
        assert_eq!(t.get(&Nutrient::Other("zincmg".into())), None);
    }

    #[test]
    fn test_coverage() {
        assert_eq!(coverage(50.0, 200.0), Some(25.0));
        assert_eq!(coverage(5.0, 0.0), None);
    }

    #[test]
    fn test_progress_rows() {
        let t = DailyTargets::from_profile(&Profile::default());
        let totals = NutrientTotals::from_row([("Fibres_g", 15.0)]);
        let rows = t.progress(&totals);
        assert_eq!(rows.len(), Nutrient::KNOWN.len());
        let fibre = rows.iter().find(|r| r.nutrient == Nutrient::Fibre).unwrap();
        assert!(approx(fibre.coverage_pct.unwrap(), 50.0));
        let salt = rows.iter().find(|r| r.nutrient == Nutrient::Salt).unwrap();
        assert!(approx(salt.consumed, 0.0));
    }

    #[test]
    fn test_micro_progress_groups_and_sorts() {
        let totals = NutrientTotals::from_row([
            ("Fer_mg", 10.0),
            ("Vitamine_D_mcg", 200.0),
            ("Zinc_mg", 500.0),
            ("Vitamine C - mg", 100.0),
            ("Protéines_g", 50.0),
            ("Eau_g", 300.0),
        ]);
        let rows = micro_progress(&totals, 1.0);
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Vitamine_D_mcg", "Vitamine C - mg", "Zinc_mg", "Fer_mg"]
        );

        assert_eq!(rows[0].kind, MicroKind::Vitamin);
        assert_eq!(rows[0].unit, "µg");
        assert!(approx(rows[0].goal, DEFAULT_MICROGRAM_GOAL));
        assert!(approx(rows[0].coverage_pct, 50.0));

        assert_eq!(rows[2].kind, MicroKind::Mineral);
        assert!(approx(rows[2].goal, DEFAULT_MILLIGRAM_GOAL));
        assert!(approx(rows[3].coverage_pct, 1.0));
    }

    #[test]
    fn test_micro_progress_scales_goal_by_days() {
        let totals = NutrientTotals::from_row([("Calcium_mg", 3500.0)]);
        let rows = micro_progress(&totals, 7.0);
        assert_eq!(rows.len(), 1);
        assert!(approx(rows[0].goal, 7000.0));
        assert!(approx(rows[0].coverage_pct, 50.0));
    }
}
