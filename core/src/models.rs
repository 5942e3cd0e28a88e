use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::coach::{Alert, PeriodAnalysis};
use crate::nutrients::{Nutrient, NutrientTotals, canon};
use crate::targets::DailyTargets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    /// Case- and accent-insensitive; French labels are accepted too.
    fn from_str(s: &str) -> Result<Self> {
        match canon(s).as_str() {
            "breakfast" | "petit dejeuner" => Ok(Self::Breakfast),
            "lunch" | "dejeuner" => Ok(Self::Lunch),
            "dinner" | "diner" => Ok(Self::Dinner),
            "snack" | "collation" | "en cas" | "gouter" => Ok(Self::Snack),
            _ => bail!("Invalid meal type '{s}'. Must be one of: breakfast, lunch, dinner, snack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    /// Accepts `male`/`female`, `homme`/`femme`, and their initials.
    fn from_str(s: &str) -> Result<Self> {
        match canon(s).chars().next() {
            Some('m' | 'h') => Ok(Self::Male),
            Some('f') => Ok(Self::Female),
            _ => bail!("Invalid sex '{s}'. Use male or female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Intense,
    VeryIntense,
}

impl ActivityLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Intense => "intense",
            Self::VeryIntense => "very_intense",
        }
    }

    /// Lenient parse of free-text activity labels, English or French.
    /// Anything unrecognised reads as sedentary.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let key: String = canon(label)
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        // the light and moderate words win over a trailing "active"
        if key.contains("sedentaire") || key.contains("sedentary") || key.contains("inactive") {
            Self::Sedentary
        } else if key.contains("leger") || key.contains("light") {
            Self::Light
        } else if key.contains("modere") || key.contains("moderate") {
            Self::Moderate
        } else if key.contains("tres")
            || key.contains("very")
            || key.contains("2x")
            || key.contains("athlet")
        {
            Self::VeryIntense
        } else if key.contains("intense") || key.contains("active") {
            Self::Intense
        } else {
            Self::Sedentary
        }
    }
}

/// A food from the loaded table. Values are per 100 g.
#[derive(Debug, Clone, Serialize)]
pub struct Food {
    pub name: String,
    pub per_100g: NutrientTotals,
}

impl Food {
    /// Absolute nutrient amounts for a portion.
    #[must_use]
    pub fn nutrients_for(&self, quantity_g: f64) -> NutrientTotals {
        self.per_100g.for_quantity(quantity_g)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub uuid: String,
    pub date: NaiveDate,
    pub meal: MealType,
    pub food_name: String,
    pub quantity_g: f64,
    /// Absolute amounts, frozen at insert time.
    pub nutrients: NutrientTotals,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    pub meal: MealType,
    pub food_name: String,
    pub quantity_g: f64,
    pub nutrients: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub sex: Sex,
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity: ActivityLevel,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            sex: Sex::Male,
            age: 40,
            height_cm: 181.0,
            weight_kg: 72.0,
            activity: ActivityLevel::Sedentary,
        }
    }
}

pub fn validate_profile(profile: &Profile) -> Result<()> {
    if profile.age == 0 {
        bail!("Age must be positive");
    }
    if !(profile.height_cm.is_finite() && profile.height_cm > 0.0) {
        bail!("Height must be a positive number of centimetres");
    }
    if !(profile.weight_kg.is_finite() && profile.weight_kg > 0.0) {
        bail!("Weight must be a positive number of kilograms");
    }
    Ok(())
}

pub fn validate_quantity(quantity_g: f64) -> Result<()> {
    if !quantity_g.is_finite() || quantity_g <= 0.0 {
        bail!("Quantity must be a positive number of grams");
    }
    Ok(())
}

/// Consumed amount against target for one nutrient.
#[derive(Debug, Clone, Serialize)]
pub struct NutrientProgress {
    pub nutrient: Nutrient,
    pub consumed: f64,
    pub target: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MicroKind {
    Vitamin,
    Mineral,
}

/// A vitamin or mineral outside the fixed target table, measured against a
/// default goal.
#[derive(Debug, Clone, Serialize)]
pub struct MicroProgress {
    pub label: String,
    pub kind: MicroKind,
    pub unit: String,
    pub consumed: f64,
    pub goal: f64,
    pub coverage_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal: MealType,
    pub entries: Vec<JournalEntry>,
    pub subtotal: NutrientTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub totals: NutrientTotals,
    pub targets: DailyTargets,
    pub progress: Vec<NutrientProgress>,
    pub micros: Vec<MicroProgress>,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_logged: usize,
    pub totals: NutrientTotals,
    /// Daily targets times seven.
    pub targets: DailyTargets,
    pub progress: Vec<NutrientProgress>,
    pub micros: Vec<MicroProgress>,
    pub analysis: PeriodAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_parse() {
        assert_eq!("Lunch".parse::<MealType>().unwrap(), MealType::Lunch);
        assert_eq!(" SNACK ".parse::<MealType>().unwrap(), MealType::Snack);
        assert_eq!(
            "Petit-déjeuner".parse::<MealType>().unwrap(),
            MealType::Breakfast
        );
        assert_eq!("Dîner".parse::<MealType>().unwrap(), MealType::Dinner);
        assert_eq!("collation".parse::<MealType>().unwrap(), MealType::Snack);
        assert!("brunch".parse::<MealType>().is_err());
    }

    #[test]
    fn test_meal_type_round_trips_as_str() {
        for meal in MealType::ALL {
            assert_eq!(meal.as_str().parse::<MealType>().unwrap(), meal);
        }
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!("Homme".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!("female".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("F".parse::<Sex>().unwrap(), Sex::Female);
        assert!("".parse::<Sex>().is_err());
    }

    #[test]
    fn test_activity_from_label() {
        assert_eq!(ActivityLevel::from_label("Sédentaire"), ActivityLevel::Sedentary);
        assert_eq!(ActivityLevel::from_label("Léger"), ActivityLevel::Light);
        assert_eq!(ActivityLevel::from_label("modéré"), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_label("Intense"), ActivityLevel::Intense);
        assert_eq!(
            ActivityLevel::from_label("Très intense (2x/jour)"),
            ActivityLevel::VeryIntense
        );
        assert_eq!(ActivityLevel::from_label("athlete"), ActivityLevel::VeryIntense);
        assert_eq!(ActivityLevel::from_label("very_intense"), ActivityLevel::VeryIntense);
        assert_eq!(ActivityLevel::from_label("couch"), ActivityLevel::Sedentary);
    }

    #[test]
    fn test_activity_from_english_phrases() {
        assert_eq!(ActivityLevel::from_label("moderately active"), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_label("Lightly active"), ActivityLevel::Light);
        assert_eq!(ActivityLevel::from_label("inactive"), ActivityLevel::Sedentary);
        assert_eq!(ActivityLevel::from_label("active"), ActivityLevel::Intense);
        assert_eq!(ActivityLevel::from_label("very active"), ActivityLevel::VeryIntense);
    }

    #[test]
    fn test_activity_as_str_round_trips() {
        for level in [
            ActivityLevel::Sedentary,
            ActivityLevel::Light,
            ActivityLevel::Moderate,
            ActivityLevel::Intense,
            ActivityLevel::VeryIntense,
        ] {
            assert_eq!(ActivityLevel::from_label(level.as_str()), level);
        }
    }

    #[test]
    fn test_validate_profile() {
        assert!(validate_profile(&Profile::default()).is_ok());
        let base = Profile::default();
        assert!(validate_profile(&Profile { age: 0, ..base.clone() }).is_err());
        assert!(validate_profile(&Profile { height_cm: -1.0, ..base.clone() }).is_err());
        assert!(validate_profile(&Profile { weight_kg: f64::NAN, ..base }).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(150.0).is_ok());
        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(-5.0).is_err());
        assert!(validate_quantity(f64::INFINITY).is_err());
    }

    #[test]
    fn test_food_nutrients_for() {
        let food = Food {
            name: "Poulet".into(),
            per_100g: NutrientTotals::from_row([("Protéines_g", 20.0), ("Lipides_g", 4.0)]),
        };
        let portion = food.nutrients_for(150.0);
        assert!((portion.get(&Nutrient::Protein) - 30.0).abs() < f64::EPSILON);
        assert!((portion.get(&Nutrient::Fat) - 6.0).abs() < f64::EPSILON);
    }
}
