//! Nutrient label normalisation.
//!
//! Food tables and stored snapshots spell the same nutrient many ways
//! (`Oméga-3 ALA-g`, `omega3_ala_g`, `Acide_alpha-linolénique_W3_ALA_g`).
//! Every label is reduced to a canonical key, the key is resolved against a
//! closed set of known nutrients, and amounts are summed per resolved bucket.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const MICROGRAM: &str = "µg";

/// Unit fragments accepted by [`split_label_unit`].
const KNOWN_UNITS: &[&str] = &[
    "g", "mg", "µg", "mcg", "ug", "μg", "kcal", "kj", "ml", "l", "%",
];

fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '/' | '-' | '–' | '—')
}

/// Accent-free, lowercase, single-spaced form of a label.
///
/// `_`, `/` and dashes become spaces so word boundaries survive.
#[must_use]
pub fn canon(label: &str) -> String {
    let folded: String = strip_diacritics(label)
        .to_lowercase()
        .chars()
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Maps the microgram spellings (`mcg`, `ug`, `μg`) to `µg`. Anything else
/// comes back trimmed and otherwise untouched.
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    let trimmed = unit.trim();
    match trimmed.to_lowercase().as_str() {
        "mcg" | "ug" | "μg" | "µg" => MICROGRAM.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Lookup key for a nutrient label: [`canon`], unit normalisation of the
/// final word, then parentheses, apostrophes and spaces removed.
///
/// Total: every input, including the empty string, yields a key.
#[must_use]
pub fn canonical_key(label: &str) -> String {
    let canonical = canon(label);
    let (head, last) = canonical
        .rsplit_once(' ')
        .unwrap_or(("", canonical.as_str()));
    let unit = normalize_unit(last.trim_matches(|c| c == '(' || c == ')'));
    format!("{head}{unit}")
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | '’'))
        .collect()
}

/// Splits `"Vitamine C — mg"` into `("Vitamine C", "mg")`.
///
/// The split happens on the last dash with whitespace on both sides, and
/// only when the trailing fragment is a recognised unit. Otherwise the whole
/// label comes back with an empty unit.
#[must_use]
pub fn split_label_unit(label: &str) -> (String, String) {
    let trimmed = label.trim();
    let dash = trimmed.char_indices().rev().find(|&(i, c)| {
        matches!(c, '-' | '–' | '—')
            && trimmed[..i].ends_with(char::is_whitespace)
            && trimmed[i + c.len_utf8()..].starts_with(char::is_whitespace)
    });
    if let Some((i, c)) = dash {
        let name = trimmed[..i].trim();
        let unit = trimmed[i + c.len_utf8()..].trim();
        if !name.is_empty() && KNOWN_UNITS.contains(&unit.to_lowercase().as_str()) {
            return (name.to_string(), normalize_unit(unit));
        }
    }
    (trimmed.to_string(), String::new())
}

/// Unit a nutrient label is expressed in: a `" - unit"` suffix first, else
/// a trailing unit word (`Fer_mg`, `Vitamine D (mcg)`). Empty when the label
/// carries no known unit.
#[must_use]
pub fn label_unit(label: &str) -> String {
    let (_, unit) = split_label_unit(label);
    if !unit.is_empty() {
        return unit;
    }
    let canonical = canon(label);
    let last = canonical
        .rsplit(' ')
        .next()
        .unwrap_or_default()
        .trim_matches(|c| c == '(' || c == ')');
    if KNOWN_UNITS.contains(&last) {
        normalize_unit(last)
    } else {
        String::new()
    }
}

/// Strips the `_100g` suffix from a food-table column header.
#[must_use]
pub fn per_100g_label(column: &str) -> Option<&str> {
    column
        .trim()
        .strip_suffix("_100g")
        .filter(|label| !label.is_empty())
}

/// Extracts the first signed decimal number from a dirty cell.
///
/// Non-breaking spaces are dropped and a decimal comma is read as a point,
/// so `"1 234,5 g"` style cells still yield a value. Returns `None` when no
/// digits are present.
#[must_use]
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let bytes = cleaned.as_bytes();
    (0..bytes.len())
        .find_map(|start| number_end(bytes, start).map(|end| (start, end)))
        .and_then(|(start, end)| cleaned[start..end].parse().ok())
}

fn number_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if matches!(bytes.get(i), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let has_int = i > int_start;
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        return Some(i);
    }
    has_int.then_some(i)
}

/// A canonical nutrient. Labels that match no alias keep their canonical
/// key in [`Nutrient::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Nutrient {
    Energy,
    Protein,
    Carbohydrates,
    Fat,
    Fibre,
    SaturatedFat,
    OleicOmega9,
    LinoleicOmega6,
    AlphaLinolenicOmega3,
    Epa,
    Dha,
    Sugars,
    Salt,
    Other(String),
}

impl Nutrient {
    /// Every known nutrient, in report order.
    pub const KNOWN: [Nutrient; 13] = [
        Nutrient::Energy,
        Nutrient::Protein,
        Nutrient::Carbohydrates,
        Nutrient::Fat,
        Nutrient::Fibre,
        Nutrient::SaturatedFat,
        Nutrient::OleicOmega9,
        Nutrient::LinoleicOmega6,
        Nutrient::AlphaLinolenicOmega3,
        Nutrient::Epa,
        Nutrient::Dha,
        Nutrient::Sugars,
        Nutrient::Salt,
    ];

    /// Resolves a raw label through the alias table.
    #[must_use]
    pub fn resolve(label: &str) -> Self {
        let key = canonical_key(label);
        Self::from_key(&key).unwrap_or(Self::Other(key))
    }

    /// Alias lookup on an already canonical key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let nutrient = match key {
            "energiekcal" => Self::Energy,
            "proteinesg" => Self::Protein,
            "glucidesg" => Self::Carbohydrates,
            "lipidesg" => Self::Fat,
            "fibresg" => Self::Fibre,
            "agsaturesg" => Self::SaturatedFat,
            "acideoleiquew9g" => Self::OleicOmega9,
            "acidelinoleiquew6lag" => Self::LinoleicOmega6,
            "acidealphalinoleniquew3alag"
            | "acidealphalinoleniquew3ala"
            | "omega3alag"
            | "omega3ala"
            | "w3alag"
            | "alag" => Self::AlphaLinolenicOmega3,
            "epag" => Self::Epa,
            "dhag" => Self::Dha,
            "sucresg" => Self::Sugars,
            "selg" => Self::Salt,
            _ => return None,
        };
        Some(nutrient)
    }

    /// Preferred display name; `None` for [`Nutrient::Other`].
    #[must_use]
    pub fn display_name(&self) -> Option<&'static str> {
        let name = match self {
            Self::Energy => "Énergie_kcal",
            Self::Protein => "Protéines_g",
            Self::Carbohydrates => "Glucides_g",
            Self::Fat => "Lipides_g",
            Self::Fibre => "Fibres_g",
            Self::SaturatedFat => "AG_saturés_g",
            Self::OleicOmega9 => "Acide_oléique_W9_g",
            Self::LinoleicOmega6 => "Acide_linoléique_W6_LA_g",
            Self::AlphaLinolenicOmega3 => "Acide_alpha-linolénique_W3_ALA_g",
            Self::Epa => "EPA_g",
            Self::Dha => "DHA_g",
            Self::Sugars => "Sucres_g",
            Self::Salt => "Sel_g",
            Self::Other(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(key) => f.write_str(key),
            known => f.write_str(known.display_name().unwrap_or_default()),
        }
    }
}

impl Serialize for Nutrient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Bucket {
    label: String,
    amount: f64,
}

/// Amounts grouped by resolved nutrient.
///
/// Used for per-100 g food values, journal snapshots, and day/week totals.
/// Serialises as `{display label: amount}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NutrientTotals {
    buckets: BTreeMap<Nutrient, Bucket>,
}

impl NutrientTotals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the bucket `label` resolves to. Non-finite values
    /// count as zero.
    pub fn add(&mut self, label: &str, value: f64) {
        let nutrient = Nutrient::resolve(label);
        let display = nutrient
            .display_name()
            .map_or_else(|| label.trim().to_string(), str::to_string);
        self.add_to(nutrient, display, value);
    }

    fn add_to(&mut self, nutrient: Nutrient, label: String, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.buckets
            .entry(nutrient)
            .and_modify(|b| b.amount += value)
            .or_insert(Bucket {
                label,
                amount: value,
            });
    }

    /// Folds a whole row of `(label, value)` pairs into the totals.
    pub fn merge_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        for (label, value) in row {
            self.add(label.as_ref(), value);
        }
    }

    /// Sums another set of totals into this one. Labels already present win.
    pub fn merge(&mut self, other: &NutrientTotals) {
        for (nutrient, bucket) in &other.buckets {
            self.add_to(nutrient.clone(), bucket.label.clone(), bucket.amount);
        }
    }

    #[must_use]
    pub fn from_row<I, S>(row: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut totals = Self::new();
        totals.merge_row(row);
        totals
    }

    /// Amount for a nutrient; absent buckets read as 0.0.
    #[must_use]
    pub fn get(&self, nutrient: &Nutrient) -> f64 {
        self.buckets.get(nutrient).map_or(0.0, |b| b.amount)
    }

    /// Absolute amounts for `quantity_g` grams of a per-100 g profile.
    #[must_use]
    pub fn for_quantity(&self, quantity_g: f64) -> Self {
        let buckets = self
            .buckets
            .iter()
            .map(|(nutrient, bucket)| {
                let scaled = Bucket {
                    label: bucket.label.clone(),
                    amount: quantity_g * bucket.amount / 100.0,
                };
                (nutrient.clone(), scaled)
            })
            .collect();
        Self { buckets }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Nutrient, &str, f64)> {
        self.buckets
            .iter()
            .map(|(n, b)| (n, b.label.as_str(), b.amount))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Serialize for NutrientTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for bucket in self.buckets.values() {
            map.serialize_entry(&bucket.label, &bucket.amount)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_canon_strips_accents_and_separators() {
        assert_eq!(canon("  Protéines_g "), "proteines g");
        assert_eq!(canon("Riz/complet--BIO"), "riz complet bio");
        assert_eq!(canon("Acide_alpha-linolénique"), "acide alpha linolenique");
        assert_eq!(canon(""), "");
    }

    #[test]
    fn test_canonical_key_matches_aliases() {
        assert_eq!(canonical_key("Oméga-3 ALA-g"), "omega3alag");
        assert_eq!(canonical_key("omega3_ala_g"), "omega3alag");
        assert_eq!(canonical_key("Vitamine B12 (mcg)"), "vitamineb12µg");
        assert_eq!(canonical_key("Vitamine B12 ug"), "vitamineb12µg");
        assert_eq!(canonical_key("Acide d’oléique"), "acidedoleique");
        assert_eq!(canonical_key(""), "");
    }

    #[test]
    fn test_omega3_spellings_share_bucket() {
        assert_eq!(
            canonical_key("Oméga-3 ALA-g"),
            canonical_key("omega3_ala_g")
        );
        let mut totals = NutrientTotals::new();
        totals.add("Oméga-3 ALA-g", 1.0);
        totals.add("omega3_ala_g", 0.5);
        assert_eq!(totals.len(), 1);
        let (nutrient, label, amount) = totals.iter().next().unwrap();
        assert_eq!(*nutrient, Nutrient::AlphaLinolenicOmega3);
        assert_eq!(label, "Acide_alpha-linolénique_W3_ALA_g");
        assert!(approx(amount, 1.5));
    }

    #[test]
    fn test_display_names_resolve_to_themselves() {
        for nutrient in Nutrient::KNOWN {
            let name = nutrient.display_name().unwrap();
            assert_eq!(Nutrient::resolve(name), nutrient, "{name}");
        }
    }

    #[test]
    fn test_unknown_label_falls_back_to_key() {
        assert_eq!(
            Nutrient::resolve("Vitamine C (mg)"),
            Nutrient::Other("vitaminecmg".into())
        );
    }

    #[test]
    fn test_unknown_bucket_keeps_first_label() {
        let mut totals = NutrientTotals::new();
        totals.add("Vitamine C mg", 10.0);
        totals.add("vitamine_c_mg", 5.0);
        let (_, label, amount) = totals.iter().next().unwrap();
        assert_eq!(label, "Vitamine C mg");
        assert!(approx(amount, 15.0));
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = [("Protéines_g", 10.0), ("Sucres_g", 2.0)];
        let b = [("proteines g", 5.0), ("EPA_g", 0.1)];
        let c = [("PROTEINES-G", 1.0), ("sucres_g", 3.0)];

        let mut left = NutrientTotals::from_row(a);
        left.merge(&NutrientTotals::from_row(b));
        left.merge(&NutrientTotals::from_row(c));

        let mut right = NutrientTotals::from_row(c);
        let mut bc = NutrientTotals::from_row(b);
        bc.merge(&NutrientTotals::from_row(a));
        right.merge(&bc);

        for nutrient in [Nutrient::Protein, Nutrient::Sugars, Nutrient::Epa] {
            assert!(approx(left.get(&nutrient), right.get(&nutrient)));
        }
        assert!(approx(left.get(&Nutrient::Protein), 16.0));
        assert!(approx(left.get(&Nutrient::Sugars), 5.0));
    }

    #[test]
    fn test_non_finite_counts_as_zero() {
        let mut totals = NutrientTotals::new();
        totals.add("Sel_g", f64::NAN);
        totals.add("Sel_g", 1.2);
        totals.add("Sel_g", f64::INFINITY);
        assert!(approx(totals.get(&Nutrient::Salt), 1.2));
        assert!(approx(totals.get(&Nutrient::Fibre), 0.0));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_for_quantity_is_exact_for_whole_grams() {
        let per_100g = NutrientTotals::from_row([("Protéines_g", 20.0)]);
        let snapshot = per_100g.for_quantity(150.0);
        assert_eq!(snapshot.get(&Nutrient::Protein), 30.0);
    }

    #[test]
    fn test_serializes_by_display_label() {
        let totals = NutrientTotals::from_row([("proteinesg", 12.5), ("Zinc mg", 3.0)]);
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json["Protéines_g"], 12.5);
        assert_eq!(json["Zinc mg"], 3.0);
    }

    #[test]
    fn test_label_unit() {
        assert_eq!(label_unit("Vitamine C — mg"), "mg");
        assert_eq!(label_unit("Vitamine_D_mcg"), "µg");
        assert_eq!(label_unit("Vitamine D (ug)"), "µg");
        assert_eq!(label_unit("Fer_mg"), "mg");
        assert_eq!(label_unit("Vitamine A"), "");
        assert_eq!(label_unit(""), "");
    }

    #[test]
    fn test_split_label_unit() {
        assert_eq!(
            split_label_unit("Vitamine C — mg"),
            ("Vitamine C".to_string(), "mg".to_string())
        );
        assert_eq!(
            split_label_unit("Vitamine D - mcg"),
            ("Vitamine D".to_string(), "µg".to_string())
        );
        assert_eq!(
            split_label_unit("Acide_alpha-linolénique"),
            ("Acide_alpha-linolénique".to_string(), String::new())
        );
    }

    #[test]
    fn test_per_100g_label() {
        assert_eq!(per_100g_label("Protéines_g_100g"), Some("Protéines_g"));
        assert_eq!(per_100g_label("nom"), None);
        assert_eq!(per_100g_label("_100g"), None);
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("12,5"), Some(12.5));
        assert_eq!(coerce_number("1\u{a0}234"), Some(1234.0));
        assert_eq!(coerce_number("< 0.5 g"), Some(0.5));
        assert_eq!(coerce_number("-3"), Some(-3.0));
        assert_eq!(coerce_number("traces"), None);
        assert_eq!(coerce_number(""), None);
    }
}
