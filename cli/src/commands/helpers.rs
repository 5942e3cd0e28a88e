use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use totum_core::models::{MicroKind, MicroProgress, NutrientProgress};
use totum_core::search::{MatchKind, SearchHit};

/// Parse a quantity into grams. Accepts "150", "150g", "150 g", "0.2kg"
/// and a decimal comma ("12,5g").
pub(crate) fn parse_quantity(s: &str) -> Result<f64> {
    let cleaned = s.trim().to_lowercase().replace(',', ".");
    let (number, factor) = if let Some(kg) = cleaned.strip_suffix("kg") {
        (kg, 1000.0)
    } else {
        (cleaned.trim_end_matches('g'), 1.0)
    };
    let value: f64 = number.trim().parse().with_context(|| {
        format!("Invalid quantity: '{s}'. Use a number of grams like '150' or '150g'")
    })?;
    let grams = value * factor;
    if !grams.is_finite() || grams <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(grams)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn print_hit_table(hits: &[SearchHit]) {
    #[derive(Tabled)]
    struct HitRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Match")]
        kind: String,
        #[tabled(rename = "")]
        marker: String,
    }

    let rows: Vec<HitRow> = hits
        .iter()
        .enumerate()
        .map(|(i, h)| HitRow {
            idx: i + 1,
            name: truncate(&h.name, 50),
            kind: match h.kind {
                MatchKind::Prefix => "prefix".to_string(),
                MatchKind::AllTokens => "all words".to_string(),
                MatchKind::Substring => "substring".to_string(),
                MatchKind::Similarity => {
                    format!("similar ({:.2})", h.similarity.unwrap_or_default())
                }
                MatchKind::Unranked => String::new(),
            },
            marker: if h.boost >= 1.0 {
                "★".to_string()
            } else if h.boost > 0.0 {
                "recent".to_string()
            } else {
                String::new()
            },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_progress_table(progress: &[NutrientProgress]) {
    #[derive(Tabled)]
    struct ProgressRow {
        #[tabled(rename = "Nutrient")]
        nutrient: String,
        #[tabled(rename = "Consumed")]
        consumed: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "%")]
        coverage: String,
    }

    let rows: Vec<ProgressRow> = progress
        .iter()
        .map(|p| ProgressRow {
            nutrient: p.nutrient.to_string(),
            consumed: format_amount(p.consumed),
            target: format_amount(p.target),
            coverage: p
                .coverage_pct
                .map_or("-".into(), |pct| format!("{:.0}%", no_neg_zero(pct))),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_micro_table(micros: &[MicroProgress]) {
    #[derive(Tabled)]
    struct MicroRow {
        #[tabled(rename = "Vitamins & minerals")]
        label: String,
        #[tabled(rename = "")]
        kind: &'static str,
        #[tabled(rename = "Consumed")]
        consumed: String,
        #[tabled(rename = "Goal")]
        goal: String,
        #[tabled(rename = "%")]
        coverage: String,
    }

    if micros.is_empty() {
        return;
    }

    let rows: Vec<MicroRow> = micros
        .iter()
        .map(|m| MicroRow {
            label: truncate(&m.label, 40),
            kind: match m.kind {
                MicroKind::Vitamin => "vitamin",
                MicroKind::Mineral => "mineral",
            },
            consumed: format_amount(m.consumed),
            goal: format!("{:.0} {}", m.goal, m.unit),
            coverage: format!("{:.0}%", no_neg_zero(m.coverage_pct)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// One decimal below 10, none above; small amounts like EPA stay readable.
pub(crate) fn format_amount(v: f64) -> String {
    let v = no_neg_zero(v);
    if v.abs() < 10.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.0}")
    }
}

pub(crate) fn format_grams(g: f64) -> String {
    if g.fract() == 0.0 {
        format!("{g:.0}g")
    } else {
        format!("{g}g")
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert!((parse_quantity("150").unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((parse_quantity("150g").unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((parse_quantity("150 g").unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((parse_quantity("12,5g").unwrap() - 12.5).abs() < f64::EPSILON);
        assert!((parse_quantity("0.2kg").unwrap() - 200.0).abs() < 1e-9);
        assert!((parse_quantity(" 1 KG ").unwrap() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("2 tbsp").is_err());
    }

    #[test]
    fn test_parse_quantity_not_positive() {
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("0g").is_err());
        assert!(parse_quantity("-50").is_err());
        assert!(parse_quantity("inf").is_err());
    }

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.24), "0.2");
        assert_eq!(format_amount(9.96), "10.0");
        assert_eq!(format_amount(72.4), "72");
        assert_eq!(format_amount(-0.0), "0.0");
    }

    #[test]
    fn test_format_grams() {
        assert_eq!(format_grams(150.0), "150g");
        assert_eq!(format_grams(12.5), "12.5g");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Poulet rôti", 20), "Poulet rôti");
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }
}
