use anyhow::Result;
use std::process;

use totum_core::models::MealType;
use totum_core::nutrients::Nutrient;
use totum_core::service::Session;

use super::helpers::{
    format_amount, format_grams, parse_date, print_micro_table, print_progress_table,
};

fn meal_label(meal: MealType) -> String {
    meal.as_str().to_uppercase()
}

pub(crate) fn cmd_summary(session: &Session, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = session.daily_report(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.meals.is_empty() {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    println!("=== {date} ===\n");

    for meal in &summary.meals {
        let label = meal_label(meal.meal);
        let kcal = meal.subtotal.get(&Nutrient::Energy);
        println!("  {label} ({kcal:.0} kcal)");
        for e in &meal.entries {
            let id = e.id;
            let name = &e.food_name;
            let grams = format_grams(e.quantity_g);
            let kcal = e.nutrients.get(&Nutrient::Energy);
            let p = e.nutrients.get(&Nutrient::Protein);
            let c = e.nutrients.get(&Nutrient::Carbohydrates);
            let f = e.nutrients.get(&Nutrient::Fat);
            println!(
                "    [{id}] {name} — {grams} — {kcal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g"
            );
        }
        println!();
    }

    print_progress_table(&summary.progress);
    print_micro_table(&summary.micros);

    for alert in &summary.alerts {
        let nutrient = &alert.nutrient;
        let consumed = format_amount(alert.consumed);
        let target = format_amount(alert.target);
        println!("  ! {nutrient}: {consumed} against a limit of {target}");
    }

    Ok(())
}

pub(crate) fn cmd_week(session: &Session, end: Option<String>, json: bool) -> Result<()> {
    let end = parse_date(end)?;
    let week = session.weekly_report(end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&week)?);
        return Ok(());
    }

    if week.days_logged == 0 {
        let start = week.start;
        eprintln!("No entries between {start} and {end}");
        process::exit(2);
    }

    let start = week.start;
    let days = week.days_logged;
    println!("=== {start} → {end} ({days}/7 days logged) ===\n");

    print_progress_table(&week.progress);
    print_micro_table(&week.micros);

    let analysis = &week.analysis;
    if !analysis.strengths.is_empty() {
        println!("\n  Strengths:");
        for s in &analysis.strengths {
            let nutrient = &s.nutrient;
            let pct = s.coverage_pct;
            println!("    + {nutrient} ({pct:.0}%)");
        }
    }
    if !analysis.gaps.is_empty() {
        println!("\n  Gaps:");
        for g in &analysis.gaps {
            let nutrient = &g.nutrient;
            let pct = g.coverage_pct;
            println!("    - {nutrient} ({pct:.0}%)");
        }
    }
    if !analysis.excesses.is_empty() {
        println!("\n  Excesses:");
        for x in &analysis.excesses {
            let nutrient = &x.nutrient;
            let consumed = format_amount(x.consumed);
            let limit = format_amount(x.limit);
            println!("    ! {nutrient}: {consumed} (limit {limit})");
        }
    }

    Ok(())
}
