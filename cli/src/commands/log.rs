use anyhow::Result;
use std::process;

use totum_core::models::MealType;
use totum_core::nutrients::Nutrient;
use totum_core::search::{MatchKind, SearchHit, SearchOptions};
use totum_core::service::Session;

use super::helpers::{
    format_grams, json_error, parse_date, parse_quantity, print_hit_table, prompt_choice,
};

const PICK_LIMIT: i64 = 10;

/// Hits a log may pick from; similarity fallbacks are left out.
fn food_candidates(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|h| h.kind != MatchKind::Similarity)
        .collect()
}

fn no_match(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// A name that matches ignoring accents and case wins outright. Otherwise
/// the query is searched; a single candidate is taken, several are offered
/// in a picker (or listed as an error under `--json`).
fn resolve_food_name(session: &Session, query: &str, json: bool) -> Result<String> {
    if let Some(food) = session.find_food(query) {
        return Ok(food.name.clone());
    }

    let mut candidates = food_candidates(session.search(
        query,
        SearchOptions {
            limit: PICK_LIMIT,
            page: 1,
        },
    ));

    match candidates.len() {
        0 => no_match(&format!("No food found for '{query}'"), json),
        1 => Ok(candidates.swap_remove(0).name),
        n if json => {
            let names: Vec<&str> = candidates.iter().map(|h| h.name.as_str()).collect();
            no_match(
                &format!(
                    "'{query}' matches {n} foods: {}. Use the exact name",
                    names.join(", ")
                ),
                true,
            )
        }
        n => {
            print_hit_table(&candidates);
            let idx = prompt_choice(n)?;
            Ok(candidates.swap_remove(idx).name)
        }
    }
}

pub(crate) fn cmd_log(
    session: &mut Session,
    food_query: &str,
    quantity: &str,
    meal: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let meal: MealType = meal.parse()?;
    let quantity_g = parse_quantity(quantity)?;
    let date = parse_date(date)?;
    let name = resolve_food_name(session, food_query, json)?;

    let entry = session.log_food(date, meal, &name, quantity_g)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let id = entry.id;
        let grams = format_grams(entry.quantity_g);
        let kcal = entry.nutrients.get(&Nutrient::Energy);
        println!("Logged: {name} {grams} for {meal} on {date} — {kcal:.0} kcal [{id}]");
    }

    Ok(())
}

pub(crate) fn cmd_delete(session: &Session, entry_id: i64, json: bool) -> Result<()> {
    if session.delete_entry(entry_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": entry_id }));
        } else {
            println!("Deleted entry {entry_id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {entry_id} not found")));
        } else {
            eprintln!("Entry {entry_id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_undo(session: &Session, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let last = session.entries_for_date(date)?.pop();

    match last {
        Some(entry) if session.undo_last(date)? => {
            if json {
                println!("{}", serde_json::json!({ "deleted": entry.id }));
            } else {
                let name = &entry.food_name;
                let grams = format_grams(entry.quantity_g);
                println!("Removed: {name} {grams} from {date}");
            }
            Ok(())
        }
        _ => {
            if json {
                println!("{}", json_error(&format!("No entries on {date}")));
            } else {
                eprintln!("No entries on {date}");
            }
            process::exit(2);
        }
    }
}
