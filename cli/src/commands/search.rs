use anyhow::Result;
use std::process;

use totum_core::search::SearchOptions;
use totum_core::service::Session;

use super::helpers::print_hit_table;

pub(crate) fn cmd_search(
    session: &Session,
    query: &str,
    limit: i64,
    page: i64,
    json: bool,
) -> Result<()> {
    let hits = session.search(query, SearchOptions { limit, page });

    if hits.is_empty() {
        if json {
            println!("[]");
        } else if session.foods().is_empty() {
            eprintln!("The food table is empty. Point --foods at a CSV file");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print_hit_table(&hits);
    }

    Ok(())
}
