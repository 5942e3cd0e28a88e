use anyhow::Result;
use std::process;

use totum_core::service::Session;

use super::helpers::json_error;

pub(crate) fn cmd_favorite_add(session: &mut Session, name: &str, json: bool) -> Result<()> {
    if session.find_food(name).is_none() {
        eprintln!("Note: '{name}' is not in the current food table");
    }
    let added = session.add_favorite(name)?;

    if json {
        println!("{}", serde_json::json!({ "favorite": name.trim(), "added": added }));
    } else if added {
        println!("Added favorite: {}", name.trim());
    } else {
        println!("Already a favorite: {}", name.trim());
    }

    Ok(())
}

pub(crate) fn cmd_favorite_remove(session: &mut Session, name: &str, json: bool) -> Result<()> {
    if session.remove_favorite(name)? {
        if json {
            println!("{}", serde_json::json!({ "removed": name.trim() }));
        } else {
            println!("Removed favorite: {}", name.trim());
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("'{name}' is not a favorite")));
        } else {
            eprintln!("'{name}' is not a favorite");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_favorite_list(session: &Session, json: bool) -> Result<()> {
    let favorites = session.favorites()?;

    if favorites.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No favorites yet");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&favorites)?);
    } else {
        for name in &favorites {
            println!("★ {name}");
        }
    }

    Ok(())
}
