mod commands;
mod config;
mod server;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_delete, cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove, cmd_log,
    cmd_profile_set, cmd_profile_show, cmd_search, cmd_summary, cmd_undo, cmd_week,
};
use crate::config::Config;
use totum_core::food_table::FoodTable;
use totum_core::service::Session;

#[derive(Parser)]
#[command(
    name = "totum",
    version,
    about = "A local-first nutrition tracker",
    long_about = "Log what you eat against a food table, and see daily and weekly \
                  nutrient totals next to targets computed from your profile."
)]
struct Cli {
    /// Food table CSV (default: foods.csv in the data directory)
    #[arg(long, global = true, env = "TOTUM_FOODS", value_name = "PATH")]
    foods: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuzzy-search the food table
    Search {
        /// Search query (empty lists the table)
        #[arg(default_value = "")]
        query: String,
        /// Results per page
        #[arg(short, long, default_value_t = 30)]
        limit: i64,
        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food eaten
    Log {
        /// Food name (exact, or a search query)
        food: String,
        /// Quantity eaten (e.g. "150", "150g", "0.2kg")
        quantity: String,
        /// Meal: breakfast, lunch, dinner, snack (French labels accepted)
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a journal entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the last entry logged for a day
    Undo {
        /// Day to undo on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's entries, totals, targets and alerts (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals and analysis for the seven days ending on a date
    Week {
        /// Last day of the week (default: today)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the profile used to compute targets
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Manage favourite foods (boosted in search)
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Update profile fields; omitted fields keep their current value
    Set {
        /// male/female (homme/femme accepted)
        #[arg(long)]
        sex: Option<String>,
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// sedentary, light, moderate, intense, very_intense (French labels accepted)
        #[arg(long)]
        activity: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the profile and the daily targets derived from it
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Mark a food as favourite
    Add {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Unmark a favourite food
    Remove {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List favourite foods
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TOTUM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.foods)?;
    let foods = FoodTable::load(&config.foods_path).unwrap_or_default();
    if foods.is_empty() {
        warn!(path = %config.foods_path.display(), "no foods loaded; search and logging need a food table");
    }
    let mut session = Session::open(&config.db_path, Arc::new(foods))?;

    match cli.command {
        Commands::Search {
            query,
            limit,
            page,
            json,
        } => cmd_search(&session, &query, limit, page, json),
        Commands::Log {
            food,
            quantity,
            meal,
            date,
            json,
        } => cmd_log(&mut session, &food, &quantity, &meal, date, json),
        Commands::Delete { entry_id, json } => cmd_delete(&session, entry_id, json),
        Commands::Undo { date, json } => cmd_undo(&session, date, json),
        Commands::Summary { date, json } => cmd_summary(&session, date, json),
        Commands::Week { end, json } => cmd_week(&session, end, json),
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                sex,
                age,
                height,
                weight,
                activity,
                json,
            } => cmd_profile_set(
                &session,
                sex.as_deref(),
                age,
                height,
                weight,
                activity.as_deref(),
                json,
            ),
            ProfileCommands::Show { json } => cmd_profile_show(&session, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add { name, json } => cmd_favorite_add(&mut session, &name, json),
            FavoriteCommands::Remove { name, json } => {
                cmd_favorite_remove(&mut session, &name, json)
            }
            FavoriteCommands::List { json } => cmd_favorite_list(&session, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            server::start_server(session, port, &bind, api_key).await
        }
    }
}
