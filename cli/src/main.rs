mod client;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::commands::{
    Cache, FoodSource, IngredientChanges, ProfileChanges, cmd_delete, cmd_entries, cmd_export,
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_load,
    cmd_ingredient_show, cmd_ingredient_update, cmd_log, cmd_logout, cmd_metrics,
    cmd_profile_goal, cmd_profile_set, cmd_profile_show, cmd_search, cmd_update,
    cmd_weight_delete, cmd_weight_history, cmd_weight_log, parse_date, resolve_range,
};
use crate::config::Config;
use kcal_core::aggregate::DateRange;
use kcal_core::ingredient_cache::{DEFAULT_SEARCH_LIMIT, IngredientCache};
use kcal_core::models::{Macros, NewIngredient};
use kcal_core::session::FileStore;

#[derive(Parser)]
#[command(
    name = "kcal",
    version,
    about = "Track calories and body weight against a kcal backend"
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the ingredient catalog
    Search {
        /// Search query (at least 2 characters)
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage ingredients
    Ingredients {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Drop the session's cached ingredient catalog
    Logout,
    /// Show food entries grouped by day (defaults to today)
    Entries {
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food entry
    Log {
        /// Food name to look up
        food: String,
        /// Weight in grams (e.g. "200", "200g", "2*45+12")
        weight: String,
        #[command(flatten)]
        manual: ManualArgs,
        /// Meal time (RFC 3339, "YYYY-MM-DD HH:MM" or "HH:MM"; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a food entry
    Update {
        /// Entry ID to update
        id: i64,
        /// Food name to look up
        food: String,
        /// Weight in grams (e.g. "200", "200g", "2*45+12")
        weight: String,
        #[command(flatten)]
        manual: ManualArgs,
        /// Meal time (RFC 3339, "YYYY-MM-DD HH:MM" or "HH:MM"; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food entry by ID
    Delete {
        /// Entry ID to delete
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// View or edit your profile and weight goal
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show BMI, BMR and TDEE computed by the backend
    Metrics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export food entries to CSV
    Export {
        /// Destination file
        file: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Preset range: today, yesterday, week, month
    #[arg(short, long)]
    filter: Option<String>,
    /// Start date (YYYY-MM-DD or today/yesterday)
    #[arg(long)]
    from: Option<String>,
    /// End date (YYYY-MM-DD or today/yesterday)
    #[arg(long)]
    to: Option<String>,
}

impl RangeArgs {
    fn resolve(self) -> Result<DateRange> {
        let from = self.from.map(|d| parse_date(Some(d))).transpose()?;
        let to = self.to.map(|d| parse_date(Some(d))).transpose()?;
        resolve_range(self.filter.as_deref(), from, to)
    }
}

#[derive(Args)]
struct ManualArgs {
    /// Kcal per 100g; skips the catalog lookup
    #[arg(long)]
    kcal: Option<f64>,
    /// Fats per 100g (with --kcal)
    #[arg(long, requires = "kcal")]
    fats: Option<f64>,
    /// Carbs per 100g (with --kcal)
    #[arg(long, requires = "kcal")]
    carbs: Option<f64>,
    /// Proteins per 100g (with --kcal)
    #[arg(long, requires = "kcal")]
    proteins: Option<f64>,
}

impl ManualArgs {
    fn into_source(self) -> FoodSource {
        match self.kcal {
            Some(kcal_per_100g) => FoodSource::Manual {
                kcal_per_100g,
                macros: Macros {
                    fats: self.fats,
                    carbs: self.carbs,
                    proteins: self.proteins,
                },
            },
            None => FoodSource::Lookup,
        }
    }
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Fetch the full catalog into the session cache
    Load {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached ingredients
    List {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one ingredient
    Show {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient
    Add {
        /// Ingredient name
        name: String,
        /// Kcal per 100g
        #[arg(long)]
        kcal: f64,
        /// Fats per 100g
        #[arg(long)]
        fats: Option<f64>,
        /// Carbs per 100g
        #[arg(long)]
        carbs: Option<f64>,
        /// Proteins per 100g
        #[arg(long)]
        proteins: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an ingredient; omitted fields keep their values
    Update {
        /// Ingredient ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New kcal per 100g
        #[arg(long)]
        kcal: Option<f64>,
        /// New fats per 100g
        #[arg(long)]
        fats: Option<f64>,
        /// New carbs per 100g
        #[arg(long)]
        carbs: Option<f64>,
        /// New proteins per 100g
        #[arg(long)]
        proteins: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an ingredient
    Delete {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight measurement
    Log {
        /// Weight value
        value: f64,
        /// Unit: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Measurement time (RFC 3339, "YYYY-MM-DD HH:MM" or "HH:MM"; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history
    History {
        /// Start date (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields; omitted fields keep their values
    Set {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// male or female
        #[arg(long)]
        gender: Option<String>,
        /// en_US, uk_UA, ru_UA or bg_BG
        #[arg(long)]
        language: Option<String>,
        /// sedentary, lightly_active, moderate, very_active or extra_active
        #[arg(long)]
        activity_level: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress towards the weight goal
    Goal {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kcal=debug,kcal_core=debug"
    } else {
        "kcal=warn,kcal_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

// Commands run on the main thread and block on the runtime for HTTP calls.
#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let config = Config::load()?;
    tracing::debug!(api_url = %config.api_url, session_dir = %config.session_dir.display(), "config loaded");
    let store = FileStore::open(&config.session_dir)?;
    let mut cache: Cache = IngredientCache::new(store);
    let api = ApiClient::new(&config.api_url, config.token, rt.handle().clone())?;

    match cli.command {
        Commands::Search { query, limit, json } => cmd_search(&mut cache, &api, &query, limit, json),
        Commands::Ingredients { command } => match command {
            IngredientCommands::Load { json } => cmd_ingredient_load(&mut cache, &api, json),
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&mut cache, &api, search.as_deref(), json)
            }
            IngredientCommands::Show { id, json } => cmd_ingredient_show(&cache, &api, id, json),
            IngredientCommands::Add {
                name,
                kcal,
                fats,
                carbs,
                proteins,
                json,
            } => {
                let new = NewIngredient {
                    name,
                    kcal_per_100g: kcal,
                    fats,
                    carbs,
                    proteins,
                };
                cmd_ingredient_add(&mut cache, &api, &new, json)
            }
            IngredientCommands::Update {
                id,
                name,
                kcal,
                fats,
                carbs,
                proteins,
                json,
            } => {
                let changes = IngredientChanges {
                    name,
                    kcal_per_100g: kcal,
                    fats,
                    carbs,
                    proteins,
                };
                cmd_ingredient_update(&mut cache, &api, id, changes, json)
            }
            IngredientCommands::Delete { id, json } => {
                cmd_ingredient_delete(&mut cache, &api, id, json)
            }
        },
        Commands::Logout => cmd_logout(&mut cache),
        Commands::Entries { range, json } => {
            let range = range.resolve()?;
            cmd_entries(&api, range, json)
        }
        Commands::Log {
            food,
            weight,
            manual,
            at,
            json,
        } => cmd_log(
            &mut cache,
            &api,
            &food,
            &weight,
            manual.into_source(),
            at.as_deref(),
            json,
        ),
        Commands::Update {
            id,
            food,
            weight,
            manual,
            at,
            json,
        } => cmd_update(
            &mut cache,
            &api,
            id,
            &food,
            &weight,
            manual.into_source(),
            at.as_deref(),
            json,
        ),
        Commands::Delete { id, json } => cmd_delete(&api, id, json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                at,
                json,
            } => cmd_weight_log(&api, value, &unit, at.as_deref(), json),
            WeightCommands::History { from, to, json } => {
                let from = from.map(|d| parse_date(Some(d))).transpose()?;
                let to = to.map(|d| parse_date(Some(d))).transpose()?;
                cmd_weight_history(&api, from, to, json)
            }
            WeightCommands::Delete { id, json } => cmd_weight_delete(&api, id, json),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&api, json),
            ProfileCommands::Set {
                first_name,
                last_name,
                email,
                age,
                height,
                gender,
                language,
                activity_level,
                json,
            } => {
                let changes = ProfileChanges {
                    first_name,
                    last_name,
                    email,
                    age,
                    height,
                    gender,
                    language,
                    activity_level,
                };
                cmd_profile_set(&api, changes, json)
            }
            ProfileCommands::Goal { json } => cmd_profile_goal(&api, json),
        },
        Commands::Metrics { json } => cmd_metrics(&api, json),
        Commands::Export { file, range } => {
            let range = range.resolve()?;
            cmd_export(&api, range, &file)
        }
    }
}
