mod entries;
mod helpers;
mod ingredients;
mod profile;
mod weight;

use anyhow::{Result, bail};

use crate::client::ApiClient;
use kcal_core::ingredient_cache::{DEFAULT_SEARCH_LIMIT, IngredientCache};
use kcal_core::models::Ingredient;
use kcal_core::session::FileStore;

use helpers::{print_ingredient_table, prompt_choice};

pub(crate) use entries::{
    FoodSource, cmd_delete, cmd_entries, cmd_export, cmd_log, cmd_update, resolve_range,
};
pub(crate) use helpers::parse_date;
pub(crate) use ingredients::{
    IngredientChanges, cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list,
    cmd_ingredient_load, cmd_ingredient_show, cmd_ingredient_update, cmd_logout, cmd_search,
};
pub(crate) use profile::{
    ProfileChanges, cmd_metrics, cmd_profile_goal, cmd_profile_set, cmd_profile_show,
};
pub(crate) use weight::{cmd_weight_delete, cmd_weight_history, cmd_weight_log};

pub(crate) type Cache = IngredientCache<FileStore>;

/// Load the catalog once per session, before the first search.
///
/// A failed load is not fatal: search still falls back to the backend.
pub(super) fn ensure_loaded(cache: &mut Cache, api: &ApiClient) {
    if cache.has_cache() {
        return;
    }
    if let Err(e) = cache.load(api) {
        tracing::warn!(error = %e, "ingredient preload failed, continuing without cache");
    }
}

/// Resolve a food name to an ingredient via the cache, prompting when ambiguous.
pub(super) fn resolve_ingredient(cache: &mut Cache, api: &ApiClient, query: &str) -> Result<Ingredient> {
    ensure_loaded(cache, api);
    let mut hits = cache.search(api, query, DEFAULT_SEARCH_LIMIT);

    if let Some(exact) = exact_match(&hits, query) {
        return Ok(hits.swap_remove(exact));
    }
    match hits.len() {
        0 => bail!("No ingredient found for '{query}'. Pass --kcal to log it directly"),
        1 => Ok(hits.remove(0)),
        n => {
            print_ingredient_table(&hits);
            let idx = prompt_choice(n)?;
            Ok(hits.swap_remove(idx))
        }
    }
}

/// Index of the hit whose name equals `query`, ignoring case in any script.
fn exact_match(hits: &[Ingredient], query: &str) -> Option<usize> {
    let needle = query.trim().to_lowercase();
    hits.iter().position(|i| i.name.to_lowercase() == needle)
}
