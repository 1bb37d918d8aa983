use anyhow::Result;
use std::process;

use crate::client::ApiClient;
use kcal_core::ingredient_cache::{IngredientProvider, require_found};
use kcal_core::models::{Ingredient, NewIngredient};

use super::helpers::print_ingredient_table;
use super::{Cache, ensure_loaded};

fn print_ingredients_or_exit(list: &[Ingredient], json: bool, empty_msg: &str) -> Result<()> {
    if list.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("{empty_msg}");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(list)?);
    } else {
        print_ingredient_table(list);
    }
    Ok(())
}

pub(crate) fn cmd_search(
    cache: &mut Cache,
    api: &ApiClient,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    ensure_loaded(cache, api);
    let hits = cache.search(api, query, limit);
    print_ingredients_or_exit(&hits, json, &format!("No results found for '{query}'"))
}

pub(crate) fn cmd_ingredient_load(cache: &mut Cache, api: &ApiClient, json: bool) -> Result<()> {
    let list = cache.load(api)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        let count = list.len();
        println!("Cached {count} ingredients for this session");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    cache: &mut Cache,
    api: &ApiClient,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    ensure_loaded(cache, api);
    let list = match search {
        Some(q) => cache.search_local(q, usize::MAX),
        None => {
            let mut all = cache.snapshot().to_vec();
            all.sort_by_key(|i| i.name.to_lowercase());
            all
        }
    };
    print_ingredients_or_exit(&list, json, "No ingredients found")
}

pub(crate) fn cmd_ingredient_show(cache: &Cache, api: &ApiClient, id: i64, json: bool) -> Result<()> {
    let ingredient = require_found(cache.get_by_id(api, id)?, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        print_ingredient_table(std::slice::from_ref(&ingredient));
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_add(
    cache: &mut Cache,
    api: &ApiClient,
    new: &NewIngredient,
    json: bool,
) -> Result<()> {
    let created = cache.create(api, new)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        let name = &created.name;
        let id = created.id;
        println!("Added ingredient: {name} (id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_update(
    cache: &mut Cache,
    api: &ApiClient,
    id: i64,
    changes: IngredientChanges,
    json: bool,
) -> Result<()> {
    // Unspecified fields keep their current values.
    let current = require_found(api.get(id)?, id)?;
    let new = changes.apply(&current);
    let updated = cache.update(api, id, &new)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let name = &updated.name;
        println!("Updated ingredient {id}: {name}");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_delete(
    cache: &mut Cache,
    api: &ApiClient,
    id: i64,
    json: bool,
) -> Result<()> {
    cache.delete(api, id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted ingredient {id}");
    }
    Ok(())
}

pub(crate) fn cmd_logout(cache: &mut Cache) -> Result<()> {
    cache.invalidate()?;
    eprintln!("Cleared session ingredient cache");
    Ok(())
}

/// Optional per-field changes from `kcal ingredients update`.
#[derive(Debug, Default)]
pub(crate) struct IngredientChanges {
    pub name: Option<String>,
    pub kcal_per_100g: Option<f64>,
    pub fats: Option<f64>,
    pub carbs: Option<f64>,
    pub proteins: Option<f64>,
}

impl IngredientChanges {
    fn apply(self, current: &Ingredient) -> NewIngredient {
        NewIngredient {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            kcal_per_100g: self.kcal_per_100g.unwrap_or(current.kcal_per_100g),
            fats: self.fats.or(current.fats),
            carbs: self.carbs.or(current.carbs),
            proteins: self.proteins.or(current.proteins),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingredient_changes_keep_unspecified_fields() {
        let current = Ingredient {
            id: 4,
            name: "Rice".to_string(),
            kcal_per_100g: 130.0,
            proteins: Some(2.7),
            carbs: Some(28.0),
            fats: None,
            user_id: None,
            created_at: None,
            updated_at: None,
        };
        let new = IngredientChanges {
            kcal_per_100g: Some(128.0),
            fats: Some(0.3),
            ..IngredientChanges::default()
        }
        .apply(&current);
        assert_eq!(new.name, "Rice");
        assert!((new.kcal_per_100g - 128.0).abs() < f64::EPSILON);
        assert_eq!(new.fats, Some(0.3));
        assert_eq!(new.carbs, Some(28.0));
        assert_eq!(new.proteins, Some(2.7));
    }
}
