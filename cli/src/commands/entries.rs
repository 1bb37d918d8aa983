use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::process;

use crate::client::ApiClient;
use kcal_core::aggregate::{DateFilter, DateRange, DayGroup, day_groups};
use kcal_core::export::write_entries_csv;
use kcal_core::models::{Entry, Macros, NewEntry, NutrientTotals};

use super::helpers::{day_label, no_neg_zero, parse_datetime, parse_weight, truncate};
use super::{Cache, resolve_ingredient};

/// Resolve `--filter` / `--from` / `--to` into a date range, relative to local today.
pub(crate) fn resolve_range(
    filter: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange> {
    let today = Local::now().date_naive();
    let filter = match (from, to) {
        (Some(from), Some(to)) => DateFilter::Custom { from, to },
        (Some(from), None) => DateFilter::Custom { from, to: today },
        (None, Some(to)) => DateFilter::Custom { from: to, to },
        (None, None) => filter.map_or(Ok(DateFilter::Today), DateFilter::parse)?,
    };
    Ok(filter.range(today))
}

fn totals_line(t: &NutrientTotals) -> String {
    let cal = no_neg_zero(t.calories);
    let f = no_neg_zero(t.fats);
    let c = no_neg_zero(t.carbs);
    let p = no_neg_zero(t.proteins);
    format!("{cal:.0} kcal | F:{f:.1}g C:{c:.1}g P:{p:.1}g")
}

#[derive(Serialize)]
struct EntriesView<'a> {
    from: NaiveDate,
    to: NaiveDate,
    days: &'a [DayGroup],
    totals: NutrientTotals,
}

struct Rendered {
    stdout: String,
    found: bool,
}

fn render_entries(range: DateRange, days: &[DayGroup], json: bool) -> Result<Rendered> {
    let totals = days
        .iter()
        .fold(NutrientTotals::default(), |acc, d| acc + d.totals);
    let found = !days.is_empty();

    if json {
        let view = EntriesView {
            from: range.from,
            to: range.to,
            days,
            totals,
        };
        let stdout = serde_json::to_string_pretty(&view)?;
        return Ok(Rendered { stdout, found });
    }
    if !found {
        return Ok(Rendered {
            stdout: String::new(),
            found,
        });
    }

    let mut out = String::new();
    for day in days {
        let label = day_label(day.label);
        writeln!(out, "=== {label} ===\n")?;
        for e in &day.entries {
            let time = e.meal_datetime.with_timezone(&Local).format("%H:%M");
            let id = e.id.map_or_else(|| "-".to_string(), |id| id.to_string());
            let name = truncate(&e.food, 40);
            let weight = e.weight;
            let cal = e.calories;
            writeln!(out, "    [{id}] {time} {name} — {weight}g — {cal} kcal")?;
        }
        // A single day already shows its total at the bottom.
        if days.len() > 1 {
            writeln!(out, "\n  {}", totals_line(&day.totals))?;
        }
        writeln!(out)?;
    }
    write!(out, "  TOTAL: {}", totals_line(&totals))?;
    Ok(Rendered { stdout: out, found })
}

pub(crate) fn cmd_entries(api: &ApiClient, range: DateRange, json: bool) -> Result<()> {
    let entries = api.entries_in_local_range(range, &Local)?;
    let today = Local::now().date_naive();
    let days = day_groups(&entries, &Local, today);

    let rendered = render_entries(range, &days, json)?;
    if !rendered.stdout.is_empty() {
        println!("{}", rendered.stdout);
    }
    if !rendered.found {
        if !json {
            eprintln!("No entries between {} and {}", range.from, range.to);
        }
        process::exit(2);
    }
    Ok(())
}

/// How to obtain a food's per-100g values.
pub(crate) enum FoodSource {
    /// Look the name up in the ingredient catalog.
    Lookup,
    /// Use these values directly.
    Manual { kcal_per_100g: f64, macros: Macros },
}

fn build_entry(
    cache: &mut Cache,
    api: &ApiClient,
    food: &str,
    weight: &str,
    source: FoodSource,
    at: Option<&str>,
) -> Result<NewEntry> {
    let weight = parse_weight(weight)?;
    let meal_datetime = parse_datetime(at)?;

    let entry = match source {
        FoodSource::Lookup => {
            let ingredient = resolve_ingredient(cache, api, food)?;
            NewEntry::new(
                ingredient.name.clone(),
                weight,
                ingredient.kcal_per_100g,
                Macros::from(&ingredient),
                meal_datetime,
            )
        }
        FoodSource::Manual {
            kcal_per_100g,
            macros,
        } => NewEntry::new(
            food.trim().to_string(),
            weight,
            kcal_per_100g,
            macros,
            meal_datetime,
        ),
    };
    entry.validate()?;
    Ok(entry)
}

fn print_entry_result(verb: &str, entry: &Entry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        let id = entry.id.map_or_else(|| "?".to_string(), |id| id.to_string());
        let food = &entry.food;
        let weight = entry.weight;
        let cal = entry.calories;
        let when = entry
            .meal_datetime
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        println!("{verb} [{id}] {food} — {weight}g — {cal} kcal at {when}");
    }
    Ok(())
}

pub(crate) fn cmd_log(
    cache: &mut Cache,
    api: &ApiClient,
    food: &str,
    weight: &str,
    source: FoodSource,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let manual = matches!(source, FoodSource::Manual { .. });
    let new = build_entry(cache, api, food, weight, source, at)?;
    let created = api.create_entry(&new)?;

    // The backend may have added the food to the catalog.
    if manual {
        if let Err(e) = cache.load(api) {
            tracing::warn!(error = %e, "could not refresh ingredient cache after logging");
        }
    }

    print_entry_result("Logged", &created, json)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_update(
    cache: &mut Cache,
    api: &ApiClient,
    id: i64,
    food: &str,
    weight: &str,
    source: FoodSource,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let new = build_entry(cache, api, food, weight, source, at)?;
    let updated = api.update_entry(id, &new)?;
    print_entry_result("Updated", &updated, json)
}

pub(crate) fn cmd_delete(api: &ApiClient, id: i64, json: bool) -> Result<()> {
    api.delete_entry(id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted entry {id}");
    }
    Ok(())
}

pub(crate) fn cmd_export(api: &ApiClient, range: DateRange, path: &Path) -> Result<()> {
    let entries = api.entries_in_local_range(range, &Local)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let written = write_entries_csv(file, &entries, &Local)?;
    eprintln!(
        "Exported {written} entries ({} to {}) to {}",
        range.from,
        range.to,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_resolve_range_explicit_dates() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let range = resolve_range(Some("week"), Some(from), Some(to)).unwrap();
        assert_eq!(range, DateRange { from, to });

        let single = resolve_range(None, None, Some(to)).unwrap();
        assert_eq!(single, DateRange { from: to, to });
    }

    #[test]
    fn test_resolve_range_filters() {
        let today = Local::now().date_naive();
        let range = resolve_range(None, None, None).unwrap();
        assert_eq!(range, DateRange { from: today, to: today });

        let week = resolve_range(Some("week"), None, None).unwrap();
        assert_eq!(week.from, today - chrono::Duration::days(7));
        assert!(resolve_range(Some("decade"), None, None).is_err());
    }

    fn entry(id: i64, food: &str, calories: i64, weight: f64, fats: Option<f64>) -> Entry {
        Entry {
            id: Some(id),
            food: food.to_string(),
            weight,
            kcal_per_100g: 100.0,
            fats,
            carbs: None,
            proteins: None,
            calories,
            meal_datetime: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        }
    }

    fn day_range() -> DateRange {
        let d = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        DateRange { from: d, to: d }
    }

    #[test]
    fn test_render_entries_empty_is_not_found_in_both_modes() {
        let json = render_entries(day_range(), &[], true).unwrap();
        assert!(!json.found);
        let view: serde_json::Value = serde_json::from_str(&json.stdout).unwrap();
        assert_eq!(view["days"], serde_json::json!([]));
        assert_eq!(view["totals"]["calories"], 0.0);

        let text = render_entries(day_range(), &[], false).unwrap();
        assert!(!text.found);
        assert!(text.stdout.is_empty());
    }

    #[test]
    fn test_render_entries_totals() {
        let entries = vec![
            entry(1, "Oats", 200, 100.0, Some(10.0)),
            entry(2, "Milk", 150, 50.0, None),
        ];
        let days = day_groups(&entries, &Local, Local::now().date_naive());
        let text = render_entries(day_range(), &days, false).unwrap();
        assert!(text.found);
        assert!(text.stdout.contains("Oats"));
        assert!(text.stdout.ends_with("TOTAL: 350 kcal | F:10.0g C:0.0g P:0.0g"));

        let json = render_entries(day_range(), &days, true).unwrap();
        let view: serde_json::Value = serde_json::from_str(&json.stdout).unwrap();
        assert_eq!(view["totals"]["calories"], 350.0);
    }

    #[test]
    fn test_totals_line() {
        let t = NutrientTotals {
            calories: 350.0,
            fats: 10.0,
            carbs: 10.04,
            proteins: -0.0,
        };
        assert_eq!(totals_line(&t), "350 kcal | F:10.0g C:10.0g P:0.0g");
    }
}
