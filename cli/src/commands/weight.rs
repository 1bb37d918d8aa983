use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crate::client::ApiClient;
use kcal_core::models::{NewWeightEntry, WeightEntry};

use super::helpers::{no_neg_zero, parse_datetime};

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

fn to_kg(value: f64, unit: &str) -> Result<f64> {
    if value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            Ok(kg)
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

pub(crate) fn cmd_weight_log(
    api: &ApiClient,
    value: f64,
    unit: &str,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let entry = NewWeightEntry {
        weight: to_kg(value, unit)?,
        recorded_at: at.map(|s| parse_datetime(Some(s))).transpose()?,
    };
    entry.validate()?;

    let result = api.create_weight(&entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let lbs = result.weight * LBS_PER_KG;
        println!(
            "Logged {:.1} kg ({:.1} lbs) at {}",
            result.weight,
            lbs,
            result
                .recorded_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

/// Change between consecutive readings, oldest first.
fn with_deltas(entries: &[WeightEntry]) -> Vec<(&WeightEntry, Option<f64>)> {
    let mut sorted: Vec<&WeightEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (e.recorded_at, e.id));
    let mut prev: Option<f64> = None;
    sorted
        .into_iter()
        .map(|e| {
            let delta = prev.map(|p| e.weight - p);
            prev = Some(e.weight);
            (e, delta)
        })
        .collect()
}

pub(crate) fn cmd_weight_history(
    api: &ApiClient,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let entries = api.weight_history(from, to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `kcal weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
            #[tabled(rename = "Change")]
            change: String,
        }

        let rows: Vec<WeightRow> = with_deltas(&entries)
            .into_iter()
            .map(|(e, delta)| WeightRow {
                id: e.id,
                date: e
                    .recorded_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d")
                    .to_string(),
                kg: format!("{:.1}", e.weight),
                lbs: format!("{:.1}", e.weight * LBS_PER_KG),
                change: delta.map_or_else(String::new, |d| format!("{:+.1}", no_neg_zero(d))),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_delete(api: &ApiClient, id: i64, json: bool) -> Result<()> {
    api.delete_weight(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}
