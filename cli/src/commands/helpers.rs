use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use kcal_core::aggregate::RelativeDay;
use kcal_core::calculator;
use kcal_core::models::Ingredient;

/// Parse a weight in grams: "200", "200g", or arithmetic such as "2*45+12".
pub(crate) fn parse_weight(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    let value = if calculator::is_expression(trimmed) {
        let v = calculator::evaluate(trimmed)
            .with_context(|| format!("Invalid weight expression: '{s}'"))?;
        eprintln!("{trimmed} = {}g", calculator::format_result(v));
        v
    } else {
        trimmed.parse().with_context(|| {
            format!("Invalid weight: '{s}'. Use a number like '200', '200g' or '2*100'")
        })?
    };
    if !value.is_finite() || value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse a meal time: RFC 3339, local "YYYY-MM-DD HH:MM", or local "HH:MM" today.
/// `None` means now.
pub(crate) fn parse_datetime(s: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(s) = s.map(str::trim) else {
        return Ok(Utc::now());
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        ndt
    } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M") {
        Local::now().date_naive().and_time(t)
    } else {
        bail!("Invalid time '{s}'. Use RFC 3339, 'YYYY-MM-DD HH:MM' or 'HH:MM'");
    };
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("'{s}' does not exist in the local timezone"))?;
    Ok(local.with_timezone(&Utc))
}

pub(crate) fn day_label(label: RelativeDay) -> String {
    match label {
        RelativeDay::Today => "Today".to_string(),
        RelativeDay::Yesterday => "Yesterday".to_string(),
        RelativeDay::Date(d) => d.format("%a %Y-%m-%d").to_string(),
    }
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect an ingredient (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn print_ingredient_table(ingredients: &[Ingredient]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kcal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fat: String,
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .enumerate()
        .map(|(i, ing)| IngredientRow {
            idx: i + 1,
            id: ing.id,
            name: truncate(&ing.name, 40),
            calories: {
                let cal = ing.kcal_per_100g;
                format!("{cal:.0}")
            },
            protein: ing.proteins.map_or("-".into(), |v| format!("{v:.1}")),
            carbs: ing.carbs.map_or("-".into(), |v| format!("{v:.1}")),
            fat: ing.fats.map_or("-".into(), |v| format!("{v:.1}")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
