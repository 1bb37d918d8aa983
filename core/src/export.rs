use std::io::Write;

use anyhow::{Context, Result};
use chrono::TimeZone;

use crate::models::{Entry, consumed};

const HEADER: [&str; 9] = [
    "Date",
    "Time",
    "Food",
    "Weight (g)",
    "Kcal/100g",
    "Calories",
    "Fats (g)",
    "Carbs (g)",
    "Proteins (g)",
];

/// Write `entries` as CSV, oldest first, with dates and times in `tz`.
///
/// Macro columns hold consumed grams, not per-100g values.
pub fn write_entries_csv<W: Write, Tz: TimeZone>(
    writer: W,
    entries: &[Entry],
    tz: &Tz,
) -> Result<usize>
where
    Tz::Offset: std::fmt::Display,
{
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)
        .context("Failed to write CSV header")?;

    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        a.meal_datetime
            .cmp(&b.meal_datetime)
            .then_with(|| a.id.cmp(&b.id))
    });

    for e in &sorted {
        let local = e.meal_datetime.with_timezone(tz);
        wtr.write_record([
            local.format("%Y-%m-%d").to_string(),
            local.format("%H:%M").to_string(),
            e.food.clone(),
            format!("{}", e.weight),
            format!("{}", e.kcal_per_100g),
            e.calories.to_string(),
            format!("{:.1}", consumed(e.fats, e.weight)),
            format!("{:.1}", consumed(e.carbs, e.weight)),
            format!("{:.1}", consumed(e.proteins, e.weight)),
        ])
        .with_context(|| format!("Failed to write CSV row for '{}'", e.food))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(sorted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn entry(id: i64, food: &str, when: &str) -> Entry {
        Entry {
            id: Some(id),
            food: food.to_string(),
            weight: 150.0,
            kcal_per_100g: 130.0,
            fats: Some(0.4),
            carbs: Some(28.0),
            proteins: None,
            calories: 195,
            meal_datetime: DateTime::parse_from_rfc3339(when)
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_write_entries_csv() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let entries = vec![
            entry(2, "Rice, boiled", "2024-01-02T11:30:00Z"),
            entry(1, "Rice", "2024-01-01T22:15:00Z"),
        ];
        let mut out = Vec::new();
        let written = write_entries_csv(&mut out, &entries, &tz).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Time,Food,Weight (g),Kcal/100g,Calories,Fats (g),Carbs (g),Proteins (g)"
        );
        assert_eq!(lines[1], "2024-01-02,00:15,Rice,150,130,195,0.6,42.0,0.0");
        assert_eq!(
            lines[2],
            "2024-01-02,13:30,\"Rice, boiled\",150,130,195,0.6,42.0,0.0"
        );
    }

    #[test]
    fn test_write_entries_csv_empty() {
        let mut out = Vec::new();
        let written = write_entries_csv(&mut out, &[], &Utc).unwrap();
        assert_eq!(written, 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
