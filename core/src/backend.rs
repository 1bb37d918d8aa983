//! Response parsing for the calorie backend.
//!
//! Payloads are validated here and nowhere else. Lists that are not JSON
//! arrays become empty; individual elements that do not fit the model are
//! dropped with a warning so one bad row cannot hide the rest.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{Entry, Ingredient, WeightEntry};
use crate::profile::{HealthMetrics, Profile};

#[derive(Debug, Deserialize)]
struct IngredientData {
    id: Option<i64>,
    name: Option<String>,
    #[serde(rename = "kcalPer100g")]
    kcal_per_100g: Option<f64>,
    proteins: Option<f64>,
    carbs: Option<f64>,
    fats: Option<f64>,
    user_id: Option<i64>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntryData {
    id: Option<i64>,
    food: Option<String>,
    weight: Option<f64>,
    #[serde(rename = "kcalPer100g")]
    kcal_per_100g: Option<f64>,
    fats: Option<f64>,
    carbs: Option<f64>,
    proteins: Option<f64>,
    calories: Option<f64>,
    meal_datetime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeightData {
    id: Option<i64>,
    user_id: Option<i64>,
    weight: Option<f64>,
    recorded_at: Option<String>,
    created_at: Option<String>,
}

fn amount(v: Option<f64>) -> Option<Option<f64>> {
    match v {
        None => Some(None),
        Some(x) if x.is_finite() && x >= 0.0 => Some(Some(x)),
        Some(_) => None,
    }
}

fn required_amount(v: Option<f64>) -> Option<f64> {
    amount(v).flatten()
}

fn timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn ingredient_from_data(d: IngredientData) -> Option<Ingredient> {
    let name = d.name.filter(|n| !n.trim().is_empty())?;
    Some(Ingredient {
        id: d.id?,
        name,
        kcal_per_100g: required_amount(d.kcal_per_100g)?,
        proteins: amount(d.proteins)?,
        carbs: amount(d.carbs)?,
        fats: amount(d.fats)?,
        user_id: d.user_id,
        created_at: d.created_at,
        updated_at: d.updated_at,
    })
}

fn entry_from_data(d: EntryData) -> Option<Entry> {
    let food = d.food.filter(|f| !f.trim().is_empty())?;
    let calories = d.calories.filter(|c| c.is_finite())?;
    Some(Entry {
        id: d.id,
        food,
        weight: required_amount(d.weight)?,
        kcal_per_100g: required_amount(d.kcal_per_100g)?,
        fats: amount(d.fats)?,
        carbs: amount(d.carbs)?,
        proteins: amount(d.proteins)?,
        calories: calories.round() as i64,
        meal_datetime: timestamp(d.meal_datetime.as_deref())?,
    })
}

fn weight_from_data(d: WeightData) -> Option<WeightEntry> {
    Some(WeightEntry {
        id: d.id?,
        user_id: d.user_id,
        weight: required_amount(d.weight).filter(|w| *w > 0.0)?,
        recorded_at: timestamp(d.recorded_at.as_deref())?,
        created_at: d.created_at,
    })
}

/// Decode a JSON list, keeping only elements that convert cleanly.
fn parse_list<D, T>(body: &[u8], what: &str, convert: fn(D) -> Option<T>) -> Result<Vec<T>>
where
    D: DeserializeOwned,
{
    let value: Value = serde_json::from_slice(body)
        .with_context(|| format!("Failed to parse {what} response"))?;

    let Value::Array(items) = value else {
        tracing::warn!(kind = what, "response is not a JSON array, treating as empty");
        return Ok(Vec::new());
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<D>(item).ok().and_then(convert))
        .collect();

    if parsed.len() < total {
        tracing::warn!(
            kind = what,
            dropped = total - parsed.len(),
            "skipped malformed elements"
        );
    }
    Ok(parsed)
}

pub fn parse_ingredient_list(body: &[u8]) -> Result<Vec<Ingredient>> {
    parse_list(body, "ingredients", ingredient_from_data)
}

pub fn parse_ingredient(body: &[u8]) -> Result<Ingredient> {
    let data: IngredientData =
        serde_json::from_slice(body).context("Failed to parse ingredient response")?;
    ingredient_from_data(data).context("Ingredient response is missing required fields")
}

pub fn parse_entry_list(body: &[u8]) -> Result<Vec<Entry>> {
    parse_list(body, "calorie entries", entry_from_data)
}

pub fn parse_entry(body: &[u8]) -> Result<Entry> {
    let data: EntryData =
        serde_json::from_slice(body).context("Failed to parse calorie entry response")?;
    entry_from_data(data).context("Calorie entry response is missing required fields")
}

pub fn parse_weight_list(body: &[u8]) -> Result<Vec<WeightEntry>> {
    parse_list(body, "weight history", weight_from_data)
}

pub fn parse_weight(body: &[u8]) -> Result<WeightEntry> {
    let data: WeightData =
        serde_json::from_slice(body).context("Failed to parse weight response")?;
    weight_from_data(data).context("Weight response is missing required fields")
}

/// A date written either as `YYYY-MM-DD` or as a full RFC 3339 timestamp.
fn calendar_date(s: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub fn parse_profile(body: &[u8]) -> Result<Profile> {
    let mut value: Value =
        serde_json::from_slice(body).context("Failed to parse profile response")?;
    if let Some(date) = value.get_mut("target_date") {
        *date = match date.as_str().and_then(calendar_date) {
            Some(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            None => Value::Null,
        };
    }
    serde_json::from_value(value).context("Profile response is missing required fields")
}

pub fn parse_metrics(body: &[u8]) -> Result<HealthMetrics> {
    serde_json::from_slice(body).context("Failed to parse health metrics response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_ingredient_list_complete() {
        let body = br#"[
            {"id": 1, "name": "Oats", "kcalPer100g": 389, "proteins": 16.9, "carbs": 66.3, "fats": 6.9, "user_id": 3},
            {"id": 2, "name": "Apple", "kcalPer100g": 52}
        ]"#;
        let list = parse_ingredient_list(body).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Oats");
        assert_eq!(list[0].proteins, Some(16.9));
        assert_eq!(list[0].user_id, Some(3));
        assert_eq!(list[1].kcal_per_100g, 52.0);
        assert!(list[1].fats.is_none());
    }

    #[test]
    fn test_parse_ingredient_list_not_array() {
        assert!(parse_ingredient_list(b"null").unwrap().is_empty());
        assert!(parse_ingredient_list(br#"{"error": "nope"}"#).unwrap().is_empty());
        assert!(parse_ingredient_list(b"42").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ingredient_list_invalid_json() {
        assert!(parse_ingredient_list(b"<html>").is_err());
        assert!(parse_ingredient_list(b"").is_err());
    }

    #[test]
    fn test_parse_ingredient_list_drops_malformed() {
        let body = br#"[
            {"id": 1, "name": "Good", "kcalPer100g": 100},
            {"id": 2, "name": "", "kcalPer100g": 100},
            {"name": "No id", "kcalPer100g": 100},
            {"id": 4, "name": "No kcal"},
            {"id": 5, "name": "Negative fat", "kcalPer100g": 100, "fats": -3},
            {"id": 6, "name": 12, "kcalPer100g": 100},
            "just a string",
            null
        ]"#;
        let list = parse_ingredient_list(body).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, 1);
    }

    #[test]
    fn test_parse_ingredient_single() {
        let i = parse_ingredient(br#"{"id": 9, "name": "Tofu", "kcalPer100g": 76}"#).unwrap();
        assert_eq!(i.id, 9);
        assert!(parse_ingredient(br#"{"id": 9}"#).is_err());
    }

    #[test]
    fn test_parse_entry_list() {
        let body = br#"[
            {"id": 1, "food": "Rice", "calories": 195, "weight": 150, "kcalPer100g": 130,
             "carbs": 28, "meal_datetime": "2024-01-01T23:00:00+01:00"},
            {"id": 2, "food": "Bad time", "calories": 10, "weight": 10, "kcalPer100g": 100,
             "meal_datetime": "yesterday"},
            {"id": 3, "food": "No time", "calories": 10, "weight": 10, "kcalPer100g": 100}
        ]"#;
        let entries = parse_entry_list(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].calories, 195);
        assert_eq!(entries[0].carbs, Some(28.0));
        assert_eq!(
            entries[0].meal_datetime,
            Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_weight_list() {
        let body = br#"[
            {"id": 1, "user_id": 1, "weight": 81.2, "recorded_at": "2024-03-01T07:00:00Z", "created_at": "2024-03-01T07:00:05Z"},
            {"id": 2, "weight": 0, "recorded_at": "2024-03-02T07:00:00Z"}
        ]"#;
        let list = parse_weight_list(body).unwrap();
        assert_eq!(list.len(), 1);
        assert!((list[0].weight - 81.2).abs() < f64::EPSILON);
        assert!(parse_weight_list(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_profile_with_goal() {
        let body = br#"{
            "id": 3, "first_name": "Olena", "last_name": null,
            "email": "olena@example.com", "age": 34, "height": 168,
            "weight": 71.4, "gender": "female", "language": "uk_UA",
            "activity_level": "moderate", "target_weight": 65,
            "target_date": "2024-09-01T00:00:00Z",
            "goal_set_at": "2024-05-01T09:12:00Z", "initial_weight_at_goal": 73.0
        }"#;
        let profile = parse_profile(body).unwrap();
        assert_eq!(profile.email, "olena@example.com");
        assert_eq!(profile.age, Some(34));
        assert_eq!(
            profile.target_date,
            Some(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
        );
        let goal = profile.goal().unwrap();
        assert!((goal.initial_weight - 73.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_profile_minimal_and_invalid() {
        let profile =
            parse_profile(br#"{"email": "a@b.c", "language": "en_US", "target_date": "soon"}"#)
                .unwrap();
        assert!(profile.target_date.is_none());
        assert!(profile.goal().is_none());

        assert!(parse_profile(br#"{"language": "en_US"}"#).is_err());
        assert!(parse_profile(b"<html>").is_err());
    }

    #[test]
    fn test_parse_metrics() {
        let m = parse_metrics(br#"{"bmi": 25.3, "bmi_category": "overweight", "bmr": 1480.5}"#)
            .unwrap();
        assert_eq!(m.bmi, Some(25.3));
        assert_eq!(m.bmi_category.as_deref(), Some("overweight"));
        assert!(m.tdee.is_none());
        assert!(parse_metrics(b"{}").unwrap().is_empty());
    }
}
