use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog ingredient as served by `/api/ingredients`.
///
/// Nutrient fields are grams per 100g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    #[serde(rename = "kcalPer100g")]
    pub kcal_per_100g: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Request body for creating or updating an ingredient.
#[derive(Debug, Clone, Serialize)]
pub struct NewIngredient {
    pub name: String,
    #[serde(rename = "kcalPer100g")]
    pub kcal_per_100g: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
}

impl NewIngredient {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Ingredient name must not be empty");
        }
        validate_amount("kcalPer100g", self.kcal_per_100g)?;
        validate_macros(self.fats, self.carbs, self.proteins)
    }
}

/// A logged food entry as served by `/api/calories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub food: String,
    /// Grams consumed.
    pub weight: f64,
    #[serde(rename = "kcalPer100g")]
    pub kcal_per_100g: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
    pub calories: i64,
    pub meal_datetime: DateTime<Utc>,
}

impl Entry {
    /// Consumed amounts for this entry. Calories are taken as stored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn nutrients(&self) -> NutrientTotals {
        NutrientTotals {
            calories: self.calories as f64,
            fats: consumed(self.fats, self.weight),
            carbs: consumed(self.carbs, self.weight),
            proteins: consumed(self.proteins, self.weight),
        }
    }
}

/// Per-100g macro values carried alongside a food.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Macros {
    pub fats: Option<f64>,
    pub carbs: Option<f64>,
    pub proteins: Option<f64>,
}

impl From<&Ingredient> for Macros {
    fn from(i: &Ingredient) -> Self {
        Self {
            fats: i.fats,
            carbs: i.carbs,
            proteins: i.proteins,
        }
    }
}

/// Request body for `POST /api/calories` and `PUT /api/calories/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    pub food: String,
    pub calories: i64,
    pub weight: f64,
    #[serde(rename = "kcalPer100g")]
    pub kcal_per_100g: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
    pub meal_datetime: DateTime<Utc>,
}

impl NewEntry {
    #[must_use]
    pub fn new(
        food: String,
        weight: f64,
        kcal_per_100g: f64,
        macros: Macros,
        meal_datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            food,
            calories: calories_for(weight, kcal_per_100g),
            weight,
            kcal_per_100g,
            fats: macros.fats,
            carbs: macros.carbs,
            proteins: macros.proteins,
            meal_datetime,
        }
    }

    /// Check the request against what the backend accepts.
    pub fn validate(&self) -> Result<()> {
        if self.food.trim().is_empty() {
            bail!("Food name must not be empty");
        }
        if !self.weight.is_finite() || self.weight < 0.1 {
            bail!("Weight must be at least 0.1g (got {})", self.weight);
        }
        if !self.kcal_per_100g.is_finite() || self.kcal_per_100g < 0.1 {
            bail!(
                "kcal per 100g must be at least 0.1 (got {})",
                self.kcal_per_100g
            );
        }
        if self.calories < 1 {
            bail!(
                "Entry must have at least 1 kcal ({}g at {} kcal/100g rounds to {})",
                self.weight,
                self.kcal_per_100g,
                self.calories
            );
        }
        validate_macros(self.fats, self.carbs, self.proteins)
    }
}

/// Calories actually consumed: `round(weight * kcal_per_100g / 100)`.
#[must_use]
pub fn calories_for(weight_g: f64, kcal_per_100g: f64) -> i64 {
    (weight_g * kcal_per_100g / 100.0).round() as i64
}

/// Grams of a nutrient consumed, given its per-100g value. Missing counts as zero.
#[must_use]
pub fn consumed(per_100g: Option<f64>, weight_g: f64) -> f64 {
    per_100g.unwrap_or(0.0) * weight_g / 100.0
}

/// Summed calories and macros, in kcal and grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub fats: f64,
    pub carbs: f64,
    pub proteins: f64,
}

impl std::ops::Add for NutrientTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            fats: self.fats + rhs.fats,
            carbs: self.carbs + rhs.carbs,
            proteins: self.proteins + rhs.proteins,
        }
    }
}

// --- Weight tracking types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Kilograms.
    pub weight: f64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWeightEntry {
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewWeightEntry {
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            bail!("Weight must be greater than 0");
        }
        Ok(())
    }
}

fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{field} must be a non-negative number (got {value})");
    }
    Ok(())
}

fn validate_macros(fats: Option<f64>, carbs: Option<f64>, proteins: Option<f64>) -> Result<()> {
    for (field, value) in [("fats", fats), ("carbs", carbs), ("proteins", proteins)] {
        if let Some(v) = value {
            validate_amount(field, v)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_calories_for_rounds() {
        assert_eq!(calories_for(150.0, 389.0), 584); // 583.5
        assert_eq!(calories_for(100.0, 52.0), 52);
        assert_eq!(calories_for(33.0, 10.0), 3); // 3.3
        assert_eq!(calories_for(0.0, 500.0), 0);
    }

    #[test]
    fn test_new_entry_derives_calories() {
        let e = NewEntry::new(
            "Oats".to_string(),
            80.0,
            389.0,
            Macros::default(),
            noon(),
        );
        assert_eq!(e.calories, 311); // 311.2
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_new_entry_validation() {
        let mut e = NewEntry::new(
            "Apple".to_string(),
            100.0,
            52.0,
            Macros::default(),
            noon(),
        );
        assert!(e.validate().is_ok());

        e.food = "  ".to_string();
        assert!(e.validate().is_err());

        let tiny = NewEntry::new("Salt".to_string(), 0.5, 0.5, Macros::default(), noon());
        assert!(tiny.validate().is_err());

        let negative_fat = NewEntry::new(
            "Apple".to_string(),
            100.0,
            52.0,
            Macros {
                fats: Some(-1.0),
                ..Macros::default()
            },
            noon(),
        );
        assert!(negative_fat.validate().is_err());
    }

    #[test]
    fn test_entry_wire_format() {
        let json = r#"{
            "id": 7,
            "user_id": 1,
            "food": "Banana",
            "calories": 107,
            "weight": 120,
            "kcalPer100g": 89,
            "carbs": 22.8,
            "meal_datetime": "2024-06-15T08:30:00+02:00",
            "created_at": "2024-06-15T06:31:00Z"
        }"#;
        let e: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(e.id, Some(7));
        assert_eq!(e.calories, 107);
        assert_eq!(e.kcal_per_100g, 89.0);
        assert!(e.fats.is_none());
        assert_eq!(
            e.meal_datetime,
            Utc.with_ymd_and_hms(2024, 6, 15, 6, 30, 0).unwrap()
        );

        let new = NewEntry::new(
            e.food.clone(),
            e.weight,
            e.kcal_per_100g,
            Macros {
                fats: e.fats,
                carbs: e.carbs,
                proteins: e.proteins,
            },
            e.meal_datetime,
        );
        let body = serde_json::to_value(new).unwrap();
        assert_eq!(body["kcalPer100g"], 89.0);
        assert_eq!(body["calories"], 107);
        assert!(body.get("fats").is_none());
    }

    #[test]
    fn test_entry_nutrients() {
        let e = Entry {
            id: None,
            food: "Cheese".to_string(),
            weight: 50.0,
            kcal_per_100g: 400.0,
            fats: Some(30.0),
            carbs: None,
            proteins: Some(25.0),
            calories: 200,
            meal_datetime: noon(),
        };
        let n = e.nutrients();
        assert!((n.calories - 200.0).abs() < f64::EPSILON);
        assert!((n.fats - 15.0).abs() < f64::EPSILON);
        assert!((n.carbs - 0.0).abs() < f64::EPSILON);
        assert!((n.proteins - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_ingredient_validation() {
        let good = NewIngredient {
            name: "Rice".to_string(),
            kcal_per_100g: 130.0,
            fats: Some(0.3),
            carbs: Some(28.0),
            proteins: Some(2.7),
        };
        assert!(good.validate().is_ok());

        let mut blank = good.clone();
        blank.name = String::new();
        assert!(blank.validate().is_err());

        let mut nan = good;
        nan.kcal_per_100g = f64::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_new_weight_validation() {
        let ok = NewWeightEntry {
            weight: 72.4,
            recorded_at: None,
        };
        assert!(ok.validate().is_ok());
        let zero = NewWeightEntry {
            weight: 0.0,
            recorded_at: None,
        };
        assert!(zero.validate().is_err());
    }
}
