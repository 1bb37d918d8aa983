//! User profile, server-computed health metrics and weight-goal progress.

use anyhow::{Result, bail};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::WeightEntry;

/// Energy in one kilogram of body weight.
pub const KCAL_PER_KG: f64 = 7700.0;
/// Pace used to estimate a completion date when no target date is set.
pub const SAFE_WEEKLY_LOSS_KG: f64 = 0.5;

pub const LANGUAGES: [&str; 4] = ["en_US", "uk_UA", "ru_UA", "bg_BG"];
pub const GENDERS: [&str; 2] = ["male", "female"];
pub const ACTIVITY_LEVELS: [&str; 5] = [
    "sedentary",
    "lightly_active",
    "moderate",
    "very_active",
    "extra_active",
];

/// The profile served by `GET /api/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub age: Option<u32>,
    /// Centimetres.
    #[serde(default)]
    pub height: Option<f64>,
    /// Latest known weight in kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    pub language: String,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub target_weight: Option<f64>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub goal_set_at: Option<String>,
    #[serde(default)]
    pub initial_weight_at_goal: Option<f64>,
}

impl Profile {
    /// The weight goal, if one has been set.
    #[must_use]
    pub fn goal(&self) -> Option<WeightGoal> {
        Some(WeightGoal {
            target_weight: self.target_weight?,
            target_date: self.target_date,
            initial_weight: self.initial_weight_at_goal?,
        })
    }
}

/// Body of `PUT /api/profile`. Weight is tracked separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub age: Option<u32>,
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub language: String,
    pub activity_level: Option<String>,
}

impl From<&Profile> for ProfileUpdate {
    fn from(p: &Profile) -> Self {
        Self {
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email: p.email.clone(),
            age: p.age,
            height: p.height,
            gender: p.gender.clone(),
            language: p.language.clone(),
            activity_level: p.activity_level.clone(),
        }
    }
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            bail!("A valid email is required");
        }
        if let Some(age) = self.age {
            if !(1..=150).contains(&age) {
                bail!("Age must be between 1 and 150 (got {age})");
            }
        }
        if let Some(height) = self.height {
            if !(50.0..=300.0).contains(&height) {
                bail!("Height must be between 50 and 300 cm (got {height})");
            }
        }
        one_of("gender", self.gender.as_deref(), &GENDERS)?;
        one_of("language", Some(self.language.as_str()), &LANGUAGES)?;
        one_of("activity level", self.activity_level.as_deref(), &ACTIVITY_LEVELS)?;
        Ok(())
    }
}

fn one_of(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<()> {
    match value {
        Some(v) if !allowed.contains(&v) => {
            bail!("Invalid {field} '{v}'. Use one of: {}", allowed.join(", "))
        }
        _ => Ok(()),
    }
}

/// Served by `GET /api/metrics`; every field is absent until the profile has
/// enough data for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
}

impl HealthMetrics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightGoal {
    pub target_weight: f64,
    pub target_date: Option<NaiveDate>,
    /// Weight when the goal was set.
    pub initial_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub target_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    pub initial_weight: f64,
    pub current_weight: f64,
    /// 0 to 100, one decimal.
    pub progress_percent: f64,
    pub weight_to_go: f64,
    /// Negative when weight was gained.
    pub weight_lost: f64,
    pub is_gaining: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_deficit_needed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<NaiveDate>,
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

/// Progress towards `goal` at `current_weight`, as of `today`.
///
/// With a target date this reports the days left and the daily energy
/// deficit (or surplus) needed; without one it estimates a completion date
/// at [`SAFE_WEEKLY_LOSS_KG`] per week.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn goal_progress(goal: &WeightGoal, current_weight: f64, today: NaiveDate) -> GoalProgress {
    let initial = goal.initial_weight;
    let target = goal.target_weight;
    let is_gaining = target > initial;

    let (total, done, weight_to_go) = if is_gaining {
        (target - initial, current_weight - initial, target - current_weight)
    } else {
        (initial - target, initial - current_weight, current_weight - target)
    };
    let weight_lost = if is_gaining { -done } else { done };
    let progress = if total > 0.0 { done / total * 100.0 } else { 0.0 };

    let mut days_remaining = None;
    let mut daily_deficit_needed = None;
    let mut estimated_completion = None;

    match goal.target_date {
        Some(date) => {
            let days = (date - today).num_days().max(0);
            days_remaining = Some(days);
            if days > 0 && weight_to_go > 0.0 {
                daily_deficit_needed = Some((weight_to_go * KCAL_PER_KG / days as f64).round());
            }
        }
        None if weight_to_go > 0.0 => {
            let days = (weight_to_go / SAFE_WEEKLY_LOSS_KG * 7.0).ceil() as i64;
            estimated_completion = Some(today + Duration::days(days));
        }
        None => {}
    }

    GoalProgress {
        target_weight: target,
        target_date: goal.target_date,
        initial_weight: initial,
        current_weight,
        progress_percent: round_to(progress.clamp(0.0, 100.0), 1),
        weight_to_go: round_to(weight_to_go, 2),
        weight_lost: round_to(weight_lost, 2),
        is_gaining,
        days_remaining,
        daily_deficit_needed,
        estimated_completion,
    }
}

/// The most recent reading in `history`.
#[must_use]
pub fn latest_weight(history: &[WeightEntry]) -> Option<f64> {
    history
        .iter()
        .max_by_key(|e| (e.recorded_at, e.id))
        .map(|e| e.weight)
}
