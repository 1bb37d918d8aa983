use anyhow::Result;
use chrono::Local;
use std::process;

use crate::client::ApiClient;
use kcal_core::profile::{GoalProgress, Profile, ProfileUpdate, goal_progress, latest_weight};

use super::helpers::no_neg_zero;

const BAR_WIDTH: usize = 20;

fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn cmd_profile_show(api: &ApiClient, json: bool) -> Result<()> {
    let profile = api.profile()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    let name = [profile.first_name.as_deref(), profile.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    println!("Name:      {}", if name.is_empty() { "-" } else { &name });
    println!("Email:     {}", profile.email);
    println!("Age:       {}", or_dash(profile.age));
    println!("Height:    {}", or_dash(profile.height.map(|h| format!("{h:.0} cm"))));
    println!("Weight:    {}", or_dash(profile.weight.map(|w| format!("{w:.1} kg"))));
    println!("Gender:    {}", or_dash(profile.gender.as_deref()));
    println!("Activity:  {}", or_dash(profile.activity_level.as_deref()));
    println!("Language:  {}", profile.language);
    if let Some(goal) = profile.goal() {
        let by = goal
            .target_date
            .map_or_else(String::new, |d| format!(" by {d}"));
        println!("Goal:      {:.1} kg{by}", goal.target_weight);
    }
    Ok(())
}

/// Optional per-field changes from `kcal profile set`.
#[derive(Debug, Default)]
pub(crate) struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub activity_level: Option<String>,
}

impl ProfileChanges {
    fn apply(self, current: &Profile) -> ProfileUpdate {
        let mut update = ProfileUpdate::from(current);
        if let Some(v) = self.email {
            update.email = v;
        }
        if let Some(v) = self.language {
            update.language = v;
        }
        update.first_name = self.first_name.or(update.first_name);
        update.last_name = self.last_name.or(update.last_name);
        update.age = self.age.or(update.age);
        update.height = self.height.or(update.height);
        update.gender = self.gender.or(update.gender);
        update.activity_level = self.activity_level.or(update.activity_level);
        update
    }
}

pub(crate) fn cmd_profile_set(api: &ApiClient, changes: ProfileChanges, json: bool) -> Result<()> {
    // The backend replaces the whole profile, so start from the current one.
    let current = api.profile()?;
    let update = changes.apply(&current);
    update.validate()?;
    let updated = api.update_profile(&update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!("Profile updated");
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn goal_lines(p: &GoalProgress) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Goal:     {:.1} kg -> {:.1} kg (started at {:.1} kg)",
            p.current_weight, p.target_weight, p.initial_weight
        ),
        format!(
            "Progress: {} {:.1}%",
            progress_bar(p.progress_percent),
            p.progress_percent
        ),
    ];
    let verb = if p.is_gaining { "Gained" } else { "Lost" };
    lines.push(format!(
        "{verb} {:.1} kg, {:.1} kg to go",
        no_neg_zero(p.weight_lost.abs()),
        no_neg_zero(p.weight_to_go.max(0.0))
    ));
    if let Some(days) = p.days_remaining {
        let mut line = format!("{days} days left");
        if let Some(kcal) = p.daily_deficit_needed {
            let kind = if p.is_gaining { "surplus" } else { "deficit" };
            line.push_str(&format!(", ~{kcal:.0} kcal/day {kind} needed"));
        }
        lines.push(line);
    } else if let Some(date) = p.estimated_completion {
        lines.push(format!("Estimated completion: {date}"));
    }
    lines
}

pub(crate) fn cmd_profile_goal(api: &ApiClient, json: bool) -> Result<()> {
    let profile = api.profile()?;
    let Some(goal) = profile.goal() else {
        eprintln!("No weight goal set");
        process::exit(2);
    };

    let history = api.weight_history(None, None)?;
    let Some(current) = latest_weight(&history).or(profile.weight) else {
        eprintln!("No weight readings yet. Use `kcal weight log` first.");
        process::exit(2);
    };

    let progress = goal_progress(&goal, current, Local::now().date_naive());
    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        for line in goal_lines(&progress) {
            println!("{line}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_metrics(api: &ApiClient, json: bool) -> Result<()> {
    let metrics = api.health_metrics()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    }
    if metrics.is_empty() {
        if !json {
            eprintln!("Not enough profile data. Set height, age and gender with `kcal profile set`.");
        }
        process::exit(2);
    }
    if json {
        return Ok(());
    }

    if let Some(bmi) = metrics.bmi {
        let category = metrics
            .bmi_category
            .as_deref()
            .map_or_else(String::new, |c| format!(" ({c})"));
        println!("BMI:   {bmi:.1}{category}");
    }
    if let Some(bmr) = metrics.bmr {
        println!("BMR:   {bmr:.0} kcal/day");
    }
    if let Some(tdee) = metrics.tdee {
        println!("TDEE:  {tdee:.0} kcal/day");
    }
    if let Some(status) = &metrics.health_status {
        println!("{status}");
    }
    Ok(())
}
