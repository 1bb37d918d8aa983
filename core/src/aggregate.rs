//! Date-bucketed views over logged entries.
//!
//! Every function here takes the viewer's timezone and "today" as explicit
//! arguments, so results never depend on the machine's clock or locale.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::{Duration, NaiveDate, TimeZone};
use serde::Serialize;

use crate::models::{Entry, NutrientTotals};

/// Entries bucketed by local calendar date.
pub type DayBuckets = BTreeMap<NaiveDate, Vec<Entry>>;

/// Where a day sits relative to the viewer's today. Callers localize the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeDay {
    Today,
    Yesterday,
    Date(NaiveDate),
}

/// Local calendar date of an entry in `tz`.
pub fn local_date<Tz: TimeZone>(entry: &Entry, tz: &Tz) -> NaiveDate {
    entry.meal_datetime.with_timezone(tz).date_naive()
}

/// Bucket entries by local calendar date; each bucket ordered by time ascending.
///
/// Ties on timestamp are broken by id, then food name, so output does not
/// depend on input order.
pub fn group_by_local_date<Tz: TimeZone>(entries: &[Entry], tz: &Tz) -> DayBuckets {
    let mut groups: DayBuckets = BTreeMap::new();
    for entry in entries {
        groups
            .entry(local_date(entry, tz))
            .or_default()
            .push(entry.clone());
    }
    for bucket in groups.values_mut() {
        bucket.sort_by(|a, b| {
            a.meal_datetime
                .cmp(&b.meal_datetime)
                .then_with(|| a.id.cmp(&b.id))
                .then_with(|| a.food.cmp(&b.food))
        });
    }
    groups
}

/// Bucket keys, most recent day first.
#[must_use]
pub fn ordered_date_keys(groups: &DayBuckets) -> Vec<NaiveDate> {
    groups.keys().rev().copied().collect()
}

/// Sum calories as stored and macros as `per_100g * weight / 100`.
#[must_use]
pub fn daily_totals(entries: &[Entry]) -> NutrientTotals {
    entries
        .iter()
        .map(Entry::nutrients)
        .fold(NutrientTotals::default(), |acc, n| acc + n)
}

#[must_use]
pub fn relative_date_label(date: NaiveDate, today: NaiveDate) -> RelativeDay {
    if date == today {
        RelativeDay::Today
    } else if Some(date) == today.pred_opt() {
        RelativeDay::Yesterday
    } else {
        RelativeDay::Date(date)
    }
}

/// One rendered day of the entry list.
#[derive(Debug, Clone, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: RelativeDay,
    pub entries: Vec<Entry>,
    pub totals: NutrientTotals,
}

/// Group, order, label and total `entries` for display.
pub fn day_groups<Tz: TimeZone>(entries: &[Entry], tz: &Tz, today: NaiveDate) -> Vec<DayGroup> {
    let mut groups = group_by_local_date(entries, tz);
    ordered_date_keys(&groups)
        .into_iter()
        .filter_map(|date| {
            let entries = groups.remove(&date)?;
            Some(DayGroup {
                date,
                label: relative_date_label(date, today),
                totals: daily_totals(&entries),
                entries,
            })
        })
        .collect()
}

// --- Date-range filters ---

/// Inclusive range of local calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Yesterday,
    LastWeek,
    LastMonth,
    Custom { from: NaiveDate, to: NaiveDate },
}

impl DateFilter {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "week" | "last-week" | "lastweek" => Ok(Self::LastWeek),
            "month" | "last-month" | "lastmonth" => Ok(Self::LastMonth),
            _ => bail!("Invalid filter '{s}'. Use today, yesterday, week, or month"),
        }
    }

    #[must_use]
    pub fn range(&self, today: NaiveDate) -> DateRange {
        match *self {
            Self::Today => DateRange {
                from: today,
                to: today,
            },
            Self::Yesterday => {
                let y = today - Duration::days(1);
                DateRange { from: y, to: y }
            }
            Self::LastWeek => DateRange {
                from: today - Duration::days(7),
                to: today,
            },
            Self::LastMonth => DateRange {
                from: today - Duration::days(30),
                to: today,
            },
            Self::Custom { from, to } if from <= to => DateRange { from, to },
            Self::Custom { from, to } => DateRange { from: to, to: from },
        }
    }
}

/// Keep only entries whose local date falls inside `range`.
pub fn filter_range<Tz: TimeZone>(entries: &[Entry], tz: &Tz, range: DateRange) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| range.contains(local_date(e, tz)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn entry(id: i64, when: &str) -> Entry {
        Entry {
            id: Some(id),
            food: format!("food {id}"),
            weight: 100.0,
            kcal_per_100g: 100.0,
            fats: None,
            carbs: None,
            proteins: None,
            calories: 100,
            meal_datetime: at(when),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ids(entries: &[Entry]) -> Vec<i64> {
        entries.iter().filter_map(|e| e.id).collect()
    }

    #[test]
    fn test_group_empty() {
        let groups = group_by_local_date(&[], &Utc);
        assert!(groups.is_empty());
        assert!(ordered_date_keys(&groups).is_empty());
    }

    #[test]
    fn test_group_uses_local_calendar_day() {
        // Same UTC day (21:00Z and 23:00Z), different days for a UTC+2 viewer.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let entries = vec![
            entry(1, "2024-01-01T23:00:00+02:00"),
            entry(2, "2024-01-02T01:00:00+02:00"),
        ];
        assert_eq!(
            entries[0].meal_datetime.date_naive(),
            entries[1].meal_datetime.date_naive()
        );

        let groups = group_by_local_date(&entries, &tz);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            ordered_date_keys(&groups),
            vec![date(2024, 1, 2), date(2024, 1, 1)]
        );
        assert_eq!(ids(&groups[&date(2024, 1, 1)]), vec![1]);
        assert_eq!(ids(&groups[&date(2024, 1, 2)]), vec![2]);

        // In UTC they collapse into one bucket
        let utc_groups = group_by_local_date(&entries, &Utc);
        assert_eq!(utc_groups.len(), 1);
    }

    #[test]
    fn test_group_sorts_within_day_regardless_of_input_order() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let a = entry(1, "2024-03-10T08:00:00-05:00");
        let b = entry(2, "2024-03-10T12:30:00-05:00");
        let c = entry(3, "2024-03-10T19:45:00-05:00");
        let d = entry(4, "2024-03-09T21:00:00-05:00");

        let forward = group_by_local_date(&[a.clone(), b.clone(), c.clone(), d.clone()], &tz);
        let shuffled = group_by_local_date(&[c, d, a, b], &tz);
        assert_eq!(ids(&forward[&date(2024, 3, 10)]), vec![1, 2, 3]);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_group_ties_are_deterministic() {
        let x = entry(8, "2024-03-10T08:00:00Z");
        let y = entry(3, "2024-03-10T08:00:00Z");
        let one = group_by_local_date(&[x.clone(), y.clone()], &Utc);
        let two = group_by_local_date(&[y, x], &Utc);
        assert_eq!(one, two);
        assert_eq!(ids(&one[&date(2024, 3, 10)]), vec![3, 8]);
    }

    #[test]
    fn test_daily_totals_scenario() {
        let mut first = entry(1, "2024-01-01T08:00:00Z");
        first.calories = 200;
        first.weight = 100.0;
        first.fats = Some(10.0);
        let mut second = entry(2, "2024-01-01T09:00:00Z");
        second.calories = 150;
        second.weight = 50.0;
        second.carbs = Some(20.0);

        let entries = vec![first, second];
        let totals = daily_totals(&entries);
        assert_eq!(
            totals,
            NutrientTotals {
                calories: 350.0,
                fats: 10.0,
                carbs: 10.0,
                proteins: 0.0,
            }
        );
        // Pure: same input, same output
        assert_eq!(daily_totals(&entries), totals);
    }

    #[test]
    fn test_daily_totals_empty() {
        assert_eq!(daily_totals(&[]), NutrientTotals::default());
    }

    #[test]
    fn test_daily_totals_zero_weight_keeps_calories() {
        let mut e = entry(1, "2024-01-01T08:00:00Z");
        e.weight = 0.0;
        e.calories = 42;
        e.fats = Some(50.0);
        e.proteins = Some(20.0);
        let totals = daily_totals(&[e]);
        assert!((totals.calories - 42.0).abs() < f64::EPSILON);
        assert!(totals.fats.abs() < f64::EPSILON);
        assert!(totals.proteins.abs() < f64::EPSILON);
    }

    #[test]
    fn test_relative_date_label() {
        let today = date(2024, 3, 1);
        assert_eq!(relative_date_label(today, today), RelativeDay::Today);
        // Across a leap-year month boundary
        assert_eq!(
            relative_date_label(date(2024, 2, 29), today),
            RelativeDay::Yesterday
        );
        assert_eq!(
            relative_date_label(date(2024, 2, 28), today),
            RelativeDay::Date(date(2024, 2, 28))
        );
        assert_eq!(
            relative_date_label(date(2024, 3, 2), today),
            RelativeDay::Date(date(2024, 3, 2))
        );
    }

    #[test]
    fn test_day_groups_view() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let entries = vec![
            entry(1, "2024-05-01T10:00:00+01:00"),
            entry(2, "2024-05-03T07:00:00+01:00"),
            entry(3, "2024-05-02T12:00:00+01:00"),
            entry(4, "2024-05-03T06:00:00+01:00"),
        ];
        let view = day_groups(&entries, &tz, date(2024, 5, 3));
        let dates: Vec<NaiveDate> = view.iter().map(|g| g.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 5, 3), date(2024, 5, 2), date(2024, 5, 1)]
        );
        assert_eq!(view[0].label, RelativeDay::Today);
        assert_eq!(view[1].label, RelativeDay::Yesterday);
        assert_eq!(view[2].label, RelativeDay::Date(date(2024, 5, 1)));
        assert_eq!(ids(&view[0].entries), vec![4, 2]);
        assert!((view[0].totals.calories - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_date_filter_ranges() {
        let today = date(2024, 3, 5);
        assert_eq!(
            DateFilter::Today.range(today),
            DateRange {
                from: today,
                to: today
            }
        );
        assert_eq!(
            DateFilter::Yesterday.range(today),
            DateRange {
                from: date(2024, 3, 4),
                to: date(2024, 3, 4)
            }
        );
        assert_eq!(
            DateFilter::LastWeek.range(today),
            DateRange {
                from: date(2024, 2, 27),
                to: today
            }
        );
        assert_eq!(
            DateFilter::LastMonth.range(today),
            DateRange {
                from: date(2024, 2, 4),
                to: today
            }
        );
        let reversed = DateFilter::Custom {
            from: date(2024, 3, 9),
            to: date(2024, 3, 1),
        };
        assert_eq!(
            reversed.range(today),
            DateRange {
                from: date(2024, 3, 1),
                to: date(2024, 3, 9)
            }
        );
    }

    #[test]
    fn test_date_filter_parse() {
        assert_eq!(DateFilter::parse("Today").unwrap(), DateFilter::Today);
        assert_eq!(DateFilter::parse("week").unwrap(), DateFilter::LastWeek);
        assert_eq!(DateFilter::parse("month").unwrap(), DateFilter::LastMonth);
        assert!(DateFilter::parse("fortnight").is_err());
    }

    #[test]
    fn test_filter_range_uses_local_date() {
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        // 2024-06-02T03:00Z is still June 1st at UTC-8
        let entries = vec![entry(1, "2024-06-02T03:00:00Z"), entry(2, "2024-06-02T12:00:00Z")];
        let june_first = DateRange {
            from: date(2024, 6, 1),
            to: date(2024, 6, 1),
        };
        assert_eq!(ids(&filter_range(&entries, &tz, june_first)), vec![1]);
    }
}
