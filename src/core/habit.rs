use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::record::Entity;
use crate::error::ValidationError;

pub const DAYS_PER_WEEK: usize = 7;

/// Slot of `date` in a habit week (Monday = 0).
pub fn day_slot(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub name: String,
    pub week: [bool; DAYS_PER_WEEK],
}

impl Habit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            week: [false; DAYS_PER_WEEK],
        }
    }

    pub fn completed_days(&self) -> usize {
        self.week.iter().filter(|done| **done).count()
    }

    /// Share of this week's slots checked, rounded to a whole percent.
    pub fn weekly_percent(&self) -> u8 {
        percent(self.completed_days(), DAYS_PER_WEEK)
    }

    /// Consecutive checked days ending at `today`'s slot.
    ///
    /// Today may still be open, in which case counting starts from yesterday.
    /// Only the current week is visible, so the streak never exceeds seven.
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let mut slot = day_slot(today) as isize;
        if !self.week[slot as usize] {
            slot -= 1;
        }
        let mut streak = 0u32;
        while slot >= 0 && self.week[slot as usize] {
            streak += 1;
            slot -= 1;
        }
        streak
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        !self.week[day_slot(today)]
    }
}

pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<[bool; DAYS_PER_WEEK]>,
}

impl HabitPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            week: None,
        }
    }

    pub fn week(week: [bool; DAYS_PER_WEEK]) -> Self {
        Self {
            name: None,
            week: Some(week),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitToggle {
    /// Week slot, Monday = 0.
    Day(usize),
}

impl Entity for Habit {
    type Patch = HabitPatch;
    type Toggle = HabitToggle;

    const KIND: &'static str = "habit";
    const COLLECTION: &'static str = "habits";
    const CACHE_KEY: &'static str = "nook.habits";

    fn seed() -> Vec<Self> {
        vec![
            Habit::new("Drink water"),
            Habit::new("Read 20 minutes"),
            Habit::new("Go for a walk"),
        ]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::empty("name"));
        }
        Ok(())
    }

    fn apply(&mut self, patch: &HabitPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(week) = patch.week {
            self.week = week;
        }
    }

    // The remote row stores the whole week, so a toggle sends the full array.
    fn toggle_patch(&self, field: HabitToggle) -> Result<HabitPatch, ValidationError> {
        match field {
            HabitToggle::Day(day) if day < DAYS_PER_WEEK => {
                let mut week = self.week;
                week[day] = !week[day];
                Ok(HabitPatch::week(week))
            }
            HabitToggle::Day(day) => Err(ValidationError::new(
                "day",
                format!("{} is outside the week (0-6)", day),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-03-02 is a Monday.
    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn slots_start_on_monday() {
        assert_eq!(day_slot(date(2)), 0);
        assert_eq!(day_slot(date(8)), 6);
    }

    #[test]
    fn weekly_percent_rounds() {
        let mut habit = Habit::new("Stretch");
        habit.week = [true, true, false, false, false, false, false];
        assert_eq!(habit.weekly_percent(), 29);
        habit.week = [true; 7];
        assert_eq!(habit.weekly_percent(), 100);
    }

    #[test]
    fn streak_allows_today_open() {
        let mut habit = Habit::new("Stretch");
        habit.week = [true, true, true, false, false, false, false];
        // Thursday, not yet done
        assert_eq!(habit.streak(date(5)), 3);
        // Friday breaks it
        assert_eq!(habit.streak(date(6)), 0);
        habit.week[3] = true;
        assert_eq!(habit.streak(date(5)), 4);
    }

    #[test]
    fn toggle_out_of_range_is_rejected() {
        let habit = Habit::new("Stretch");
        assert!(habit.toggle_patch(HabitToggle::Day(7)).is_err());
        let patch = habit.toggle_patch(HabitToggle::Day(2)).unwrap();
        assert_eq!(
            patch.week,
            Some([false, false, true, false, false, false, false])
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Habit::new("").validate().is_err());
    }
}
