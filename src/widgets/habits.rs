use chrono::NaiveDate;

use crate::core::habit::{DAYS_PER_WEEK, Habit, HabitPatch, HabitToggle, day_slot, percent};
use crate::core::record::RecordId;
use crate::error::ValidationError;
use crate::sync::{Collection, Persist};

/// The weekly habit grid.
#[derive(Clone)]
pub struct HabitGrid {
    habits: Collection<Habit>,
}

impl HabitGrid {
    pub fn new(habits: Collection<Habit>) -> Self {
        Self { habits }
    }

    pub fn collection(&self) -> &Collection<Habit> {
        &self.habits
    }

    pub fn add(&self, name: &str) -> Result<Persist, ValidationError> {
        self.habits.create(Habit::new(name.trim()))
    }

    pub fn rename(&self, id: &RecordId, name: &str) -> Result<Persist, ValidationError> {
        self.habits.update(id, HabitPatch::name(name.trim()))
    }

    pub fn toggle_day(&self, id: &RecordId, day: usize) -> Result<Persist, ValidationError> {
        self.habits.toggle(id, HabitToggle::Day(day))
    }

    pub fn toggle_today(
        &self,
        id: &RecordId,
        today: NaiveDate,
    ) -> Result<Persist, ValidationError> {
        self.toggle_day(id, day_slot(today))
    }

    /// Uncheck every slot of every habit, for the start of a new week.
    pub fn clear_week(&self) -> Vec<Persist> {
        self.habits
            .items()
            .iter()
            .filter(|r| r.fields.completed_days() > 0)
            .filter_map(|r| {
                self.habits
                    .update(&r.id, HabitPatch::week([false; DAYS_PER_WEEK]))
                    .ok()
            })
            .collect()
    }

    pub fn remove(&self, id: &RecordId) -> Persist {
        self.habits.delete(id)
    }

    pub fn weekly_percent(&self, id: &RecordId) -> Option<u8> {
        self.habits.get(id).map(|r| r.fields.weekly_percent())
    }

    /// Checked slots across all habits as a share of all slots.
    pub fn overall_percent(&self) -> u8 {
        let items = self.habits.items();
        let done: usize = items.iter().map(|r| r.fields.completed_days()).sum();
        percent(done, items.len() * DAYS_PER_WEEK)
    }

    pub fn streak(&self, id: &RecordId, today: NaiveDate) -> Option<u32> {
        self.habits.get(id).map(|r| r.fields.streak(today))
    }
}
