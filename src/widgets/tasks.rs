use chrono::NaiveDate;

use crate::core::record::{Record, RecordId};
use crate::core::task::{Task, TaskPatch, TaskToggle};
use crate::error::ValidationError;
use crate::sync::{Collection, Persist};

/// The to-do widget.
#[derive(Clone)]
pub struct TaskList {
    tasks: Collection<Task>,
}

impl TaskList {
    pub fn new(tasks: Collection<Task>) -> Self {
        Self { tasks }
    }

    pub fn collection(&self) -> &Collection<Task> {
        &self.tasks
    }

    pub fn add(&self, label: &str, due: Option<NaiveDate>) -> Result<Persist, ValidationError> {
        let mut task = Task::new(label.trim());
        task.due_date = due;
        self.tasks.create(task)
    }

    pub fn toggle_completed(&self, id: &RecordId) -> Result<Persist, ValidationError> {
        self.tasks.toggle(id, TaskToggle::Completed)
    }

    pub fn rename(&self, id: &RecordId, label: &str) -> Result<Persist, ValidationError> {
        self.tasks.update(id, TaskPatch::label(label.trim()))
    }

    pub fn set_due(
        &self,
        id: &RecordId,
        due: Option<NaiveDate>,
    ) -> Result<Persist, ValidationError> {
        self.tasks.update(id, TaskPatch::due_date(due))
    }

    pub fn remove(&self, id: &RecordId) -> Persist {
        self.tasks.delete(id)
    }

    pub fn remaining(&self) -> usize {
        self.tasks
            .items()
            .iter()
            .filter(|r| !r.fields.completed)
            .count()
    }

    pub fn overdue(&self, today: NaiveDate) -> Vec<Record<Task>> {
        self.tasks
            .items()
            .into_iter()
            .filter(|r| r.fields.is_overdue(today))
            .collect()
    }

    /// Open tasks first, completed ones after; otherwise list order.
    pub fn display_order(&self) -> Vec<Record<Task>> {
        let mut items = self.tasks.items();
        items.sort_by_key(|r| r.fields.completed);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Entity;
    use crate::sync::cache::MemoryCache;
    use crate::sync::identity::StaticIdentity;
    use std::sync::Arc;

    async fn mounted() -> TaskList {
        let tasks = Collection::local_only(
            Arc::new(MemoryCache::new()),
            Arc::new(StaticIdentity::anonymous()),
        );
        tasks.load().await;
        TaskList::new(tasks)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn add_trims_and_prepends() {
        let list = mounted().await;
        list.add("  Buy milk ", Some(day(3))).unwrap().await;
        let first = &list.collection().items()[0];
        assert_eq!(first.fields.label, "Buy milk");
        assert_eq!(first.fields.due_date, Some(day(3)));
        assert!(first.id.is_local());
    }

    #[tokio::test]
    async fn completed_tasks_sort_last() {
        let list = mounted().await;
        let first = list.collection().items()[0].id.clone();
        list.toggle_completed(&first).unwrap().await;

        let order = list.display_order();
        assert_eq!(order.last().unwrap().id, first);
        assert_eq!(list.remaining(), Task::seed().len() - 1);
    }

    #[tokio::test]
    async fn overdue_uses_due_dates() {
        let list = mounted().await;
        list.add("Renew passport", Some(day(1))).unwrap().await;
        list.add("Plan trip", Some(day(9))).unwrap().await;

        let overdue = list.overdue(day(5));
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].fields.label, "Renew passport");
    }

    #[tokio::test]
    async fn rename_to_blank_is_rejected() {
        let list = mounted().await;
        let id = list.collection().items()[0].id.clone();
        assert!(list.rename(&id, "   ").is_err());
        list.set_due(&id, Some(day(2))).unwrap().await;
        assert_eq!(list.collection().get(&id).unwrap().fields.due_date, Some(day(2)));
    }
}
