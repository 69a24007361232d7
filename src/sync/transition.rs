//! Pure `(items, op) -> items` transitions behind every optimistic apply.
//!
//! Each function returns `None` when the operation does not apply (unknown id),
//! leaving the caller to treat it as a no-op.

use chrono::{DateTime, Utc};

use crate::core::record::{Entity, Record, RecordId};

/// New record goes to the front.
pub fn prepend<F: Entity>(items: &[Record<F>], record: Record<F>) -> Vec<Record<F>> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.push(record);
    next.extend_from_slice(items);
    next
}

pub fn patch<F: Entity>(
    items: &[Record<F>],
    id: &RecordId,
    patch: &F::Patch,
    now: DateTime<Utc>,
) -> Option<Vec<Record<F>>> {
    if !items.iter().any(|r| &r.id == id) {
        return None;
    }
    Some(
        items
            .iter()
            .map(|r| {
                if &r.id == id {
                    let mut updated = r.clone();
                    updated.fields.apply(patch);
                    updated.updated_at = now;
                    updated
                } else {
                    r.clone()
                }
            })
            .collect(),
    )
}

pub fn remove<F: Entity>(items: &[Record<F>], id: &RecordId) -> Option<Vec<Record<F>>> {
    if !items.iter().any(|r| &r.id == id) {
        return None;
    }
    Some(items.iter().filter(|r| &r.id != id).cloned().collect())
}

/// Swap the provisional record for the server-confirmed one, keeping its slot.
pub fn confirm<F: Entity>(
    items: &[Record<F>],
    provisional: &RecordId,
    confirmed: Record<F>,
) -> Option<Vec<Record<F>>> {
    let pos = items.iter().position(|r| &r.id == provisional)?;
    let mut next = items.to_vec();
    next[pos] = confirmed;
    Some(next)
}

/// An optimistic change made while a load was in flight, kept so it can be
/// applied again on top of whatever the load returns.
#[derive(Debug, Clone)]
pub enum Change<F: Entity> {
    Created(Record<F>),
    Patched {
        id: RecordId,
        patch: F::Patch,
        at: DateTime<Utc>,
    },
    Deleted(RecordId),
}

/// Apply held changes, oldest first, to freshly loaded items. Changes that no
/// longer match anything are skipped.
pub fn replay<F: Entity>(items: Vec<Record<F>>, changes: &[Change<F>]) -> Vec<Record<F>> {
    changes.iter().fold(items, |items, change| match change {
        Change::Created(record) if items.iter().any(|r| r.id == record.id) => items,
        Change::Created(record) => prepend(&items, record.clone()),
        Change::Patched { id, patch: p, at } => patch(&items, id, p, *at).unwrap_or(items),
        Change::Deleted(id) => remove(&items, id).unwrap_or(items),
    })
}
