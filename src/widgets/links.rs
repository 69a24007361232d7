use crate::core::link::{Link, LinkPatch, favicon_for, normalize_url};
use crate::core::record::{Record, RecordId};
use crate::error::ValidationError;
use crate::sync::{Collection, Persist};

/// The quick-link dock. Display order is `position`, not list order.
#[derive(Clone)]
pub struct LinkDock {
    links: Collection<Link>,
}

impl LinkDock {
    pub fn new(links: Collection<Link>) -> Self {
        Self { links }
    }

    pub fn collection(&self) -> &Collection<Link> {
        &self.links
    }

    pub fn ordered(&self) -> Vec<Record<Link>> {
        let mut items = self.links.items();
        items.sort_by_key(|r| r.fields.position);
        items
    }

    fn next_position(&self) -> Result<u32, ValidationError> {
        match self.links.items().iter().map(|r| r.fields.position).max() {
            None => Ok(0),
            Some(last) => last.checked_add(1).ok_or_else(|| {
                ValidationError::new("position", "dock is full at the end, move a link first")
            }),
        }
    }

    /// New links go to the end of the dock.
    pub fn add(&self, url: &str, title: &str) -> Result<Persist, ValidationError> {
        let link = Link::new(url, title, self.next_position()?)?;
        self.links.create(link)
    }

    pub fn retitle(&self, id: &RecordId, title: &str) -> Result<Persist, ValidationError> {
        self.links.update(id, LinkPatch::title(title.trim()))
    }

    pub fn set_url(&self, id: &RecordId, url: &str) -> Result<Persist, ValidationError> {
        let url = normalize_url(url)?;
        let favicon = url.host_str().map(favicon_for);
        self.links.update(
            id,
            LinkPatch {
                url: Some(url.to_string()),
                favicon_url: Some(favicon),
                ..LinkPatch::default()
            },
        )
    }

    pub fn remove(&self, id: &RecordId) -> Persist {
        self.links.delete(id)
    }

    /// Move the link at dock index `from` to index `to`, renumbering positions
    /// 0..n. Only links whose position actually changes are updated.
    pub fn move_link(&self, from: usize, to: usize) -> Vec<Persist> {
        let mut order = self.ordered();
        if from >= order.len() || to >= order.len() || from == to {
            return Vec::new();
        }
        let moved = order.remove(from);
        order.insert(to, moved);

        order
            .iter()
            .enumerate()
            .filter(|(i, r)| r.fields.position != *i as u32)
            .filter_map(|(i, r)| self.links.update(&r.id, LinkPatch::position(i as u32)).ok())
            .collect()
    }
}
