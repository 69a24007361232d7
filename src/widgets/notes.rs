use std::time::{Duration, Instant};

use crate::core::note::{Note, NotePatch, plain_to_html};
use crate::core::record::{Entity, Record};
use crate::sync::{Collection, Persist};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    content: String,
    content_html: String,
}

/// Collects keystrokes and says when the quiet period after the last edit is
/// over. Time is passed in so callers decide how to wait.
#[derive(Debug, Clone)]
pub struct NoteBuffer {
    delay: Duration,
    draft: Option<Draft>,
    last_edit: Option<Instant>,
}

impl NoteBuffer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            draft: None,
            last_edit: None,
        }
    }

    pub fn edit(&mut self, content: String, content_html: String, now: Instant) {
        self.draft = Some(Draft {
            content,
            content_html,
        });
        self.last_edit = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        match (&self.draft, self.last_edit) {
            (Some(_), Some(at)) => Some(at + self.delay),
            _ => None,
        }
    }

    /// How long until a save is due; zero once it is.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    fn take(&mut self) -> Option<Draft> {
        self.last_edit = None;
        self.draft.take()
    }

    fn pending_content(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.content.as_str())
    }
}

/// The notes widget: one note, saved a moment after typing stops.
pub struct NotePad {
    notes: Collection<Note>,
    buffer: NoteBuffer,
}

impl NotePad {
    pub fn new(notes: Collection<Note>, delay: Duration) -> Self {
        Self {
            notes,
            buffer: NoteBuffer::new(delay),
        }
    }

    pub fn collection(&self) -> &Collection<Note> {
        &self.notes
    }

    pub fn buffer(&self) -> &NoteBuffer {
        &self.buffer
    }

    /// The note being edited; the first record in the collection.
    pub fn current(&self) -> Option<Record<Note>> {
        self.notes.items().into_iter().next()
    }

    /// Create the default note when the loaded collection has none.
    pub fn ensure_note(&self) -> Option<Persist> {
        if self.current().is_some() {
            return None;
        }
        let note = Note::seed().into_iter().next()?;
        self.notes.create(note).ok()
    }

    /// What the editor shows: unsaved text if any, otherwise the stored note.
    pub fn text(&self) -> String {
        match self.buffer.pending_content() {
            Some(content) => content.to_string(),
            None => self
                .current()
                .map(|r| r.fields.content)
                .unwrap_or_default(),
        }
    }

    /// Record a keystroke. `content_html` comes from the editor when it has
    /// one; plain text is converted otherwise.
    pub fn edit(&mut self, content: &str, content_html: Option<&str>, now: Instant) {
        let html = content_html
            .map(str::to_string)
            .unwrap_or_else(|| plain_to_html(content));
        self.buffer.edit(content.to_string(), html, now);
    }

    /// Save if the quiet period has passed.
    pub fn flush_if_due(&mut self, now: Instant) -> Option<Persist> {
        if !self.buffer.is_due(now) {
            return None;
        }
        self.flush()
    }

    /// Save buffered edits now, e.g. when the widget closes.
    pub fn flush(&mut self) -> Option<Persist> {
        let draft = self.buffer.take()?;
        let result = match self.current() {
            None => self.notes.create(Note {
                content: draft.content,
                content_html: draft.content_html,
                version: 1,
            }),
            Some(note)
                if note.fields.content == draft.content
                    && note.fields.content_html == draft.content_html =>
            {
                log::debug!("Note unchanged, nothing to save");
                return None;
            }
            Some(note) => self.notes.update(
                &note.id,
                NotePatch {
                    content: Some(draft.content),
                    content_html: Some(draft.content_html),
                    version: Some(note.fields.version.saturating_add(1)),
                },
            ),
        };
        match result {
            Ok(persist) => Some(persist),
            Err(e) => {
                log::warn!("Failed to save note: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::cache::MemoryCache;
    use crate::sync::identity::StaticIdentity;
    use std::sync::Arc;

    const DELAY: Duration = Duration::from_millis(800);

    async fn mounted() -> NotePad {
        let notes = Collection::local_only(
            Arc::new(MemoryCache::new()),
            Arc::new(StaticIdentity::anonymous()),
        );
        notes.load().await;
        NotePad::new(notes, DELAY)
    }

    #[test]
    fn buffer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut buffer = NoteBuffer::new(DELAY);
        assert!(!buffer.is_due(start));
        assert_eq!(buffer.time_until_due(start), None);

        buffer.edit("a".into(), "<p>a</p>".into(), start);
        buffer.edit("ab".into(), "<p>ab</p>".into(), start + Duration::from_millis(500));
        assert!(!buffer.is_due(start + Duration::from_millis(1000)));
        assert_eq!(
            buffer.time_until_due(start + Duration::from_millis(1000)),
            Some(Duration::from_millis(300))
        );
        assert!(buffer.is_due(start + Duration::from_millis(1300)));
    }

    #[tokio::test]
    async fn debounced_edits_save_once_with_next_version() {
        let mut pad = mounted().await;
        let start = Instant::now();
        let before = pad.current().unwrap();

        pad.edit("Call", None, start);
        pad.edit("Call mum", None, start + Duration::from_millis(200));
        assert_eq!(pad.text(), "Call mum");
        assert!(pad.flush_if_due(start + Duration::from_millis(500)).is_none());

        pad.flush_if_due(start + Duration::from_millis(1000))
            .unwrap()
            .await;
        let note = pad.current().unwrap();
        assert_eq!(note.id, before.id);
        assert_eq!(note.fields.content, "Call mum");
        assert_eq!(note.fields.content_html, "<p>Call mum</p>");
        assert_eq!(note.fields.version, before.fields.version + 1);
        assert!(!pad.buffer().is_dirty());
    }

    #[tokio::test]
    async fn version_stops_at_its_ceiling() {
        let mut pad = mounted().await;
        let id = pad.current().unwrap().id;
        let ceiling = NotePatch {
            version: Some(u32::MAX),
            ..NotePatch::default()
        };
        pad.collection().update(&id, ceiling).unwrap().await;

        pad.edit("Still saving", None, Instant::now());
        pad.flush().unwrap().await;
        let note = pad.current().unwrap();
        assert_eq!(note.fields.content, "Still saving");
        assert_eq!(note.fields.version, u32::MAX);
    }

    #[tokio::test]
    async fn unchanged_text_is_not_saved() {
        let mut pad = mounted().await;
        let note = pad.current().unwrap();
        pad.edit(&note.fields.content, Some(note.fields.content_html.as_str()), Instant::now());
        assert!(pad.flush().is_none());
        assert_eq!(pad.current().unwrap().fields.version, 1);
    }

    #[tokio::test]
    async fn flush_creates_note_when_collection_is_empty() {
        let mut pad = mounted().await;
        let id = pad.current().unwrap().id;
        pad.collection().delete(&id).await;
        assert!(pad.current().is_none());

        pad.edit("Fresh start", Some("<p><b>Fresh</b> start</p>"), Instant::now());
        pad.flush().unwrap().await;
        let note = pad.current().unwrap();
        assert_eq!(note.fields.version, 1);
        assert_eq!(note.fields.content_html, "<p><b>Fresh</b> start</p>");
    }

    #[tokio::test]
    async fn ensure_note_only_fills_an_empty_pad() {
        let pad = mounted().await;
        assert!(pad.ensure_note().is_none());

        let id = pad.current().unwrap().id;
        pad.collection().delete(&id).await;
        pad.ensure_note().unwrap().await;
        assert_eq!(pad.collection().items().len(), 1);
    }
}
