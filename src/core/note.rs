use serde::{Deserialize, Serialize};

use super::record::Entity;
use crate::error::ValidationError;

/// The scratch-pad note. `content` is plain text, `content_html` the editor's
/// rendered form; `version` increases with every saved edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub content_html: String,
    pub version: u32,
}

impl Note {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            content_html: plain_to_html(&content),
            content,
            version: 1,
        }
    }
}

/// Minimal HTML for text that did not come through the rich-text editor.
pub fn plain_to_html(text: &str) -> String {
    text.lines()
        .map(|line| {
            let escaped = line
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            format!("<p>{}</p>", escaped)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteToggle {}

impl Entity for Note {
    type Patch = NotePatch;
    type Toggle = NoteToggle;

    const KIND: &'static str = "note";
    const COLLECTION: &'static str = "notes";
    const CACHE_KEY: &'static str = "nook.notes";

    fn seed() -> Vec<Self> {
        vec![Note::new("Jot things down here. Notes save as you type.")]
    }

    // Empty notes are fine; the buffer just has to stay consistent.
    fn validate(&self) -> Result<(), ValidationError> {
        if self.version == 0 {
            return Err(ValidationError::new("version", "must start at 1"));
        }
        Ok(())
    }

    fn apply(&mut self, patch: &NotePatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(html) = &patch.content_html {
            self.content_html = html.clone();
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
    }

    fn toggle_patch(&self, field: NoteToggle) -> Result<NotePatch, ValidationError> {
        match field {}
    }
}
