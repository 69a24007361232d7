use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::record::Entity;
use crate::error::ValidationError;

/// A quick link in the dock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub title: String,
    pub favicon_url: Option<String>,
    pub position: u32,
}

impl Link {
    /// Build a link from user input, normalising the URL and filling in the
    /// title and favicon from the host when they are missing.
    pub fn new(url: &str, title: &str, position: u32) -> Result<Self, ValidationError> {
        let parsed = normalize_url(url)?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        let title = match title.trim() {
            "" => host.trim_start_matches("www.").to_string(),
            t => t.to_string(),
        };
        Ok(Self {
            url: parsed.to_string(),
            title,
            favicon_url: Some(favicon_for(&host)),
            position,
        })
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Stored favicon, or one derived from the host.
    pub fn favicon(&self) -> Option<String> {
        self.favicon_url
            .clone()
            .or_else(|| self.host().map(|h| favicon_for(&h)))
    }
}

/// Parse user input as an absolute http(s) URL, assuming `https://` when no
/// scheme was typed.
pub fn normalize_url(input: &str) -> Result<Url, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty("url"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).map_err(|e| {
        ValidationError::new("url", format!("{} is not a valid URL: {}", trimmed, e))
    })?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        "http" | "https" => Err(ValidationError::new("url", "missing host")),
        other => Err(ValidationError::new(
            "url",
            format!("unsupported scheme {}", other),
        )),
    }
}

pub fn favicon_for(host: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={}&sz=64", host)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl LinkPatch {
    pub fn position(position: u32) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Links have no boolean fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkToggle {}

impl Entity for Link {
    type Patch = LinkPatch;
    type Toggle = LinkToggle;

    const KIND: &'static str = "link";
    const COLLECTION: &'static str = "links";
    const CACHE_KEY: &'static str = "nook.links";

    fn seed() -> Vec<Self> {
        [
            ("https://mail.google.com/", "Mail"),
            ("https://calendar.google.com/", "Calendar"),
            ("https://github.com/", "GitHub"),
            ("https://news.ycombinator.com/", "Hacker News"),
        ]
        .iter()
        .enumerate()
        .filter_map(|(i, (url, title))| Link::new(url, title, i as u32).ok())
        .collect()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        normalize_url(&self.url)?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::empty("title"));
        }
        Ok(())
    }

    fn apply(&mut self, patch: &LinkPatch) {
        if let Some(url) = &patch.url {
            self.url = url.clone();
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(favicon_url) = &patch.favicon_url {
            self.favicon_url = favicon_url.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
    }

    fn toggle_patch(&self, field: LinkToggle) -> Result<LinkPatch, ValidationError> {
        match field {}
    }
}
