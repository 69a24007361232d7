pub mod cache;
pub mod collection;
pub mod identity;
pub mod remote;
pub mod transition;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::record::Record;

pub use collection::{Collection, Persist};

/// Where mutations are persisted for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Remote service is the store of record; the cache mirrors it.
    Remote,
    /// Cache only. Anonymous sessions start here; remote sessions degrade here.
    Local,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("REMOTE"),
            Self::Local => f.write_str("LOCAL"),
        }
    }
}

/// Everything a widget renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<F> {
    pub items: Vec<Record<F>>,
    pub mode: Mode,
    pub is_loading: bool,
    /// Human-readable sync problem, shown as a passive indicator.
    pub error: Option<String>,
}

impl<F> CollectionState<F> {
    pub fn mounting() -> Self {
        Self {
            items: Vec::new(),
            mode: Mode::Local,
            is_loading: true,
            error: None,
        }
    }
}
