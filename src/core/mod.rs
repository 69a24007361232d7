pub mod habit;
pub mod link;
pub mod note;
pub mod record;
pub mod task;

pub use record::{Entity, Record, RecordId};
